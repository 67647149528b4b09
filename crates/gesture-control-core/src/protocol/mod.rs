//! JSON wire protocol spoken over the control channel.
//!
//! Requests are objects whose single command key selects the operation
//! (`{"ping": true}`, `{"saveGesto": {...}}`). They are decoded once into
//! [`Request`]; nothing downstream inspects raw JSON.

mod decode_error;
mod request;
mod response;

pub use {
    decode_error::DecodeError,
    request::{CommandKind, Request, SaveGesture},
    response::{FRAME_UNAVAILABLE_MARKER, GestureView, Notification, Response, WireBind},
};
