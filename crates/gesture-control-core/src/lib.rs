//! Gesture-control Core Library
//!
//! Session and command-dispatch engine for driving a camera gesture detector
//! from a desktop client: persisted gesture binds, the merged gesture catalog,
//! the single detection session, and the JSON protocol that ties them together.
//!
//! # Example
//!
//! ```no_run
//! use gesture_control_core::{
//!     AttributeStore, BindStore, CameraBackend, CommandDispatcher, CoreResult,
//!     DetectionSession, GestureRegistry,
//! };
//!
//! use std::{sync::Arc, time::Duration};
//!
//! async fn serve(
//!     backend: Arc<dyn CameraBackend>,
//!     config: Arc<dyn AttributeStore>,
//! ) -> CoreResult<()> {
//!     let (events_tx, _events_rx) = tokio::sync::mpsc::channel(64);
//!     let dispatcher = CommandDispatcher::new(
//!         Arc::new(BindStore::open("binds.toml")?),
//!         Arc::new(GestureRegistry::load("custom_gestures.toml")?),
//!         Arc::new(DetectionSession::new(backend, events_tx, Duration::from_secs(2))),
//!         config,
//!         Duration::from_secs(5),
//!     );
//!
//!     let response = dispatcher.handle_text(r#"{"ping": true}"#).await;
//!     println!("{}", response.encode());
//!     Ok(())
//! }
//! ```

mod attributes;
mod binds;
mod camera;
mod catalog;
mod dispatcher;
mod error;
mod protocol;
mod session;

pub use {
    attributes::{AttributeStore, SELECTED_CAMERA_KEY},
    binds::{Bind, BindMode, BindStore},
    camera::{CameraBackend, CameraDescriptor, CaptureSource, Detection, Frame},
    catalog::{Gesture, GestureCatalog, GestureMetadata, GestureRegistry},
    dispatcher::CommandDispatcher,
    error::{CoreError, Result as CoreResult},
    protocol::{
        CommandKind, DecodeError, FRAME_UNAVAILABLE_MARKER, GestureView, Notification, Request,
        Response, SaveGesture, WireBind,
    },
    session::{DetectionEvent, DetectionSession, FrameState, StartOutcome},
};

#[cfg(test)]
mod tests;
