mod builtin;
mod gesture;
mod gesture_catalog;
mod registry;

pub(crate) use builtin::builtin_gestures;

pub use {
    gesture::{Gesture, GestureMetadata},
    gesture_catalog::GestureCatalog,
    registry::GestureRegistry,
};
