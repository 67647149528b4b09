mod detection_session;
mod event;
mod producer;

pub use {
    detection_session::{DetectionSession, FrameState, StartOutcome},
    event::DetectionEvent,
};

#[cfg(test)]
pub(crate) use producer::MAX_CONSECUTIVE_FAILURES;
