use uuid::Uuid;

/// Events emitted by an active detection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvent {
    /// The detector recognised a gesture different from the previous frame's.
    GestureDetected {
        /// Session that produced the detection.
        session_id: Uuid,
        /// Recognised gesture name.
        gesture: String,
    },
    /// The session was stopped; consumers should release anything it started.
    SessionEnded {
        /// Session that ended.
        session_id: Uuid,
    },
}
