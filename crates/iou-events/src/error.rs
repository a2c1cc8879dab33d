use iou_core::LedgerError;

/// Errors raised by event fan-out and notification recording.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Room names look like `user:<uuid>` or `debt:<uuid>`.
    #[error("invalid room name: {0}")]
    InvalidRoom(String),

    /// The transport refused the event.
    #[error("transport error: {0}")]
    Transport(String),

    /// The notification store refused the record.
    #[error("notification sink unavailable: {0}")]
    SinkUnavailable(String),
}

impl From<EventError> for LedgerError {
    fn from(err: EventError) -> Self {
        LedgerError::SideEffect(err.to_string())
    }
}
