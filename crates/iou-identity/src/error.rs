use iou_core::{IdentityId, LedgerError};

/// Identity-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity not found: {0}")]
    NotFound(IdentityId),

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for LedgerError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidPhone(msg) => LedgerError::Validation(msg),
            other => LedgerError::SideEffect(other.to_string()),
        }
    }
}
