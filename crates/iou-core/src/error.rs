use serde::Serialize;
use std::fmt;

use crate::types::DebtId;

/// Ledger and settlement errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("sender and receiver must be different identities")]
    SelfReference,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("debt not found: {0}")]
    NotFound(DebtId),

    #[error("version conflict on debt {debt_id}: expected {expected}, found {actual}")]
    Conflict {
        debt_id: DebtId,
        expected: u64,
        actual: u64,
    },

    #[error("side effect failed: {0}")]
    SideEffect(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Taxonomy kind surfaced to callers alongside the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::SelfReference => ErrorKind::SelfReference,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::SideEffect(_) => ErrorKind::SideEffectFailure,
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller should re-fetch the debt before deciding again.
    pub fn requires_resync(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

/// Stable, wire-friendly error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "self_reference_error")]
    SelfReference,
    #[serde(rename = "forbidden_error")]
    Forbidden,
    #[serde(rename = "invalid_state_error")]
    InvalidState,
    #[serde(rename = "not_found_error")]
    NotFound,
    #[serde(rename = "conflict_error")]
    Conflict,
    #[serde(rename = "side_effect_failure")]
    SideEffectFailure,
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::SelfReference => "self_reference_error",
            Self::Forbidden => "forbidden_error",
            Self::InvalidState => "invalid_state_error",
            Self::NotFound => "not_found_error",
            Self::Conflict => "conflict_error",
            Self::SideEffectFailure => "side_effect_failure",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
