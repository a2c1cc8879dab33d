use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LedgerError;

/// Monetary value in minor units (cents, centavos, ...).
pub type Amount = u64;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new time-ordered id (UUID v7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    LedgerError::Validation(format!("invalid {}: {}", stringify!($name), e))
                })
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a debt.
    DebtId
);

uuid_id!(
    /// Stable identifier of the party a phone number resolves to.
    IdentityId
);

uuid_id!(
    /// Identifier of a recorded notification.
    NotificationId
);

/// Settlement axis of a debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Open balance, no settlement proposal in flight.
    Active,
    /// A debtor-requested payment awaits the creditor's verdict.
    PendingVerification,
    /// Fully settled or cancelled. Terminal.
    Paid,
}

impl PaymentStatus {
    /// Whether this is the terminal state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::PendingVerification => write!(f, "pending_verification"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

/// Due-date axis of a debt, orthogonal to [`PaymentStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueStatus {
    OnTime,
    Overdue,
}

impl fmt::Display for OverdueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnTime => write!(f, "on_time"),
            Self::Overdue => write!(f, "overdue"),
        }
    }
}

/// Direction of money for a pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Debtor paid the creditor.
    ReceiverToSender,
    /// Creditor returned money to the debtor.
    SenderToReceiver,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReceiverToSender => write!(f, "receiver_to_sender"),
            Self::SenderToReceiver => write!(f, "sender_to_receiver"),
        }
    }
}

/// Day offsets before the due date at which each reminder slot fires.
pub const REMINDER_OFFSETS_DAYS: [i64; 3] = [3, 1, 0];

/// Per-slot reminder flags, ordered as [`REMINDER_OFFSETS_DAYS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reminders(pub [bool; 3]);

impl Reminders {
    /// All three reminders enabled.
    pub fn all() -> Self {
        Self([true; 3])
    }

    /// No reminders.
    pub fn none() -> Self {
        Self([false; 3])
    }

    /// Whether slot `i` is set. Out-of-range slots are never set.
    pub fn is_set(&self, slot: usize) -> bool {
        self.0.get(slot).copied().unwrap_or(false)
    }

    /// Copy with slot `i` set.
    pub fn with(mut self, slot: usize) -> Self {
        if let Some(flag) = self.0.get_mut(slot) {
            *flag = true;
        }
        self
    }
}

impl Default for Reminders {
    fn default() -> Self {
        Self::all()
    }
}

/// Party to a debt as seen from one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The sender; owed the money.
    Creditor,
    /// The receiver; owes the money.
    Debtor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creditor => write!(f, "creditor"),
            Self::Debtor => write!(f, "debtor"),
        }
    }
}
