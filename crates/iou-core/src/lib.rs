//! IOU core: the debt record, identifiers, error taxonomy, and the pure
//! settlement state machine that every ledger mutation runs through.

pub mod error;
pub mod types;
pub mod debt;
pub mod state_machine;

pub use error::{ErrorKind, LedgerError};
pub use debt::{Debt, NewDebt, PendingPayment, CANCELLED_MARKER};
pub use state_machine::{Actor, DebtCommand, DebtPatch, DebtStateMachine, Outcome, Transition};
pub use types::{
    Amount, DebtId, IdentityId, NotificationId, OverdueStatus, PaymentStatus, PaymentType, Reminders, Role,
    REMINDER_OFFSETS_DAYS,
};
