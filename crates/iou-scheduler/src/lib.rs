//! IOU Scheduler
//!
//! Background scans over the ledger. Each scan is a [`ScheduledTask`] that can
//! be run by hand (`Scheduler::trigger`) or on its own timer
//! (`Scheduler::spawn`). Scans mutate debts only through
//! [`iou_settlement::SettlementEngine::execute`], so they race safely with
//! client operations.

pub mod error;
pub mod task;
pub mod overdue;
pub mod reminder;
pub mod scheduler;

pub use error::SchedulerError;
pub use task::{ScheduledTask, TaskReport};
pub use overdue::OverdueScanner;
pub use reminder::ReminderScheduler;
pub use scheduler::Scheduler;

#[cfg(test)]
mod test_support;
