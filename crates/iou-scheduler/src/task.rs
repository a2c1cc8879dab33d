use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iou_core::LedgerError;
use serde::Serialize;

/// Summary of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: &'static str,
    /// Debts the scan looked at.
    pub scanned: usize,
    /// Transitions committed.
    pub applied: usize,
    /// Candidates that no longer qualified when the swap was attempted.
    pub skipped: usize,
    /// Candidates that hit an unexpected error.
    pub failed: usize,
}

impl TaskReport {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            ..Self::default()
        }
    }

    /// Fold the result of one attempted transition into the report.
    pub fn record<T>(&mut self, result: &Result<T, LedgerError>) {
        match result {
            Ok(_) => self.applied += 1,
            Err(LedgerError::InvalidState(_)) | Err(LedgerError::Conflict { .. }) => {
                self.skipped += 1
            }
            Err(_) => self.failed += 1,
        }
    }
}

/// A periodic job driven by the [`crate::Scheduler`].
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Stable name used by `Scheduler::trigger`.
    fn name(&self) -> &'static str;

    /// Run one pass as of `now`. Must be safe to repeat.
    async fn run(&self, now: DateTime<Utc>) -> Result<TaskReport, LedgerError>;
}
