use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iou_core::{Actor, Debt, DebtCommand, LedgerError, REMINDER_OFFSETS_DAYS};
use iou_settlement::SettlementEngine;
use std::sync::Arc;

use crate::task::{ScheduledTask, TaskReport};

/// Emits the 3-day, 1-day and due-day reminders.
///
/// `reminders[i]` gates slot `i`; `reminders_sent[i]` records delivery for
/// the current due date. The slot is claimed with a compare-and-swap before
/// anything is emitted, so a reminder is sent at most once however often the
/// scan runs.
pub struct ReminderScheduler {
    engine: Arc<SettlementEngine>,
}

impl ReminderScheduler {
    pub const NAME: &'static str = "reminder_scan";

    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self { engine }
    }

    /// Reminder slots of `debt` that should fire at `now`.
    pub fn due_slots(debt: &Debt, now: DateTime<Utc>) -> Vec<usize> {
        if debt.amount_remaining == 0 {
            return Vec::new();
        }
        let Some(days) = debt.days_until_due(now) else {
            return Vec::new();
        };
        REMINDER_OFFSETS_DAYS
            .iter()
            .enumerate()
            .filter(|(slot, offset)| {
                **offset == days && debt.reminders.is_set(*slot) && !debt.reminders_sent.is_set(*slot)
            })
            .map(|(slot, _)| slot)
            .collect()
    }
}

#[async_trait]
impl ScheduledTask for ReminderScheduler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<TaskReport, LedgerError> {
        let mut report = TaskReport::new(Self::NAME);
        let active = self.engine.ledger().scan_active().await?;
        report.scanned = active.len();

        for debt in &active {
            for slot in Self::due_slots(debt, now) {
                let result = self
                    .engine
                    .execute(debt.id, Actor::System, DebtCommand::MarkReminderSent { slot }, now)
                    .await;
                if let Err(e) = &result {
                    tracing::debug!(debt_id = %debt.id, slot, error = %e, "reminder not sent");
                }
                report.record(&result);
            }
        }

        tracing::info!(
            scanned = report.scanned,
            sent = report.applied,
            skipped = report.skipped,
            failed = report.failed,
            "reminder scan finished"
        );
        Ok(report)
    }
}
