use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iou_core::{Actor, Debt, DebtCommand, LedgerError, OverdueStatus};
use iou_settlement::SettlementEngine;
use std::sync::Arc;

use crate::task::{ScheduledTask, TaskReport};

/// Flags active debts whose due date has passed.
///
/// A debt is flagged at most once per overdue episode: the state machine
/// refuses `MarkOverdue` on a debt that is already overdue, so repeated runs
/// are no-ops.
pub struct OverdueScanner {
    engine: Arc<SettlementEngine>,
}

impl OverdueScanner {
    pub const NAME: &'static str = "overdue_scan";

    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self { engine }
    }

    fn is_candidate(debt: &Debt, now: DateTime<Utc>) -> bool {
        debt.overdue_status == OverdueStatus::OnTime
            && debt.amount_remaining > 0
            && debt.due_date.is_some_and(|due| due < now)
    }
}

#[async_trait]
impl ScheduledTask for OverdueScanner {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<TaskReport, LedgerError> {
        let mut report = TaskReport::new(Self::NAME);
        let active = self.engine.ledger().scan_active().await?;
        report.scanned = active.len();

        for debt in active.iter().filter(|d| Self::is_candidate(d, now)) {
            let result = self
                .engine
                .execute(debt.id, Actor::System, DebtCommand::MarkOverdue, now)
                .await;
            if let Err(e) = &result {
                tracing::debug!(debt_id = %debt.id, error = %e, "overdue flag not applied");
            }
            report.record(&result);
        }

        tracing::info!(
            scanned = report.scanned,
            flagged = report.applied,
            skipped = report.skipped,
            failed = report.failed,
            "overdue scan finished"
        );
        Ok(report)
    }
}
