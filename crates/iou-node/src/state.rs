//! Shared node state for HTTP handlers and background tasks.

use iou_events::{BroadcastEventBus, InMemoryNotificationSink};
use iou_identity::InMemoryIdentityStore;
use iou_ledger::{DebtLedger, LedgerStore};
use iou_scheduler::{OverdueScanner, ReminderScheduler, Scheduler};
use iou_settlement::SettlementEngine;
use std::sync::Arc;
use std::time::Instant;

use crate::config::IouConfig;

/// Everything a running node shares between tasks.
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub bus: Arc<BroadcastEventBus>,
    pub identities: Arc<InMemoryIdentityStore>,
    pub notifications: Arc<InMemoryNotificationSink>,
    pub scheduler: Arc<Scheduler>,
    /// When the node started.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the ledger, collaborators, engine and scans over `store`.
    pub fn build(store: Arc<dyn LedgerStore>, config: &IouConfig) -> Self {
        let bus = Arc::new(BroadcastEventBus::new(config.events.room_capacity));
        let identities = Arc::new(InMemoryIdentityStore::new());
        let notifications = Arc::new(InMemoryNotificationSink::new());
        let engine = Arc::new(SettlementEngine::new(
            Arc::new(DebtLedger::new(store)),
            identities.clone(),
            bus.clone(),
            notifications.clone(),
            config.settlement.clone(),
        ));

        let mut scheduler = Scheduler::new().with_run_on_startup(config.scheduler.run_on_startup);
        scheduler.register(
            Arc::new(OverdueScanner::new(engine.clone())),
            config.scheduler.overdue_interval(),
        );
        scheduler.register(
            Arc::new(ReminderScheduler::new(engine.clone())),
            config.scheduler.reminder_interval(),
        );

        Self {
            engine,
            bus,
            identities,
            notifications,
            scheduler: Arc::new(scheduler),
            start_time: Instant::now(),
        }
    }
}
