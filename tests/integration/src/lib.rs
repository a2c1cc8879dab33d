//! Wiring shared by the cross-crate scenarios: a settlement engine over an
//! in-memory ledger with both background scans registered.

use iou_core::{Debt, IdentityId, NewDebt};
use iou_events::{BroadcastEventBus, InMemoryNotificationSink};
use iou_identity::{IdentityStore, InMemoryIdentityStore};
use iou_ledger::DebtLedger;
use iou_scheduler::{OverdueScanner, ReminderScheduler, Scheduler};
use iou_settlement::{SettlementConfig, SettlementEngine};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub engine: Arc<SettlementEngine>,
    pub identities: Arc<InMemoryIdentityStore>,
    pub bus: Arc<BroadcastEventBus>,
    pub sink: Arc<InMemoryNotificationSink>,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SettlementConfig::default())
    }

    pub fn with_config(config: SettlementConfig) -> Self {
        let identities = Arc::new(InMemoryIdentityStore::new());
        let bus = Arc::new(BroadcastEventBus::default());
        let sink = Arc::new(InMemoryNotificationSink::new());
        let engine = Arc::new(SettlementEngine::new(
            Arc::new(DebtLedger::in_memory()),
            identities.clone(),
            bus.clone(),
            sink.clone(),
            config,
        ));

        let mut scheduler = Scheduler::new();
        scheduler.register(
            Arc::new(OverdueScanner::new(engine.clone())),
            Duration::from_secs(86_400),
        );
        scheduler.register(
            Arc::new(ReminderScheduler::new(engine.clone())),
            Duration::from_secs(86_400),
        );

        Self {
            engine,
            identities,
            bus,
            sink,
            scheduler,
        }
    }

    /// Register a party by phone number.
    pub async fn party(&self, phone: &str, name: &str) -> IdentityId {
        self.identities
            .resolve_or_create(phone, name)
            .await
            .unwrap_or_else(|e| panic!("could not register {}: {}", name, e))
    }

    /// Alice (creditor) and Bob (debtor).
    pub async fn alice_and_bob(&self) -> (IdentityId, IdentityId) {
        let alice = self.party("+15550100001", "Alice").await;
        let bob = self.party("+15550100002", "Bob").await;
        (alice, bob)
    }

    /// Open a plain debt of `amount` from `creditor` to `debtor`.
    pub async fn open(&self, creditor: IdentityId, debtor: IdentityId, amount: u64) -> Debt {
        self.engine
            .create_debt(NewDebt::new(creditor, debtor, amount))
            .await
            .unwrap_or_else(|e| panic!("could not open debt: {}", e))
    }

    pub async fn trust_of(&self, id: IdentityId) -> u8 {
        self.identities
            .get(id)
            .await
            .map(|identity| identity.trust.score)
            .unwrap_or_else(|e| panic!("unknown identity {}: {}", id, e))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
