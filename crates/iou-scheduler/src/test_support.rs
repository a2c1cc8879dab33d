use iou_core::IdentityId;
use iou_events::{BroadcastEventBus, InMemoryNotificationSink};
use iou_identity::{IdentityStore, InMemoryIdentityStore};
use iou_ledger::DebtLedger;
use iou_settlement::{SettlementConfig, SettlementEngine};
use std::sync::Arc;

pub struct Fixture {
    pub engine: Arc<SettlementEngine>,
    pub sink: Arc<InMemoryNotificationSink>,
    pub creditor: IdentityId,
    pub debtor: IdentityId,
}

pub async fn fixture() -> Fixture {
    let identities = Arc::new(InMemoryIdentityStore::new());
    let creditor = identities.resolve_or_create("+15550100001", "Alice").await.unwrap();
    let debtor = identities.resolve_or_create("+15550100002", "Bob").await.unwrap();
    let sink = Arc::new(InMemoryNotificationSink::new());
    let engine = Arc::new(SettlementEngine::new(
        Arc::new(DebtLedger::in_memory()),
        identities,
        Arc::new(BroadcastEventBus::default()),
        sink.clone(),
        SettlementConfig::default(),
    ));
    Fixture {
        engine,
        sink,
        creditor,
        debtor,
    }
}
