use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use iou_core::{Debt, DebtId, IdentityId, LedgerError, PaymentStatus};

use crate::traits::LedgerStore;

/// In-memory ledger store.
///
/// The version check and the write in `swap` happen under the DashMap shard
/// lock for that debt, which makes the swap atomic.
pub struct InMemoryLedgerStore {
    debts: DashMap<DebtId, Debt>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            debts: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.debts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.debts.is_empty()
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert(&self, mut debt: Debt) -> Result<Debt, LedgerError> {
        match self.debts.entry(debt.id) {
            Entry::Occupied(_) => Err(LedgerError::Storage(format!(
                "debt {} already exists",
                debt.id
            ))),
            Entry::Vacant(slot) => {
                debt.version = 1;
                slot.insert(debt.clone());
                Ok(debt)
            }
        }
    }

    async fn load(&self, id: DebtId) -> Result<Option<Debt>, LedgerError> {
        Ok(self.debts.get(&id).map(|d| d.value().clone()))
    }

    async fn swap(&self, expected_version: u64, mut debt: Debt) -> Result<Debt, LedgerError> {
        let mut stored = self
            .debts
            .get_mut(&debt.id)
            .ok_or(LedgerError::NotFound(debt.id))?;
        if stored.version != expected_version {
            return Err(LedgerError::Conflict {
                debt_id: debt.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        debt.version = expected_version + 1;
        *stored = debt.clone();
        Ok(debt)
    }

    async fn list_for(&self, identity: IdentityId) -> Result<Vec<Debt>, LedgerError> {
        Ok(self
            .debts
            .iter()
            .filter(|d| d.is_participant(identity))
            .map(|d| d.value().clone())
            .collect())
    }

    async fn scan_active(&self) -> Result<Vec<Debt>, LedgerError> {
        Ok(self
            .debts
            .iter()
            .filter(|d| d.payment_status == PaymentStatus::Active)
            .map(|d| d.value().clone())
            .collect())
    }

    fn store_id(&self) -> &str {
        "memory"
    }
}
