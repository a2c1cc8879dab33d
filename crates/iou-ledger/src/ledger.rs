use chrono::Utc;
use iou_core::{Debt, DebtId, IdentityId, LedgerError, NewDebt, Transition};
use std::sync::Arc;

use crate::memory::InMemoryLedgerStore;
use crate::traits::LedgerStore;

/// Owns debt records and serializes every change through compare-and-swap.
pub struct DebtLedger {
    store: Arc<dyn LedgerStore>,
}

impl DebtLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        tracing::info!(store = store.store_id(), "debt ledger ready");
        Self { store }
    }

    /// Ledger over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Open a debt. Fails with `Validation` for a zero amount and
    /// `SelfReference` when both parties are the same identity.
    pub async fn create(&self, new: NewDebt) -> Result<Debt, LedgerError> {
        let debt = Debt::open(new, Utc::now())?;
        debt.check_invariants()?;
        let stored = self.store.insert(debt).await?;
        tracing::info!(
            debt_id = %stored.id,
            sender = %stored.sender_identity_id,
            receiver = %stored.receiver_identity_id,
            amount_total = stored.amount_total,
            "debt created"
        );
        Ok(stored)
    }

    pub async fn get(&self, id: DebtId) -> Result<Debt, LedgerError> {
        self.store.load(id).await?.ok_or(LedgerError::NotFound(id))
    }

    /// Apply `mutation` to the debt if it is still at `expected_version`.
    ///
    /// The mutation sees the current record and returns the candidate next
    /// record. Invariants and immutable fields are checked before anything is
    /// written; the store re-checks the version atomically on write.
    pub async fn compare_and_swap<F>(
        &self,
        id: DebtId,
        expected_version: u64,
        mutation: F,
    ) -> Result<Transition, LedgerError>
    where
        F: Fn(&Debt) -> Result<Transition, LedgerError> + Send + Sync,
    {
        let current = self.get(id).await?;
        if current.version != expected_version {
            return Err(LedgerError::Conflict {
                debt_id: id,
                expected: expected_version,
                actual: current.version,
            });
        }
        self.swap_from(&current, &mutation).await
    }

    /// Read, mutate, and swap; on a lost race re-read and try exactly once more.
    pub async fn update<F>(&self, id: DebtId, mutation: F) -> Result<Transition, LedgerError>
    where
        F: Fn(&Debt) -> Result<Transition, LedgerError> + Send + Sync,
    {
        let current = self.get(id).await?;
        match self.swap_from(&current, &mutation).await {
            Err(LedgerError::Conflict {
                expected, actual, ..
            }) => {
                tracing::debug!(debt_id = %id, expected, actual, "lost race, retrying once");
                let fresh = self.get(id).await?;
                self.swap_from(&fresh, &mutation).await
            }
            other => other,
        }
    }

    /// Debts where `identity` is either party, newest first.
    pub async fn list_for(&self, identity: IdentityId) -> Result<Vec<Debt>, LedgerError> {
        let mut debts = self.store.list_for(identity).await?;
        debts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(debts)
    }

    /// Debts whose payment status is `active`.
    pub async fn scan_active(&self) -> Result<Vec<Debt>, LedgerError> {
        self.store.scan_active().await
    }

    async fn swap_from<F>(&self, current: &Debt, mutation: &F) -> Result<Transition, LedgerError>
    where
        F: Fn(&Debt) -> Result<Transition, LedgerError> + Send + Sync,
    {
        let Transition { debt, outcome } = mutation(current)?;
        Self::check_candidate(current, &debt)?;
        let committed = self.store.swap(current.version, debt).await?;
        tracing::info!(
            debt_id = %committed.id,
            version = committed.version,
            status = %committed.payment_status,
            overdue = %committed.overdue_status,
            remaining = committed.amount_remaining,
            "debt committed"
        );
        Ok(Transition {
            debt: committed,
            outcome,
        })
    }

    fn check_candidate(current: &Debt, next: &Debt) -> Result<(), LedgerError> {
        if next.id != current.id
            || next.sender_identity_id != current.sender_identity_id
            || next.receiver_identity_id != current.receiver_identity_id
            || next.amount_total != current.amount_total
            || next.created_at != current.created_at
        {
            return Err(LedgerError::Validation(
                "mutation changed an immutable field".into(),
            ));
        }
        if next.amount_remaining > current.amount_remaining {
            return Err(LedgerError::Validation(
                "amount_remaining may never increase".into(),
            ));
        }
        if current.is_paid() {
            return Err(LedgerError::InvalidState(format!(
                "debt {} is already paid",
                current.id
            )));
        }
        next.check_invariants()
    }
}
