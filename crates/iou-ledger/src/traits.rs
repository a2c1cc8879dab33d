use async_trait::async_trait;
use iou_core::{Debt, DebtId, IdentityId, LedgerError};

/// Versioned debt storage.
///
/// Each implementation keeps a per-record version. `swap` is the only write
/// path after `insert` and must be atomic with respect to the version check.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new record at version 1. Fails if the id is taken.
    async fn insert(&self, debt: Debt) -> Result<Debt, LedgerError>;

    /// Load a record by id.
    async fn load(&self, id: DebtId) -> Result<Option<Debt>, LedgerError>;

    /// Replace the stored record if its version still equals
    /// `expected_version`; the stored copy gets `expected_version + 1`.
    /// Returns [`LedgerError::Conflict`] otherwise.
    async fn swap(&self, expected_version: u64, debt: Debt) -> Result<Debt, LedgerError>;

    /// Every debt where `identity` is sender or receiver, in no particular order.
    async fn list_for(&self, identity: IdentityId) -> Result<Vec<Debt>, LedgerError>;

    /// Every debt whose payment status is `active`.
    async fn scan_active(&self) -> Result<Vec<Debt>, LedgerError>;

    /// Short name of the backend (e.g. "memory").
    fn store_id(&self) -> &str;
}
