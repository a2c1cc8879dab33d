//! RocksDB storage backend for debt records.

use async_trait::async_trait;
use iou_core::{Debt, DebtId, IdentityId, LedgerError, PaymentStatus};
use iou_ledger::LedgerStore;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;
use tokio::sync::Mutex;

/// Column family holding JSON-encoded debts keyed by debt id.
const CF_DEBTS: &str = "debts";

/// RocksDB-backed [`LedgerStore`].
///
/// RocksDB has no compare-and-swap of its own, so every write goes through
/// `write_lock`: the stored version is read and checked under the lock, then
/// the new record is written before it is released.
pub struct RocksLedgerStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksLedgerStore {
    /// Open or create a RocksDB database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_DEBTS, Options::default())];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        tracing::info!(path = %path.display(), "rocksdb ledger store opened");

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn debts_cf(&self) -> Result<&ColumnFamily, LedgerError> {
        self.db
            .cf_handle(CF_DEBTS)
            .ok_or_else(|| LedgerError::Storage(format!("column family '{}' not found", CF_DEBTS)))
    }

    fn key(id: DebtId) -> String {
        id.to_string()
    }

    fn read(&self, id: DebtId) -> Result<Option<Debt>, LedgerError> {
        let cf = self.debts_cf()?;
        let raw = self
            .db
            .get_cf(cf, Self::key(id))
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        raw.map(|bytes| serde_json::from_slice(&bytes).map_err(LedgerError::from))
            .transpose()
    }

    fn write(&self, debt: &Debt) -> Result<(), LedgerError> {
        let cf = self.debts_cf()?;
        let bytes = serde_json::to_vec(debt)?;
        self.db
            .put_cf(cf, Self::key(debt.id), bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn scan<F>(&self, keep: F) -> Result<Vec<Debt>, LedgerError>
    where
        F: Fn(&Debt) -> bool,
    {
        let cf = self.debts_cf()?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| LedgerError::Storage(e.to_string()))?;
            let debt: Debt = serde_json::from_slice(&value)?;
            if keep(&debt) {
                out.push(debt);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl LedgerStore for RocksLedgerStore {
    async fn insert(&self, mut debt: Debt) -> Result<Debt, LedgerError> {
        let _guard = self.write_lock.lock().await;
        if self.read(debt.id)?.is_some() {
            return Err(LedgerError::Storage(format!("debt {} already exists", debt.id)));
        }
        debt.version = 1;
        self.write(&debt)?;
        Ok(debt)
    }

    async fn load(&self, id: DebtId) -> Result<Option<Debt>, LedgerError> {
        self.read(id)
    }

    async fn swap(&self, expected_version: u64, mut debt: Debt) -> Result<Debt, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let stored = self.read(debt.id)?.ok_or(LedgerError::NotFound(debt.id))?;
        if stored.version != expected_version {
            return Err(LedgerError::Conflict {
                debt_id: debt.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        debt.version = expected_version + 1;
        self.write(&debt)?;
        Ok(debt)
    }

    async fn list_for(&self, identity: IdentityId) -> Result<Vec<Debt>, LedgerError> {
        self.scan(|d| d.is_participant(identity))
    }

    async fn scan_active(&self) -> Result<Vec<Debt>, LedgerError> {
        self.scan(|d| d.payment_status == PaymentStatus::Active)
    }

    fn store_id(&self) -> &str {
        "rocksdb"
    }
}
