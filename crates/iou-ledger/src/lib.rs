//! IOU Debt Ledger
//!
//! Authoritative storage of debt records. Every mutation after creation goes
//! through [`DebtLedger::compare_and_swap`] (or [`DebtLedger::update`], which
//! adds one automatic retry), so two writers can never both commit from the
//! same stale snapshot.

pub mod traits;
pub mod memory;
pub mod ledger;

pub use traits::LedgerStore;
pub use memory::InMemoryLedgerStore;
pub use ledger::DebtLedger;
