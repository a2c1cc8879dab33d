//! IOU Settlement Engine
//!
//! The dual-confirmation payment protocol on top of [`iou_ledger::DebtLedger`].
//! Each operation commits through the ledger first; events, notifications and
//! trust-score adjustments follow as independently retried side effects.

pub mod config;
pub mod side_effects;
pub mod engine;

pub use config::SettlementConfig;
pub use side_effects::{effects_for, SideEffect, SideEffectDispatcher};
pub use engine::{ContactDebt, SettlementEngine};
