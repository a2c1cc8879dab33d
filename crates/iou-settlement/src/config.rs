use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Trust-score delta applied to the debtor on full settlement.
    pub trust_bump: i16,
    /// Total attempts per side effect, the inline one included.
    pub side_effect_max_attempts: u32,
    /// Base delay between retries; attempt `n` waits `n * backoff`.
    pub side_effect_backoff_ms: u64,
}

impl SettlementConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.side_effect_backoff_ms)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            trust_bump: 3,
            side_effect_max_attempts: 5,
            side_effect_backoff_ms: 200,
        }
    }
}
