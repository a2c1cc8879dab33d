use serde::{Deserialize, Serialize};

/// Upper bound of the trust score.
pub const MAX_TRUST_SCORE: u8 = 100;

/// Score given to a newly resolved identity.
pub const INITIAL_TRUST_SCORE: u8 = 50;

/// Bounded reputation signal on an identity.
///
/// `score` always lies in `[0, MAX_TRUST_SCORE]`. `previous` keeps the value
/// before the most recent adjustment for display and rollback auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustScore {
    /// Current value.
    pub score: u8,
    /// Value before the last adjustment.
    pub previous: u8,
}

impl TrustScore {
    /// Create a score, clamping into range. `previous` starts equal to `score`.
    pub fn new(score: u8) -> Self {
        let score = score.min(MAX_TRUST_SCORE);
        Self {
            score,
            previous: score,
        }
    }

    /// Apply a signed delta, clamped to `[0, MAX_TRUST_SCORE]`.
    pub fn adjust(&mut self, delta: i16) {
        let next = (i16::from(self.score) + delta).clamp(0, i16::from(MAX_TRUST_SCORE));
        self.previous = self.score;
        // In range by the clamp above.
        self.score = next as u8;
    }

    /// Copy with `delta` applied.
    pub fn adjusted(mut self, delta: i16) -> Self {
        self.adjust(delta);
        self
    }

    /// Signed change made by the last adjustment.
    pub fn last_change(&self) -> i16 {
        i16::from(self.score) - i16::from(self.previous)
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::new(INITIAL_TRUST_SCORE)
    }
}
