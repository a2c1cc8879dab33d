use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use iou_core::IdentityId;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::trust_score::TrustScore;

/// The stable party record a phone number resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    /// Normalized phone number.
    pub phone: String,
    pub display_name: String,
    pub trust: TrustScore,
    pub created_at: DateTime<Utc>,
}

/// Identity directory consumed by settlement.
///
/// Implementations may be remote services; every call is an independent
/// suspension point with its own failure modes.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a phone number to its identity, creating one on first sight.
    async fn resolve_or_create(
        &self,
        phone: &str,
        display_name: &str,
    ) -> Result<IdentityId, IdentityError>;

    /// Nudge an identity's trust score by `delta`, returning the new score.
    async fn adjust_trust(&self, id: IdentityId, delta: i16) -> Result<TrustScore, IdentityError>;

    /// Look up an identity.
    async fn get(&self, id: IdentityId) -> Result<Identity, IdentityError>;
}

/// Normalize a phone number: keep digits and a leading `+`, drop separators.
pub fn normalize_phone(raw: &str) -> Result<String, IdentityError> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };
    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(IdentityError::InvalidPhone(raw.to_string())),
        }
    }
    if !(6..=15).contains(&digits.len()) {
        return Err(IdentityError::InvalidPhone(raw.to_string()));
    }
    Ok(format!("{}{}", plus, digits))
}

/// In-process identity directory.
pub struct InMemoryIdentityStore {
    /// Normalized phone -> identity id.
    by_phone: DashMap<String, IdentityId>,
    identities: DashMap<IdentityId, Identity>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            by_phone: DashMap::new(),
            identities: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// All identities, in no particular order.
    pub fn all(&self) -> Vec<Identity> {
        self.identities.iter().map(|e| e.value().clone()).collect()
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn resolve_or_create(
        &self,
        phone: &str,
        display_name: &str,
    ) -> Result<IdentityId, IdentityError> {
        let phone = normalize_phone(phone)?;
        let id = *self
            .by_phone
            .entry(phone.clone())
            .or_insert_with(|| {
                let id = IdentityId::new();
                self.identities.insert(
                    id,
                    Identity {
                        id,
                        phone: phone.clone(),
                        display_name: display_name.to_string(),
                        trust: TrustScore::default(),
                        created_at: Utc::now(),
                    },
                );
                tracing::info!(identity_id = %id, "identity created");
                id
            })
            .value();
        Ok(id)
    }

    async fn adjust_trust(&self, id: IdentityId, delta: i16) -> Result<TrustScore, IdentityError> {
        let mut entry = self
            .identities
            .get_mut(&id)
            .ok_or(IdentityError::NotFound(id))?;
        entry.trust.adjust(delta);
        let trust = entry.trust;
        tracing::info!(
            identity_id = %id,
            previous = trust.previous,
            score = trust.score,
            "trust score adjusted"
        );
        Ok(trust)
    }

    async fn get(&self, id: IdentityId) -> Result<Identity, IdentityError> {
        self.identities
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(IdentityError::NotFound(id))
    }
}
