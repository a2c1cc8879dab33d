//! IOU Identity Layer
//!
//! Resolves phone numbers to stable identities and keeps the bounded trust
//! score that settlement nudges when a debt is paid off.

pub mod error;
pub mod trust_score;
pub mod store;

pub use error::IdentityError;
pub use trust_score::TrustScore;
pub use store::{Identity, IdentityStore, InMemoryIdentityStore};
