//! Room naming for the real-time fan-out.

use iou_core::{Debt, DebtId, IdentityId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EventError;

/// Room name prefixes.
pub mod prefixes {
    /// Personal room of one identity.
    pub const USER: &str = "user";

    /// Shared room of one debt.
    pub const DEBT: &str = "debt";
}

/// A logical real-time channel that clients subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Room {
    User(IdentityId),
    Debt(DebtId),
}

impl Room {
    /// Every room a change to `debt` is published to: both participants'
    /// personal rooms, then the debt's own room.
    pub fn for_debt(debt: &Debt) -> [Room; 3] {
        [
            Room::User(debt.sender_identity_id),
            Room::User(debt.receiver_identity_id),
            Room::Debt(debt.id),
        ]
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "{}:{}", prefixes::USER, id),
            Room::Debt(id) => write!(f, "{}:{}", prefixes::DEBT, id),
        }
    }
}

impl FromStr for Room {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once(':')
            .ok_or_else(|| EventError::InvalidRoom(s.to_string()))?;
        match prefix {
            prefixes::USER => id
                .parse()
                .map(Room::User)
                .map_err(|_| EventError::InvalidRoom(s.to_string())),
            prefixes::DEBT => id
                .parse()
                .map(Room::Debt)
                .map_err(|_| EventError::InvalidRoom(s.to_string())),
            _ => Err(EventError::InvalidRoom(s.to_string())),
        }
    }
}

impl TryFrom<String> for Room {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}
