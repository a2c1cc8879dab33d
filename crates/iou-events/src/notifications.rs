//! Durable per-user record of "things that happened to me".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use iou_core::{DebtId, IdentityId, NotificationId};
use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::events::DebtEventKind;

/// Entities a notification points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRefs {
    pub debt_id: Option<DebtId>,
    /// Identity whose action caused the notification.
    pub actor: Option<IdentityId>,
}

impl NotificationRefs {
    pub fn debt(debt_id: DebtId) -> Self {
        Self {
            debt_id: Some(debt_id),
            actor: None,
        }
    }

    pub fn with_actor(mut self, actor: Option<IdentityId>) -> Self {
        self.actor = actor;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: IdentityId,
    pub kind: DebtEventKind,
    pub title: String,
    pub body: String,
    pub refs: NotificationRefs,
    pub created_at: DateTime<Utc>,
}

/// Durable, queryable notification store.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn record(
        &self,
        user_id: IdentityId,
        kind: DebtEventKind,
        title: &str,
        body: &str,
        refs: NotificationRefs,
    ) -> Result<NotificationId, EventError>;
}

/// Notification store held in process memory.
pub struct InMemoryNotificationSink {
    by_user: DashMap<IdentityId, Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self {
            by_user: DashMap::new(),
        }
    }

    /// Notifications for `user_id`, newest first.
    pub fn list_for(&self, user_id: IdentityId) -> Vec<Notification> {
        let mut list = self
            .by_user
            .get(&user_id)
            .map(|v| v.value().clone())
            .unwrap_or_default();
        list.reverse();
        list
    }

    pub fn count_for(&self, user_id: IdentityId) -> usize {
        self.by_user.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Count of `kind` notifications for `user_id` about `debt_id`.
    pub fn count_kind(&self, user_id: IdentityId, debt_id: DebtId, kind: DebtEventKind) -> usize {
        self.by_user
            .get(&user_id)
            .map(|v| {
                v.iter()
                    .filter(|n| n.kind == kind && n.refs.debt_id == Some(debt_id))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for InMemoryNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn record(
        &self,
        user_id: IdentityId,
        kind: DebtEventKind,
        title: &str,
        body: &str,
        refs: NotificationRefs,
    ) -> Result<NotificationId, EventError> {
        let id = NotificationId::new();
        let notification = Notification {
            id,
            user_id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            refs,
            created_at: Utc::now(),
        };
        self.by_user.entry(user_id).or_default().push(notification);
        tracing::debug!(user_id = %user_id, kind = %kind, notification_id = %id, "notification recorded");
        Ok(id)
    }
}
