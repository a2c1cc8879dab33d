//! Side effects that follow a committed transition.
//!
//! The ledger commit is the source of truth. Everything here runs after it:
//! one inline attempt each, then bounded retries in a background task. A side
//! effect never fails the operation that produced it.

use iou_core::{IdentityId, LedgerError, Outcome};
use iou_events::{DebtEvent, DebtEventKind, EventBus, NotificationRefs, NotificationSink, Room};
use iou_identity::IdentityStore;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SettlementConfig;

/// One unit of post-commit work.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Real-time fan-out to a room.
    Publish { room: Room, event: DebtEvent },
    /// Durable notification for one user.
    Notify {
        user_id: IdentityId,
        kind: DebtEventKind,
        title: String,
        body: String,
        refs: NotificationRefs,
    },
    /// Trust-score nudge on the identity store.
    AdjustTrust { identity: IdentityId, delta: i16 },
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish { room, event } => write!(f, "publish {} to {}", event.name, room),
            Self::Notify { user_id, kind, .. } => write!(f, "notify {} of {}", user_id, kind),
            Self::AdjustTrust { identity, delta } => {
                write!(f, "adjust trust of {} by {}", identity, delta)
            }
        }
    }
}

/// Build the side effects of one committed event.
///
/// Publishes go to both participants' rooms and the debt room. The
/// notification goes to the counterparty of the actor, or to both
/// participants when the scheduler caused the event. A payment that fully
/// settles the debt also bumps the debtor's trust score.
pub fn effects_for(event: &DebtEvent, trust_bump: i16) -> Vec<SideEffect> {
    let debt = &event.debt;
    let mut effects: Vec<SideEffect> = Room::for_debt(debt)
        .into_iter()
        .map(|room| SideEffect::Publish {
            room,
            event: event.clone(),
        })
        .collect();

    let recipients: Vec<IdentityId> = match event.actor {
        Some(actor) => debt.counterparty(actor).into_iter().collect(),
        None => debt.participants().to_vec(),
    };
    let (title, body) = describe(event);
    for user_id in recipients {
        effects.push(SideEffect::Notify {
            user_id,
            kind: event.name,
            title: title.clone(),
            body: body.clone(),
            refs: NotificationRefs::debt(debt.id).with_actor(event.actor),
        });
    }

    if event.reason.fully_settled() && trust_bump != 0 {
        effects.push(SideEffect::AdjustTrust {
            identity: debt.receiver_identity_id,
            delta: trust_bump,
        });
    }
    effects
}

fn describe(event: &DebtEvent) -> (String, String) {
    let debt = &event.debt;
    match event.reason {
        Outcome::Created { amount_total } => (
            "New debt".into(),
            format!("A debt of {} was recorded", amount_total),
        ),
        Outcome::PaymentRequested { amount } => (
            "Payment awaiting confirmation".into(),
            format!("A payment of {} was reported and needs your confirmation", amount),
        ),
        Outcome::PaymentAccepted { amount, .. } => (
            "Payment accepted".into(),
            format!("Your payment of {} was confirmed, {} remaining", amount, debt.amount_remaining),
        ),
        Outcome::PaymentRejected { amount } => (
            "Payment rejected".into(),
            format!("Your reported payment of {} was not confirmed", amount),
        ),
        Outcome::PaymentConfirmed { amount, .. } => (
            "Payment received".into(),
            format!("A payment of {} was recorded, {} remaining", amount, debt.amount_remaining),
        ),
        Outcome::Updated { due_date_moved } => (
            "Debt updated".into(),
            if due_date_moved {
                "The due date of a debt changed".into()
            } else {
                "The details of a debt changed".into()
            },
        ),
        Outcome::Cancelled { forgiven } => (
            "Debt cancelled".into(),
            format!("A debt was cancelled and {} forgiven", forgiven),
        ),
        Outcome::MarkedOverdue => (
            "Debt overdue".into(),
            format!("A debt with {} remaining is past its due date", debt.amount_remaining),
        ),
        Outcome::ReminderDue { days_before, .. } => (
            if days_before == 0 {
                "Payment due today".into()
            } else {
                "Payment due soon".into()
            },
            format!(
                "{} is due in {} day(s)",
                debt.amount_remaining, days_before
            ),
        ),
    }
}

/// Runs side effects against the collaborators.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    bus: Arc<dyn EventBus>,
    sink: Arc<dyn NotificationSink>,
    identities: Arc<dyn IdentityStore>,
    max_attempts: u32,
    backoff: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl SideEffectDispatcher {
    pub fn new(
        bus: Arc<dyn EventBus>,
        sink: Arc<dyn NotificationSink>,
        identities: Arc<dyn IdentityStore>,
        config: &SettlementConfig,
    ) -> Self {
        Self {
            bus,
            sink,
            identities,
            max_attempts: config.side_effect_max_attempts.max(1),
            backoff: config.backoff(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attempt every effect once, in order. Failed effects are handed to a
    /// background retry task. Returns how many were deferred.
    pub async fn dispatch(&self, effects: Vec<SideEffect>) -> usize {
        let mut failed = Vec::new();
        for effect in effects {
            if let Err(e) = self.run(&effect).await {
                tracing::warn!(effect = %effect, error = %e, "side effect failed, scheduling retry");
                failed.push(effect);
            }
        }

        let deferred = failed.len();
        if deferred == 0 {
            return 0;
        }
        if self.max_attempts <= 1 {
            for effect in &failed {
                tracing::error!(effect = %effect, "side effect abandoned, no retries configured");
            }
            return deferred;
        }

        self.in_flight.fetch_add(deferred, Ordering::SeqCst);
        let dispatcher = self.clone();
        tokio::spawn(async move {
            for effect in failed {
                dispatcher.retry(effect).await;
                dispatcher.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });
        deferred
    }

    /// Effects still waiting in a retry task.
    pub fn pending_retries(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every deferred effect has succeeded or been abandoned.
    pub async fn wait_idle(&self) {
        while self.pending_retries() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn retry(&self, effect: SideEffect) {
        for attempt in 2..=self.max_attempts {
            tokio::time::sleep(self.backoff * (attempt - 1)).await;
            match self.run(&effect).await {
                Ok(()) => {
                    tracing::info!(effect = %effect, attempt, "side effect succeeded on retry");
                    return;
                }
                Err(e) => {
                    tracing::warn!(effect = %effect, attempt, error = %e, "side effect retry failed");
                }
            }
        }
        let err = LedgerError::SideEffect(effect.to_string());
        tracing::error!(
            effect = %effect,
            attempts = self.max_attempts,
            error = %err,
            "side effect abandoned"
        );
    }

    async fn run(&self, effect: &SideEffect) -> Result<(), LedgerError> {
        match effect {
            SideEffect::Publish { room, event } => {
                self.bus.publish(room, event).await?;
            }
            SideEffect::Notify {
                user_id,
                kind,
                title,
                body,
                refs,
            } => {
                self.sink
                    .record(*user_id, *kind, title, body, refs.clone())
                    .await?;
            }
            SideEffect::AdjustTrust { identity, delta } => {
                self.identities.adjust_trust(*identity, *delta).await?;
            }
        }
        Ok(())
    }
}
