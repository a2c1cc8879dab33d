use chrono::{DateTime, Utc};
use iou_core::{
    Actor, Amount, Debt, DebtCommand, DebtId, DebtPatch, DebtStateMachine, IdentityId,
    LedgerError, NewDebt, Outcome, Reminders, Transition,
};
use iou_events::{DebtEvent, EventBus, NotificationSink};
use iou_identity::IdentityStore;
use iou_ledger::DebtLedger;
use std::sync::Arc;

use crate::config::SettlementConfig;
use crate::side_effects::{effects_for, SideEffectDispatcher};

/// A debt whose debtor is known only by phone number.
#[derive(Debug, Clone)]
pub struct ContactDebt {
    pub phone: String,
    pub display_name: String,
    pub amount_total: Amount,
    pub due_date: Option<DateTime<Utc>>,
    pub reminders: Option<Reminders>,
    pub description: Option<String>,
}

/// Dual-confirmation settlement on top of the debt ledger.
///
/// Every operation is one ledger compare-and-swap (retried once on conflict)
/// followed by side effects. A debtor's claim of payment is only a request
/// until the creditor verifies it; a creditor's acknowledgement settles
/// immediately.
pub struct SettlementEngine {
    ledger: Arc<DebtLedger>,
    identities: Arc<dyn IdentityStore>,
    dispatcher: SideEffectDispatcher,
    config: SettlementConfig,
}

impl SettlementEngine {
    pub fn new(
        ledger: Arc<DebtLedger>,
        identities: Arc<dyn IdentityStore>,
        bus: Arc<dyn EventBus>,
        sink: Arc<dyn NotificationSink>,
        config: SettlementConfig,
    ) -> Self {
        let dispatcher = SideEffectDispatcher::new(bus, sink, identities.clone(), &config);
        Self {
            ledger,
            identities,
            dispatcher,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<DebtLedger> {
        &self.ledger
    }

    pub fn dispatcher(&self) -> &SideEffectDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Open a debt on behalf of its creditor (`new.sender`).
    pub async fn create_debt(&self, new: NewDebt) -> Result<Debt, LedgerError> {
        let creditor = new.sender;
        let debt = self.ledger.create(new).await?;
        let event = DebtEvent::new(
            debt.clone(),
            Outcome::Created {
                amount_total: debt.amount_total,
            },
            Some(creditor),
        );
        self.dispatcher
            .dispatch(effects_for(&event, self.config.trust_bump))
            .await;
        Ok(debt)
    }

    /// Open a debt against a phone number, resolving (or creating) the
    /// debtor's identity first.
    pub async fn create_debt_for_contact(
        &self,
        creditor: IdentityId,
        contact: ContactDebt,
    ) -> Result<Debt, LedgerError> {
        let debtor = self
            .identities
            .resolve_or_create(&contact.phone, &contact.display_name)
            .await?;
        let mut new = NewDebt::new(creditor, debtor, contact.amount_total);
        new.due_date = contact.due_date;
        new.reminders = contact.reminders;
        new.description = contact.description;
        self.create_debt(new).await
    }

    /// Debtor reports a payment; the creditor must verify it.
    pub async fn request_payment(
        &self,
        debt_id: DebtId,
        actor: IdentityId,
        amount: Amount,
    ) -> Result<Debt, LedgerError> {
        self.party(debt_id, actor, DebtCommand::RequestPayment { amount })
            .await
    }

    /// Creditor records a payment received. Settles immediately.
    pub async fn acknowledge_payment(
        &self,
        debt_id: DebtId,
        actor: IdentityId,
        amount: Amount,
    ) -> Result<Debt, LedgerError> {
        self.party(debt_id, actor, DebtCommand::AcknowledgePayment { amount })
            .await
    }

    /// Counterparty of the requester accepts or rejects the pending payment.
    pub async fn verify_payment(
        &self,
        debt_id: DebtId,
        actor: IdentityId,
        accept: bool,
    ) -> Result<Debt, LedgerError> {
        self.party(debt_id, actor, DebtCommand::VerifyPayment { accept })
            .await
    }

    pub async fn update_debt(
        &self,
        debt_id: DebtId,
        actor: IdentityId,
        patch: DebtPatch,
    ) -> Result<Debt, LedgerError> {
        self.party(debt_id, actor, DebtCommand::Update(patch)).await
    }

    /// Creditor forgives the remainder. Soft close: the record stays.
    pub async fn cancel_debt(&self, debt_id: DebtId, actor: IdentityId) -> Result<Debt, LedgerError> {
        self.party(debt_id, actor, DebtCommand::Cancel).await
    }

    /// Fetch a debt. Non-participants get `NotFound`.
    pub async fn get_debt(&self, debt_id: DebtId, actor: IdentityId) -> Result<Debt, LedgerError> {
        let debt = self.ledger.get(debt_id).await?;
        if !debt.is_participant(actor) {
            return Err(LedgerError::NotFound(debt_id));
        }
        Ok(debt)
    }

    /// Every debt `actor` is party to, in either role, newest first.
    pub async fn list_debts(&self, actor: IdentityId) -> Result<Vec<Debt>, LedgerError> {
        self.ledger.list_for(actor).await
    }

    /// Commit `command` for `actor` at `now`, then dispatch its side effects.
    ///
    /// This is the single mutation path shared by client operations and the
    /// background scanners.
    pub async fn execute(
        &self,
        debt_id: DebtId,
        actor: Actor,
        command: DebtCommand,
        now: DateTime<Utc>,
    ) -> Result<Transition, LedgerError> {
        let transition = self
            .ledger
            .update(debt_id, |debt| DebtStateMachine::apply(debt, actor, &command, now))
            .await
            .map_err(|e| {
                tracing::debug!(
                    debt_id = %debt_id,
                    actor = %actor,
                    command = command.name(),
                    kind = %e.kind(),
                    error = %e,
                    "operation rejected"
                );
                e
            })?;

        let event = DebtEvent::new(
            transition.debt.clone(),
            transition.outcome,
            match actor {
                Actor::Party(id) => Some(id),
                Actor::System => None,
            },
        );
        self.dispatcher
            .dispatch(effects_for(&event, self.config.trust_bump))
            .await;
        Ok(transition)
    }

    async fn party(
        &self,
        debt_id: DebtId,
        actor: IdentityId,
        command: DebtCommand,
    ) -> Result<Debt, LedgerError> {
        self.execute(debt_id, Actor::Party(actor), command, Utc::now())
            .await
            .map(|t| t.debt)
    }
}
