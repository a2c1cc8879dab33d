//! Integration test: settlement lifecycle across ledger, engine, identity
//! and event crates.

use iou_core::{DebtPatch, LedgerError, PaymentStatus, PaymentType, CANCELLED_MARKER};
use iou_events::DebtEventKind;
use iou_integration_tests::Harness;
use iou_settlement::SettlementConfig;

// =========================================================================
// Request, verify, settle
// =========================================================================

#[tokio::test]
async fn test_create_request_verify_settles_and_bumps_trust() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;

    // Create
    let debt = h.open(alice, bob, 1000).await;
    assert_eq!(debt.payment_status, PaymentStatus::Active);
    assert_eq!(debt.amount_remaining, 1000);

    // Debtor reports the full amount
    let pending = h.engine.request_payment(debt.id, bob, 1000).await.unwrap();
    assert_eq!(pending.payment_status, PaymentStatus::PendingVerification);
    let proposal = pending.pending_payment.as_ref().unwrap();
    assert_eq!(proposal.amount, 1000);
    assert_eq!(proposal.payment_type, PaymentType::ReceiverToSender);

    // Creditor accepts
    let paid = h.engine.verify_payment(debt.id, alice, true).await.unwrap();
    assert_eq!(paid.amount_remaining, 0);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.pending_payment.is_none());
    assert_eq!(h.trust_of(bob).await, 53);
    assert_eq!(h.trust_of(alice).await, 50);
}

#[tokio::test]
async fn test_trust_bump_caps_at_maximum() {
    let h = Harness::with_config(SettlementConfig {
        trust_bump: 40,
        ..SettlementConfig::default()
    });
    let (alice, bob) = h.alice_and_bob().await;

    for _ in 0..2 {
        let debt = h.open(alice, bob, 10).await;
        h.engine.acknowledge_payment(debt.id, alice, 10).await.unwrap();
    }
    assert_eq!(h.trust_of(bob).await, 100);
}

#[tokio::test]
async fn test_partial_acknowledgement_stays_active() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 500).await;

    let partial = h.engine.acknowledge_payment(debt.id, alice, 200).await.unwrap();
    assert_eq!(partial.amount_remaining, 300);
    assert_eq!(partial.payment_status, PaymentStatus::Active);
    assert_eq!(h.trust_of(bob).await, 50);

    let settled = h.engine.acknowledge_payment(debt.id, alice, 300).await.unwrap();
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    assert_eq!(h.trust_of(bob).await, 53);
}

#[tokio::test]
async fn test_second_request_while_pending_is_rejected() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 500).await;

    let pending = h.engine.request_payment(debt.id, bob, 200).await.unwrap();
    let err = h.engine.request_payment(debt.id, bob, 100).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
    assert!(err.requires_resync());

    let unchanged = h.engine.get_debt(debt.id, alice).await.unwrap();
    assert_eq!(unchanged, pending);
}

#[tokio::test]
async fn test_reject_restores_prior_state() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let before = h.open(alice, bob, 800).await;

    h.engine.request_payment(before.id, bob, 300).await.unwrap();
    let after = h.engine.verify_payment(before.id, alice, false).await.unwrap();

    assert_eq!(after.payment_status, before.payment_status);
    assert_eq!(after.amount_remaining, before.amount_remaining);
    assert_eq!(after.pending_payment, None);
    assert_eq!(after.last_settlement, None);
    assert_eq!(after.description, before.description);
    assert_eq!(after.version, before.version + 2);
}

#[tokio::test]
async fn test_request_above_remaining_changes_nothing() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 400).await;

    let err = h.engine.request_payment(debt.id, bob, 401).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(h.engine.get_debt(debt.id, bob).await.unwrap(), debt);

    // Exactly the remainder is fine
    h.engine.request_payment(debt.id, bob, 400).await.unwrap();
    let paid = h.engine.verify_payment(debt.id, alice, true).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
}

// =========================================================================
// Roles and terminal state
// =========================================================================

#[tokio::test]
async fn test_roles_are_enforced() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let carol = h.party("+15550100003", "Carol").await;
    let debt = h.open(alice, bob, 100).await;

    assert!(matches!(
        h.engine.request_payment(debt.id, alice, 10).await,
        Err(LedgerError::Forbidden(_))
    ));
    assert!(matches!(
        h.engine.acknowledge_payment(debt.id, bob, 10).await,
        Err(LedgerError::Forbidden(_))
    ));
    assert!(matches!(h.engine.cancel_debt(debt.id, bob).await, Err(LedgerError::Forbidden(_))));
    assert!(matches!(
        h.engine.request_payment(debt.id, carol, 10).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(h.engine.get_debt(debt.id, carol).await, Err(LedgerError::NotFound(_))));

    h.engine.request_payment(debt.id, bob, 10).await.unwrap();
    assert!(matches!(
        h.engine.verify_payment(debt.id, bob, true).await,
        Err(LedgerError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_cancel_is_terminal_and_does_not_bump_trust() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 900).await;
    h.engine.acknowledge_payment(debt.id, alice, 100).await.unwrap();

    let cancelled = h.engine.cancel_debt(debt.id, alice).await.unwrap();
    assert_eq!(cancelled.payment_status, PaymentStatus::Paid);
    assert_eq!(cancelled.amount_remaining, 0);
    assert!(cancelled.description.ends_with(CANCELLED_MARKER));
    assert_eq!(h.trust_of(bob).await, 50);
    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::Cancelled), 1);

    assert!(matches!(h.engine.cancel_debt(debt.id, alice).await, Err(LedgerError::InvalidState(_))));
    assert!(matches!(
        h.engine.acknowledge_payment(debt.id, alice, 1).await,
        Err(LedgerError::InvalidState(_))
    ));
    assert!(matches!(
        h.engine
            .update_debt(
                debt.id,
                alice,
                DebtPatch {
                    description: Some("reopened".into()),
                    ..DebtPatch::default()
                }
            )
            .await,
        Err(LedgerError::InvalidState(_))
    ));

    // Still listed: cancellation is a soft close
    assert_eq!(h.engine.list_debts(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_listing_covers_both_roles() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let carol = h.party("+15550100003", "Carol").await;

    let first = h.open(alice, bob, 10).await;
    let second = h.open(bob, carol, 20).await;
    let third = h.open(carol, alice, 30).await;

    let ids: Vec<_> = h.engine.list_debts(alice).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![third.id, first.id]);
    let ids: Vec<_> = h.engine.list_debts(bob).await.unwrap().iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}
