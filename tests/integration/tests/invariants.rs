//! Integration test: randomized operation sequences against the full stack.
//!
//! Every step picks a party and an operation at random; whatever the engine
//! answers, the stored record must keep the balance and status invariants.

use chrono::{Duration, Utc};
use iou_core::{Debt, DebtPatch, IdentityId, LedgerError, NewDebt, OverdueStatus, PaymentStatus};
use iou_events::DebtEventKind;
use iou_integration_tests::Harness;
use iou_scheduler::OverdueScanner;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STEPS: usize = 200;

fn check(debt: &Debt) {
    assert!(debt.amount_remaining <= debt.amount_total, "remaining above total: {:?}", debt);
    if debt.payment_status == PaymentStatus::Paid {
        assert_eq!(debt.amount_remaining, 0, "paid with balance: {:?}", debt);
    }
    assert_eq!(
        debt.pending_payment.is_some(),
        debt.payment_status == PaymentStatus::PendingVerification,
        "pending payment out of step with status: {:?}",
        debt
    );
}

async fn step(h: &Harness, rng: &mut StdRng, debt: &Debt, parties: [IdentityId; 2]) -> Result<Debt, LedgerError> {
    let actor = parties[rng.gen_range(0..2)];
    let amount = rng.gen_range(0..=debt.amount_total / 2 + 1);
    match rng.gen_range(0..6) {
        0 => h.engine.request_payment(debt.id, actor, amount).await,
        1 => h.engine.acknowledge_payment(debt.id, actor, amount).await,
        2 => h.engine.verify_payment(debt.id, actor, rng.gen_bool(0.5)).await,
        3 => {
            let patch = DebtPatch {
                description: Some(format!("note {}", rng.gen::<u16>())),
                ..DebtPatch::default()
            };
            h.engine.update_debt(debt.id, actor, patch).await
        }
        4 if rng.gen_bool(0.1) => h.engine.cancel_debt(debt.id, actor).await,
        _ => h.engine.get_debt(debt.id, actor).await,
    }
}

#[tokio::test]
async fn test_random_sequences_keep_invariants() {
    for seed in [7u64, 42, 1337] {
        let mut rng = StdRng::seed_from_u64(seed);
        let h = Harness::new();
        let (alice, bob) = h.alice_and_bob().await;
        let mut debt = h.open(alice, bob, rng.gen_range(1..=2_000)).await;
        let mut was_paid = false;

        for _ in 0..STEPS {
            let before = debt.clone();
            let result = step(&h, &mut rng, &debt, [alice, bob]).await;
            debt = h.engine.get_debt(debt.id, alice).await.unwrap();
            check(&debt);

            match result {
                Ok(_) => assert!(debt.amount_remaining <= before.amount_remaining),
                Err(e) => {
                    assert_eq!(debt, before, "failed call changed the debt: {}", e);
                }
            }
            if was_paid {
                assert_eq!(debt, before, "paid debt moved");
            }
            was_paid = debt.payment_status == PaymentStatus::Paid;
        }

        // A settled debt bumps the debtor's trust at most once
        let bumps = h.sink.count_kind(bob, debt.id, DebtEventKind::PaymentConfirmed)
            + h.sink.count_kind(bob, debt.id, DebtEventKind::PaymentAccepted);
        let trust = h.trust_of(bob).await;
        assert!(trust == 50 || trust == 53, "seed {}: trust {} after {} settlements", seed, trust, bumps);
    }
}

#[tokio::test]
async fn test_overdue_scan_is_idempotent_over_many_debts() {
    let mut rng = StdRng::seed_from_u64(99);
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let now = Utc::now();

    let mut expected_overdue = 0;
    for _ in 0..40 {
        let offset = rng.gen_range(-10..=10);
        let mut new = NewDebt::new(alice, bob, rng.gen_range(1..=500));
        new.due_date = Some(now + Duration::days(offset) + Duration::minutes(1));
        h.engine.create_debt(new).await.unwrap();
        if offset < 0 {
            expected_overdue += 1;
        }
    }

    let first = h.scheduler.trigger(OverdueScanner::NAME, now).await.unwrap();
    assert_eq!(first.applied, expected_overdue);

    let snapshot = h.engine.list_debts(alice).await.unwrap();
    let second = h.scheduler.trigger(OverdueScanner::NAME, now).await.unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(h.engine.list_debts(alice).await.unwrap(), snapshot);

    let overdue = snapshot
        .iter()
        .filter(|d| d.overdue_status == OverdueStatus::Overdue)
        .count();
    assert_eq!(overdue, expected_overdue);
}
