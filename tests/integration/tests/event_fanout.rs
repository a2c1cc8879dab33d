//! Integration test: room fan-out and notifications for committed changes.

use iou_core::Outcome;
use iou_events::{DebtEventKind, Room};
use iou_integration_tests::Harness;
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn test_every_room_sees_changes_in_commit_order() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 600).await;

    let mut alice_room = h.bus.subscribe(Room::User(alice));
    let mut bob_room = h.bus.subscribe(Room::User(bob));
    let mut debt_room = h.bus.subscribe(Room::Debt(debt.id));

    h.engine.request_payment(debt.id, bob, 200).await.unwrap();
    h.engine.verify_payment(debt.id, alice, true).await.unwrap();
    h.engine.acknowledge_payment(debt.id, alice, 400).await.unwrap();

    for rx in [&mut alice_room, &mut bob_room, &mut debt_room] {
        let names: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap()).collect();
        let kinds: Vec<_> = names.iter().map(|e| e.name).collect();
        assert_eq!(
            kinds,
            vec![
                DebtEventKind::PaymentRequested,
                DebtEventKind::PaymentAccepted,
                DebtEventKind::PaymentConfirmed,
            ]
        );
        let versions: Vec<_> = names.iter().map(|e| e.version()).collect();
        assert_eq!(versions, vec![2, 3, 4]);
        assert!(matches!(
            names[2].reason,
            Outcome::PaymentConfirmed { amount: 400, fully_settled: true }
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}

#[tokio::test]
async fn test_outsiders_rooms_stay_quiet() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let carol = h.party("+15550100003", "Carol").await;
    let mut carol_room = h.bus.subscribe(Room::User(carol));

    let debt = h.open(alice, bob, 50).await;
    h.engine.cancel_debt(debt.id, alice).await.unwrap();

    assert!(matches!(carol_room.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.sink.count_for(carol), 0);
}

#[tokio::test]
async fn test_notifications_go_to_the_counterparty() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let debt = h.open(alice, bob, 300).await;

    h.engine.request_payment(debt.id, bob, 300).await.unwrap();
    h.engine.verify_payment(debt.id, alice, false).await.unwrap();

    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::Created), 1);
    assert_eq!(h.sink.count_kind(alice, debt.id, DebtEventKind::Created), 0);
    assert_eq!(h.sink.count_kind(alice, debt.id, DebtEventKind::PaymentRequested), 1);
    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::PaymentRejected), 1);

    let inbox = h.sink.list_for(bob);
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| n.refs.debt_id == Some(debt.id)));
}
