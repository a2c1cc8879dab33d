//! Integration test: overdue and reminder scans driven through the
//! `Scheduler` trigger surface.

use chrono::{Duration, Utc};
use iou_core::{DebtPatch, NewDebt, OverdueStatus, Reminders};
use iou_events::DebtEventKind;
use iou_integration_tests::Harness;
use iou_scheduler::{OverdueScanner, ReminderScheduler, SchedulerError};

#[tokio::test]
async fn test_overdue_scan_flags_once() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let now = Utc::now();

    let mut new = NewDebt::new(alice, bob, 500);
    new.due_date = Some(now - Duration::days(1));
    let debt = h.engine.create_debt(new).await.unwrap();

    let first = h.scheduler.trigger(OverdueScanner::NAME, now).await.unwrap();
    assert_eq!(first.applied, 1);
    let flagged = h.engine.get_debt(debt.id, alice).await.unwrap();
    assert_eq!(flagged.overdue_status, OverdueStatus::Overdue);

    let second = h.scheduler.trigger(OverdueScanner::NAME, now).await.unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(h.engine.get_debt(debt.id, alice).await.unwrap(), flagged);

    // Scanner events reach both parties, exactly once
    assert_eq!(h.sink.count_kind(alice, debt.id, DebtEventKind::Overdue), 1);
    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::Overdue), 1);
}

#[tokio::test]
async fn test_moving_due_date_opens_new_overdue_episode() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let now = Utc::now();

    let mut new = NewDebt::new(alice, bob, 500);
    new.due_date = Some(now - Duration::days(2));
    let debt = h.engine.create_debt(new).await.unwrap();
    h.scheduler.trigger(OverdueScanner::NAME, now).await.unwrap();

    let patch = DebtPatch {
        due_date: Some(now + Duration::days(5)),
        ..DebtPatch::default()
    };
    let moved = h.engine.update_debt(debt.id, alice, patch).await.unwrap();
    assert_eq!(moved.overdue_status, OverdueStatus::OnTime);

    let later = now + Duration::days(6);
    let report = h.scheduler.trigger(OverdueScanner::NAME, later).await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::Overdue), 2);
}

#[tokio::test]
async fn test_reminders_fire_once_per_slot() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let now = Utc::now();
    let due = now + Duration::days(3) + Duration::hours(1);

    let mut new = NewDebt::new(alice, bob, 250);
    new.due_date = Some(due);
    new.reminders = Some(Reminders([true, false, true]));
    let debt = h.engine.create_debt(new).await.unwrap();

    // Three days out: slot 0
    let report = h.scheduler.trigger(ReminderScheduler::NAME, now).await.unwrap();
    assert_eq!(report.applied, 1);
    let again = h.scheduler.trigger(ReminderScheduler::NAME, now).await.unwrap();
    assert_eq!(again.applied, 0);

    // One day out: slot 1 is disabled
    let report = h.scheduler.trigger(ReminderScheduler::NAME, now + Duration::days(2)).await.unwrap();
    assert_eq!(report.applied, 0);

    // Due day: slot 2
    let report = h.scheduler.trigger(ReminderScheduler::NAME, now + Duration::days(3)).await.unwrap();
    assert_eq!(report.applied, 1);

    let sent = h.engine.get_debt(debt.id, alice).await.unwrap().reminders_sent;
    assert_eq!(sent, Reminders([true, false, true]));
    assert_eq!(h.sink.count_kind(bob, debt.id, DebtEventKind::Reminder), 2);
}

#[tokio::test]
async fn test_paid_debts_are_left_alone() {
    let h = Harness::new();
    let (alice, bob) = h.alice_and_bob().await;
    let now = Utc::now();

    let mut new = NewDebt::new(alice, bob, 100);
    new.due_date = Some(now - Duration::days(1));
    let debt = h.engine.create_debt(new).await.unwrap();
    h.engine.acknowledge_payment(debt.id, alice, 100).await.unwrap();

    let reports = h.scheduler.trigger_all(now).await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.scanned == 0 && r.applied == 0));
    assert_eq!(
        h.engine.get_debt(debt.id, bob).await.unwrap().overdue_status,
        OverdueStatus::OnTime
    );
}

#[tokio::test]
async fn test_unknown_task_is_reported() {
    let h = Harness::new();
    assert!(matches!(
        h.scheduler.trigger("weekly_digest", Utc::now()).await,
        Err(SchedulerError::UnknownTask(_))
    ));
}
