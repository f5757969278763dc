mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tablebot_api::services::reminder_worker::{self, ReminderWorker};
use tablebot_api::services::store::Store;

#[tokio::test]
async fn sweep_nudges_only_eligible_users() {
    let app = common::build_state();

    // Whitelisted, opted in, inactive for 4 hours: eligible.
    app.store.get_or_create_user(1, "a", "Ann").await.unwrap();
    app.store.set_whitelisted(1, true).await.unwrap();
    app.store
        .set_last_activity(1, Utc::now() - ChronoDuration::hours(4));

    // Recently active: skipped.
    app.store.get_or_create_user(2, "b", "Ben").await.unwrap();
    app.store.set_whitelisted(2, true).await.unwrap();

    // Opted out: skipped.
    app.store.get_or_create_user(3, "c", "Cat").await.unwrap();
    app.store.set_whitelisted(3, true).await.unwrap();
    app.store.set_reminder_enabled(3, false).await.unwrap();
    app.store
        .set_last_activity(3, Utc::now() - ChronoDuration::hours(8));

    // Not whitelisted: skipped.
    app.store.get_or_create_user(4, "d", "Dan").await.unwrap();
    app.store
        .set_last_activity(4, Utc::now() - ChronoDuration::hours(8));

    let worker = ReminderWorker::new(app.state.clone());
    let sent = worker.run_once().await.unwrap();

    assert_eq!(sent, 1);
    let nudges = app.outbound.sent_to(1);
    assert_eq!(nudges.len(), 1);
    assert!(nudges[0].menu.iter().any(|c| c.token == "snooze_reminder"));
    assert!(nudges[0]
        .menu
        .iter()
        .any(|c| c.token == "disable_reminders"));
    assert!(app.outbound.sent_to(2).is_empty());
    assert!(app.outbound.sent_to(3).is_empty());
    assert!(app.outbound.sent_to(4).is_empty());
}

#[tokio::test]
async fn nudge_carries_stats_when_present() {
    let app = common::build_state();
    app.store.get_or_create_user(1, "a", "Ann").await.unwrap();
    app.store.set_whitelisted(1, true).await.unwrap();
    for _ in 0..3 {
        app.store.update_stats(1, true).await.unwrap();
    }
    app.store
        .set_last_activity(1, Utc::now() - ChronoDuration::hours(4));

    let worker = ReminderWorker::new(app.state.clone());
    assert_eq!(worker.run_once().await.unwrap(), 1);

    let text = app.outbound.last_text(1).unwrap();
    assert!(text.contains("Your accuracy: 100%"));
    assert!(text.contains("Current streak: 3"));
}

#[tokio::test(start_paused = true)]
async fn snooze_fires_after_an_hour() {
    let app = common::build_state();
    app.store.get_or_create_user(1, "a", "Ann").await.unwrap();

    reminder_worker::schedule_snooze(app.state.clone(), 1, 1);
    tokio::time::sleep(Duration::from_secs(3601)).await;

    let text = app.outbound.last_text(1).unwrap();
    assert!(text.contains("it's been an hour"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_snooze_stays_silent() {
    let app = common::build_state();
    app.store.get_or_create_user(1, "a", "Ann").await.unwrap();

    reminder_worker::schedule_snooze(app.state.clone(), 1, 1);
    reminder_worker::cancel_snooze(&app.state, 1);
    tokio::time::sleep(Duration::from_secs(3700)).await;

    assert!(app.outbound.sent_to(1).is_empty());
}

#[tokio::test(start_paused = true)]
async fn snooze_respects_a_later_opt_out() {
    let app = common::build_state();
    app.store.get_or_create_user(1, "a", "Ann").await.unwrap();

    reminder_worker::schedule_snooze(app.state.clone(), 1, 1);
    app.store.set_reminder_enabled(1, false).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3700)).await;

    assert!(app.outbound.sent_to(1).is_empty());
}
