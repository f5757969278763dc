use anyhow::Result;
use chrono::{Duration, Local, Timelike, Utc};
use rand::prelude::IndexedRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::sleep;

use crate::metrics::{REMINDERS_SENT_TOTAL, REMINDER_WORKER_TICKS_TOTAL};
use crate::models::{Choice, RenderRequest, UserProfile};

use super::{advisor, AppState};

/// Minimum inactivity, in hours, before a nudge is sent.
const INACTIVITY_GATE_HOURS: i64 = 3;

/// Active snooze jobs, keyed by conversation. The stored token is bumped by
/// every new snooze and by `cancel_snooze`; a sleeping job re-checks it on
/// wake-up and drops out if it lost.
pub type SnoozeRegistry = Arc<Mutex<HashMap<i64, u64>>>;

/// Periodic sweep that nudges inactive, opted-in users at configured hours.
/// Independent of any single conversation; its buttons enter the same mode
/// selection paths as manual navigation.
pub struct ReminderWorker {
    state: Arc<AppState>,
}

impl ReminderWorker {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(&self) {
        tracing::info!(
            "Starting reminder worker (hours: {:?})",
            self.state.config.reminder_hours
        );
        let mut last_sent_hour: i64 = -1;

        loop {
            let current_hour = Local::now().hour();

            if self.state.config.reminder_hours.contains(&current_hour)
                && i64::from(current_hour) != last_sent_hour
            {
                match self.run_once().await {
                    Ok(sent) => {
                        REMINDER_WORKER_TICKS_TOTAL
                            .with_label_values(&["success"])
                            .inc();
                        tracing::info!("Sent {} reminders at {}:00", sent, current_hour);
                    }
                    Err(err) => {
                        REMINDER_WORKER_TICKS_TOTAL
                            .with_label_values(&["error"])
                            .inc();
                        tracing::warn!(error = %err, "Reminder sweep failed");
                    }
                }
                last_sent_hour = i64::from(current_hour);
            } else if i64::from(current_hour) != last_sent_hour {
                // Reset the latch once the clock leaves the sent hour.
                last_sent_hour = -1;
            }

            sleep(std::time::Duration::from_secs(60)).await;
        }
    }

    /// One sweep over the opted-in users. Eligibility: whitelisted and
    /// inactive for at least three hours. Returns how many nudges went out.
    pub async fn run_once(&self) -> Result<usize> {
        let candidates = self.state.store.reminder_candidates().await?;
        let now = Utc::now();
        let mut sent = 0;

        for user in candidates {
            if !user.is_whitelisted && user.user_id != self.state.config.admin_id {
                continue;
            }
            if now - user.last_activity < Duration::hours(INACTIVITY_GATE_HOURS) {
                continue;
            }

            let message = compose_nudge(&user);
            match self.state.outbound.deliver(user.user_id, message).await {
                Ok(()) => {
                    REMINDERS_SENT_TOTAL.with_label_values(&["success"]).inc();
                    sent += 1;
                }
                Err(e) => {
                    REMINDERS_SENT_TOTAL.with_label_values(&["error"]).inc();
                    tracing::warn!("Reminder to {} failed: {:#}", user.user_id, e);
                }
            }

            sleep(std::time::Duration::from_millis(100)).await;
        }

        Ok(sent)
    }
}

fn compose_nudge(user: &UserProfile) -> RenderRequest {
    let template = advisor::pick_reminder_template();
    let mut text = format!(
        "🔔 {}, {}!\n\n{}",
        template.greeting,
        user.display_name(),
        template.text
    );

    if user.total_questions > 0 {
        text.push_str(&format!("\n\n📊 Your accuracy: {:.0}%", user.accuracy()));
    }
    if user.current_streak > 0 {
        text.push_str(&format!(
            "\n🔥 Current streak: {} in a row!",
            user.current_streak
        ));
    }
    text.push_str(&format!("\n\n🎯 {}", template.cta));

    let entry_points = [
        Choice::new("🎯 Start quiz", "start_quiz"),
        Choice::new("⚡ Lightning", "lightning_mode"),
        Choice::new("🎓 Training", "training_mode"),
        Choice::new("🎯 Weak spots", "mode_weak_spots"),
    ];
    let mut rng = rand::rng();
    let main_button = entry_points.choose(&mut rng).unwrap().clone();

    RenderRequest::with_menu(
        text,
        vec![
            main_button,
            Choice::new("📊 My statistics", "my_stats"),
            Choice::new("⏰ Snooze for an hour", "snooze_reminder"),
            Choice::new("🔕 Disable reminders", "disable_reminders"),
        ],
    )
}

/// Schedule a one-hour snooze nudge for the conversation. A newer snooze or
/// a cancel bumps the token, which makes this job a no-op at wake-up.
pub fn schedule_snooze(state: Arc<AppState>, chat_id: i64, user_id: i64) {
    let token = {
        let mut snoozes = state.snoozes.lock().unwrap();
        let entry = snoozes.entry(chat_id).or_insert(0);
        *entry += 1;
        *entry
    };

    tokio::spawn(async move {
        sleep(std::time::Duration::from_secs(3600)).await;

        let still_current = {
            let snoozes = state.snoozes.lock().unwrap();
            snoozes.get(&chat_id).copied() == Some(token)
        };
        if !still_current {
            return;
        }

        match state.store.get_user(user_id).await {
            Ok(Some(user)) if user.reminder_enabled => {
                let text = format!(
                    "⏰ {}, it's been an hour!\n\n📚 Ready to train?",
                    user.display_name()
                );
                let message = RenderRequest::with_menu(
                    text,
                    vec![
                        Choice::new("🚀 Let's go!", "start_quiz"),
                        Choice::new("🔕 Disable reminders", "disable_reminders"),
                    ],
                );
                if let Err(e) = state.outbound.deliver(chat_id, message).await {
                    REMINDERS_SENT_TOTAL.with_label_values(&["error"]).inc();
                    tracing::warn!("Snoozed reminder to {} failed: {:#}", chat_id, e);
                } else {
                    REMINDERS_SENT_TOTAL.with_label_values(&["success"]).inc();
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Snooze lookup for {} failed: {:#}", user_id, e),
        }
    });
}

/// Invalidate any scheduled snooze for the conversation.
pub fn cancel_snooze(state: &AppState, chat_id: i64) {
    let mut snoozes = state.snoozes.lock().unwrap();
    if let Some(token) = snoozes.get_mut(&chat_id) {
        *token += 1;
    }
}
