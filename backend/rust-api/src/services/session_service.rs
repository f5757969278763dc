use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::metrics::{self, QUESTIONS_ISSUED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::session::TIMEOUT_CAP;
use crate::models::{
    ActiveQuiz, AnswerRecord, Mode, PendingQuestion, QuestionBody, RenderRequest, SessionState,
    Verdict,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

use super::transport::Outbound;
use super::{advisor, evaluator, generator, render, store::Store};

/// Delay between a resolution message and the next question.
const NEXT_QUESTION_DELAY: Duration = Duration::from_secs(2);

/// Process-wide claim token sequence for pending questions.
static TOKEN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Shared per-conversation session registry. Each entry owns its own pending
/// question marker, so the resolution race stays local to the conversation.
pub type SessionRegistry = Arc<Mutex<HashMap<i64, SessionState>>>;

/// The quiz state machine.
///
/// All registry access is short and synchronous; store and transport calls
/// happen outside the lock, on data claimed while it was held.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    outbound: Arc<dyn Outbound>,
    sessions: SessionRegistry,
    admin_id: i64,
}

enum Issue {
    Ask {
        render: RenderRequest,
        timer: Option<(u64, Duration)>,
    },
    WorklistDone,
    Skip,
}

enum Claim {
    Resolved {
        pending: PendingQuestion,
        mode: Mode,
        question_count: u32,
    },
    Stale,
    Idle,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn Store>,
        outbound: Arc<dyn Outbound>,
        sessions: SessionRegistry,
        admin_id: i64,
    ) -> Self {
        Self {
            store,
            outbound,
            sessions,
            admin_id,
        }
    }

    /// Put the conversation into a menu stage (level or number selection).
    pub fn set_menu_state(&self, chat_id: i64, state: SessionState) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(SessionState::Active(_)) = sessions.insert(chat_id, state) {
            SESSIONS_ACTIVE.dec();
        }
    }

    /// Which question kind a pending level selection belongs to.
    pub fn choosing_level_kind(&self, chat_id: i64) -> Option<crate::models::QuestionKind> {
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(&chat_id) {
            Some(SessionState::ChoosingLevel { kind }) => Some(*kind),
            _ => None,
        }
    }

    /// Drop whatever session exists. A pending watcher finds the marker gone
    /// and becomes a no-op.
    pub fn clear(&self, chat_id: i64) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(SessionState::Active(_)) = sessions.remove(&chat_id) {
            SESSIONS_ACTIVE.dec();
        }
    }

    /// Enter a mode and issue the first question.
    pub async fn begin(&self, chat_id: i64, user_id: i64, mode: Mode) -> Result<()> {
        {
            let mut sessions = self.sessions.lock().unwrap();
            let previous = sessions.insert(chat_id, SessionState::Active(ActiveQuiz::new(mode)));
            if !matches!(previous, Some(SessionState::Active(_))) {
                SESSIONS_ACTIVE.inc();
            }
        }
        SESSIONS_TOTAL.with_label_values(&["started"]).inc();

        self.issue_question(chat_id, user_id).await
    }

    /// Issue the next question for the active quiz. No-op while one is
    /// pending (issue and resolve strictly alternate) or when no quiz runs.
    pub async fn issue_question(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let issue = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get_mut(&chat_id) {
                Some(SessionState::Active(quiz)) => {
                    if quiz.pending.is_some() {
                        Issue::Skip
                    } else {
                        Self::prepare_question(quiz)
                    }
                }
                _ => Issue::Skip,
            }
        };

        match issue {
            Issue::Skip => Ok(()),
            Issue::WorklistDone => {
                self.end_session(chat_id, "completed_worklist");
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        "🎉 All weak spots drilled!",
                        render::main_menu(),
                    ),
                )
                .await;
                Ok(())
            }
            Issue::Ask { render, timer } => {
                self.say(chat_id, render).await;
                if let Some((token, limit)) = timer {
                    self.arm_watcher(chat_id, user_id, token, limit);
                }
                Ok(())
            }
        }
    }

    /// Build the next pending question in place. Runs under the registry lock.
    fn prepare_question(quiz: &mut ActiveQuiz) -> Issue {
        let (body, expected) = match &mut quiz.mode {
            Mode::WeakSpots { worklist, cursor } => {
                if *cursor >= worklist.len() {
                    return Issue::WorklistDone;
                }
                let (a, b) = worklist[*cursor];
                *cursor += 1;
                (QuestionBody::Product { a, b }, a * b)
            }
            Mode::Random { level } => {
                let (a, b, product) = generator::generate(*level, None);
                (QuestionBody::Product { a, b }, product)
            }
            Mode::Specific { number } => {
                let (a, b, product) = generator::generate(1, Some(*number));
                (QuestionBody::Product { a, b }, product)
            }
            Mode::Lightning | Mode::Sniper | Mode::Training => {
                let (a, b, product) = generator::generate(1, None);
                (QuestionBody::Product { a, b }, product)
            }
            Mode::FindUnknown { level } => {
                let equation = generator::generate_equation(*level);
                let unknown = equation.unknown;
                (
                    QuestionBody::Equation {
                        text: equation.text,
                        explanation: equation.explanation,
                    },
                    unknown,
                )
            }
        };

        quiz.question_count += 1;
        // Tokens are unique across the whole process, so a watcher armed for
        // an abandoned quiz can never claim a question of its replacement.
        let token = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed);
        let limit = quiz.mode.time_limit();

        let timer_text = match &quiz.mode {
            Mode::Training => "⏱️ No timer!".to_string(),
            Mode::Sniper => "🎯 No timer, one attempt!".to_string(),
            _ => format!(
                "⏱️ {} seconds!",
                limit.map(|l| l.as_secs()).unwrap_or_default()
            ),
        };

        let text = match &body {
            QuestionBody::Product { a, b } => format!(
                "{} QUESTION #{}\n\n{} × {} = ?\n\n{}\n\n💡 Type your answer:",
                quiz.mode.emoji(),
                quiz.question_count,
                a,
                b,
                timer_text
            ),
            QuestionBody::Equation { text, .. } => format!(
                "🔍 QUESTION #{}\n\n{}\n\n{}\n\n💡 Type the value of x:",
                quiz.question_count, text, timer_text
            ),
        };

        QUESTIONS_ISSUED_TOTAL
            .with_label_values(&[quiz.mode.tag()])
            .inc();

        quiz.pending = Some(PendingQuestion {
            body,
            expected,
            token,
            issued_at: Utc::now(),
            issued_instant: Instant::now(),
            limit,
        });

        Issue::Ask {
            render: RenderRequest::text(text),
            timer: limit.map(|l| (token, l)),
        }
    }

    fn arm_watcher(&self, chat_id: i64, user_id: i64, token: u64, limit: Duration) {
        let service = self.clone();
        tokio::spawn(async move {
            sleep(limit).await;
            if let Err(e) = service.on_timeout(chat_id, user_id, token).await {
                tracing::error!("Timeout resolution failed for chat {}: {:#}", chat_id, e);
            }
        });
    }

    /// Timeout watcher body: claims the pending question by token. If the
    /// answer path won the race the token no longer matches and this is a
    /// no-op.
    async fn on_timeout(&self, chat_id: i64, user_id: i64, token: u64) -> Result<()> {
        let claimed = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get_mut(&chat_id) {
                Some(SessionState::Active(quiz)) => match &quiz.pending {
                    Some(pending) if pending.token == token => {
                        let pending = quiz.pending.take().unwrap();
                        quiz.consecutive_timeouts += 1;
                        Some((pending, quiz.consecutive_timeouts, quiz.mode.clone()))
                    }
                    _ => None,
                },
                _ => None,
            }
        };

        let Some((pending, timeouts, mode)) = claimed else {
            return Ok(());
        };

        metrics::record_answer("timeout");
        let limit_secs = pending
            .limit
            .map(|l| l.as_secs_f64())
            .unwrap_or_default();

        let retry_cfg = RetryConfig::default();
        retry_async_with_config(retry_cfg.clone(), || async {
            self.store.update_stats(user_id, false).await
        })
        .await
        .context("Failed to update stats on timeout")?;
        retry_async_with_config(retry_cfg.clone(), || async {
            self.store
                .bump_activity(user_id, Utc::now().date_naive())
                .await
        })
        .await
        .context("Failed to bump activity on timeout")?;

        let record = AnswerRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            question: pending.history_label(),
            kind: mode.kind(),
            submitted: None,
            expected: pending.expected,
            correct: false,
            response_time_secs: limit_secs,
            level: mode.level(),
            mode: mode.tag().to_string(),
            timestamp: Utc::now(),
        };
        retry_async_with_config(RetryConfig::aggressive(), || async {
            self.store.append_answer(&record).await
        })
        .await
        .context("Failed to append timeout history")?;

        self.notify_admin(
            user_id,
            format!(
                "⏰ Timeout!\n👤 {}\n❓ {}\n✅ {}",
                user_id,
                pending.history_label(),
                pending.expected
            ),
        )
        .await;

        tracing::info!(
            "Question timed out: chat={}, question={}, consecutive={}",
            chat_id,
            pending.history_label(),
            timeouts
        );

        if timeouts >= TIMEOUT_CAP {
            self.end_session(chat_id, "paused_inactive");
            self.say(
                chat_id,
                RenderRequest::with_menu(
                    "💤 Quiz paused due to inactivity.\n\n\
                     You missed 3 questions in a row. Come back when you're ready!",
                    render::main_menu(),
                ),
            )
            .await;
            return Ok(());
        }

        let timeout_text = match &pending.body {
            QuestionBody::Product { a, b } => format!(
                "⏰ TIME'S UP!\n\n❌ {} × {} = ?\n✅ Answer: {}\n\n⏳ Next question...",
                a, b, pending.expected
            ),
            QuestionBody::Equation { text, .. } => format!(
                "⏰ TIME'S UP!\n\n❌ {}\n✅ The right answer: x = {}\n\n⏳ Next question...",
                text, pending.expected
            ),
        };
        self.say(chat_id, RenderRequest::text(timeout_text)).await;

        sleep(NEXT_QUESTION_DELAY).await;
        self.issue_question(chat_id, user_id).await
    }

    /// Handle a free-text answer.
    pub async fn submit_answer(&self, chat_id: i64, user_id: i64, text: &str) -> Result<()> {
        let Ok(value) = text.trim().parse::<i64>() else {
            // Invalid input recovers locally: re-prompt, no state mutation.
            let has_pending = {
                let sessions = self.sessions.lock().unwrap();
                matches!(
                    sessions.get(&chat_id),
                    Some(SessionState::Active(quiz)) if quiz.pending.is_some()
                )
            };
            if has_pending {
                self.say(chat_id, RenderRequest::text("❌ Numbers only, please!"))
                    .await;
            }
            return Ok(());
        };

        let claim = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get_mut(&chat_id) {
                Some(SessionState::Active(quiz)) => match &quiz.pending {
                    Some(pending) => {
                        let late = pending
                            .limit
                            .map(|limit| pending.issued_instant.elapsed() > limit)
                            .unwrap_or(false);
                        if late {
                            // Leave the marker: the watcher owns this
                            // resolution and will record the timeout.
                            Claim::Stale
                        } else {
                            let pending = quiz.pending.take().unwrap();
                            quiz.consecutive_timeouts = 0;
                            Claim::Resolved {
                                pending,
                                mode: quiz.mode.clone(),
                                question_count: quiz.question_count,
                            }
                        }
                    }
                    None => Claim::Idle,
                },
                _ => Claim::Idle,
            }
        };

        match claim {
            Claim::Idle => Ok(()),
            Claim::Stale => {
                self.say(chat_id, RenderRequest::text("⏰ Time's already up!"))
                    .await;
                Ok(())
            }
            Claim::Resolved {
                pending,
                mode,
                question_count,
            } => {
                self.resolve_answer(chat_id, user_id, value, pending, mode, question_count)
                    .await
            }
        }
    }

    async fn resolve_answer(
        &self,
        chat_id: i64,
        user_id: i64,
        value: i64,
        pending: PendingQuestion,
        mode: Mode,
        question_count: u32,
    ) -> Result<()> {
        let elapsed = pending.issued_instant.elapsed().as_secs_f64();
        let verdict = evaluator::evaluate(value, pending.expected);
        let retry_cfg = RetryConfig::default();

        retry_async_with_config(retry_cfg.clone(), || async {
            self.store
                .bump_activity(user_id, Utc::now().date_naive())
                .await
        })
        .await
        .context("Failed to bump activity")?;

        match verdict {
            Verdict::Correct => {
                metrics::record_answer("correct");
                retry_async_with_config(retry_cfg.clone(), || async {
                    self.store.update_stats(user_id, true).await
                })
                .await
                .context("Failed to update stats")?;
                self.append_history(user_id, &pending, &mode, Some(value), true, elapsed)
                    .await?;

                let user = self
                    .store
                    .get_user(user_id)
                    .await?
                    .context("User vanished mid-session")?;

                self.notify_admin(
                    user_id,
                    format!(
                        "✅ Correct!\n👤 {}\n❓ {}\n✅ {}\n⏱️ {:.1}s",
                        user.display_name(),
                        pending.history_label(),
                        pending.expected,
                        elapsed
                    ),
                )
                .await;

                let mode_bonus = match mode {
                    Mode::Lightning => " ⚡",
                    Mode::Sniper => " 🎯",
                    Mode::Training => " 🎓",
                    Mode::FindUnknown { .. } => " 🔍",
                    _ => "",
                };
                let restated = match &pending.body {
                    QuestionBody::Product { a, b } => {
                        format!("{} × {} = {}", a, b, pending.expected)
                    }
                    QuestionBody::Equation { text, .. } => {
                        format!("{}\nx = {}", text, pending.expected)
                    }
                };
                let text = format!(
                    "✅ CORRECT!{}\n\n{}\n\n⏱️ {:.1}s\n🎯 Questions: {}\n🔥 Streak: {}\n\n{}",
                    mode_bonus,
                    restated,
                    elapsed,
                    question_count,
                    user.current_streak,
                    advisor::motivational_message(user.accuracy(), user.current_streak)
                );
                self.say(
                    chat_id,
                    RenderRequest::with_menu(text, render::next_finish_menu()),
                )
                .await;
            }
            Verdict::TypoTolerated => {
                // A slip, not a mistake: nothing counted either way, the
                // session just moves on.
                metrics::record_answer("typo");
                let text = format!(
                    "⚠️ Oops! Looks like a typo!\n\n\
                     You typed: {}\nIt should be: {}\n\n\
                     Streak preserved, answer not counted. Moving on?",
                    value, pending.expected
                );
                self.say(
                    chat_id,
                    RenderRequest::with_menu(text, render::next_finish_menu()),
                )
                .await;
            }
            Verdict::Incorrect => {
                metrics::record_answer("incorrect");
                retry_async_with_config(retry_cfg.clone(), || async {
                    self.store.update_stats(user_id, false).await
                })
                .await
                .context("Failed to update stats")?;

                if let QuestionBody::Product { a, b } = &pending.body {
                    let (a, b) = (*a, *b);
                    retry_async_with_config(retry_cfg.clone(), || async {
                        self.store.record_weak_spot(user_id, a, b).await
                    })
                    .await
                    .context("Failed to record weak spot")?;
                }
                self.append_history(user_id, &pending, &mode, Some(value), false, elapsed)
                    .await?;

                self.notify_admin(
                    user_id,
                    format!(
                        "❌ Mistake\n👤 {}\n❓ {}\n💬 {}\n✅ {}",
                        user_id,
                        pending.history_label(),
                        value,
                        pending.expected
                    ),
                )
                .await;

                match &pending.body {
                    QuestionBody::Product { a, b } => {
                        let mut explanation =
                            evaluator::explain_mistake(*a, *b, value, pending.expected);
                        if mode.hint_after_miss() {
                            explanation.push_str("\n\n💡 ");
                            explanation.push_str(&advisor::hint(*a, *b));
                        }
                        self.say(
                            chat_id,
                            RenderRequest::with_menu(explanation, render::after_wrong_menu(*a, *b)),
                        )
                        .await;
                    }
                    QuestionBody::Equation { explanation, .. } => {
                        let text = format!(
                            "❌ Wrong!\n\nThe right answer: x = {}\n\n{}",
                            pending.expected, explanation
                        );
                        self.say(
                            chat_id,
                            RenderRequest::with_menu(text, render::next_finish_menu()),
                        )
                        .await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Finish explicitly: clear the session (cancelling any watcher via the
    /// dropped marker) and show the final card.
    pub async fn finish(&self, chat_id: i64, user_id: i64) -> Result<()> {
        {
            let mut sessions = self.sessions.lock().unwrap();
            if let Some(SessionState::Active(_)) = sessions.remove(&chat_id) {
                SESSIONS_ACTIVE.dec();
                SESSIONS_TOTAL.with_label_values(&["finished"]).inc();
            }
        }

        let text = match self.store.get_user(user_id).await? {
            Some(user) if user.total_questions > 0 => format!(
                "🏁 QUIZ FINISHED!\n\n👤 {}\n\n📊 Statistics:\n\
                 • Questions: {}\n• Correct: {} ✅\n• Accuracy: {:.1}%\n• Best streak: {} 🔥\n\n\
                 {}\n\nThanks for playing! 😊",
                user.display_name(),
                user.total_questions,
                user.correct_answers,
                user.accuracy(),
                user.best_streak,
                advisor::motivational_message(user.accuracy(), user.current_streak)
            ),
            _ => "🏁 Quiz finished!".to_string(),
        };

        self.say(chat_id, RenderRequest::with_menu(text, render::main_menu()))
            .await;
        Ok(())
    }

    fn end_session(&self, chat_id: i64, status: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(SessionState::Active(_)) = sessions.remove(&chat_id) {
            SESSIONS_ACTIVE.dec();
            SESSIONS_TOTAL.with_label_values(&[status]).inc();
        }
    }

    async fn append_history(
        &self,
        user_id: i64,
        pending: &PendingQuestion,
        mode: &Mode,
        submitted: Option<i64>,
        correct: bool,
        elapsed: f64,
    ) -> Result<()> {
        let record = AnswerRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            question: pending.history_label(),
            kind: mode.kind(),
            submitted,
            expected: pending.expected,
            correct,
            response_time_secs: elapsed,
            level: mode.level(),
            mode: mode.tag().to_string(),
            timestamp: Utc::now(),
        };
        retry_async_with_config(RetryConfig::aggressive(), || async {
            self.store.append_answer(&record).await
        })
        .await
        .context("Failed to append answer history")
    }

    /// Outbound delivery is never fatal to the conversation.
    async fn say(&self, chat_id: i64, message: RenderRequest) {
        if let Err(e) = self.outbound.deliver(chat_id, message).await {
            tracing::warn!("Delivery to chat {} failed: {:#}", chat_id, e);
        }
    }

    pub(crate) async fn notify_admin(&self, user_id: i64, text: String) {
        if self.admin_id == 0 || user_id == self.admin_id {
            return;
        }
        match self.store.admin_notif_enabled(user_id).await {
            Ok(true) => {
                if let Err(e) = self
                    .outbound
                    .deliver(self.admin_id, RenderRequest::text(text))
                    .await
                {
                    tracing::warn!("Admin notification failed: {:#}", e);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Admin notification lookup failed: {:#}", e),
        }
    }
}
