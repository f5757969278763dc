use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    Choice, EventRequest, InboundEvent, Mode, QuestionKind, RenderRequest, Sender, SessionState,
};

use super::broadcast_service::BroadcastService;
use super::session_service::SessionService;
use super::store::AudienceFilter;
use super::{advisor, reminder_worker, render, AppState};

const ADMIN_ONLY: &str = "❌ Admin only!";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid event: {0}")]
    Invalid(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Routes normalized inbound events to the session machine, the views and
/// the admin operations.
pub struct Dispatcher {
    state: Arc<AppState>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn quiz(&self) -> SessionService {
        self.state.session_service()
    }

    fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.state.config.admin_id
    }

    async fn say(&self, chat_id: i64, message: RenderRequest) {
        if let Err(e) = self.state.outbound.deliver(chat_id, message).await {
            tracing::warn!("Delivery to chat {} failed: {:#}", chat_id, e);
        }
    }

    pub async fn dispatch(&self, request: EventRequest) -> Result<(), DispatchError> {
        let chat_id = request.chat_id;
        let sender = request.from;

        match request.event {
            InboundEvent::Command { name, args } => {
                self.handle_command(chat_id, &sender, &name, &args).await
            }
            InboundEvent::Callback { token } => {
                self.handle_callback(chat_id, &sender, &token).await
            }
            InboundEvent::Answer { text } => Ok(self
                .quiz()
                .submit_answer(chat_id, sender.user_id, &text)
                .await?),
        }
    }

    async fn handle_command(
        &self,
        chat_id: i64,
        sender: &Sender,
        name: &str,
        args: &[String],
    ) -> Result<(), DispatchError> {
        match name {
            "start" => self.cmd_start(chat_id, sender).await,
            "stats" => self.cmd_stats(chat_id, sender.user_id).await,
            "addwhite" => self.cmd_set_whitelist(chat_id, sender, args, true).await,
            "removewhite" => self.cmd_set_whitelist(chat_id, sender, args, false).await,
            "whitelist" => self.cmd_show_whitelist(chat_id, sender).await,
            "setname" => self.cmd_setname(chat_id, sender, args).await,
            "notif" => self.cmd_notif(chat_id, sender, args).await,
            "broadcast" => self.cmd_broadcast(chat_id, sender, args).await,
            other => {
                tracing::debug!("Ignoring unknown command {:?} from {}", other, sender.user_id);
                Ok(())
            }
        }
    }

    async fn cmd_start(&self, chat_id: i64, sender: &Sender) -> Result<(), DispatchError> {
        let user = self
            .state
            .store
            .get_or_create_user(sender.user_id, &sender.username, &sender.first_name)
            .await?;

        if !user.is_whitelisted && !self.is_admin(sender.user_id) {
            let text = render::payment_notice(sender.user_id, &self.state.config.payment_contact);
            self.say(
                chat_id,
                RenderRequest::with_menu(
                    text,
                    vec![
                        Choice::new("📞 Get in touch", "contact_admin"),
                        Choice::new("🔄 Check access", "check_access"),
                    ],
                ),
            )
            .await;
            return Ok(());
        }

        if user.total_questions == 0 {
            self.quiz()
                .notify_admin(
                    sender.user_id,
                    format!(
                        "🆕 New user!\n👤 ID: {}\n📝 @{}\n👨 {}",
                        sender.user_id, sender.username, sender.first_name
                    ),
                )
                .await;
        }

        self.quiz().clear(chat_id);
        self.say(
            chat_id,
            RenderRequest::with_menu(render::welcome(user.display_name()), render::main_menu()),
        )
        .await;
        Ok(())
    }

    async fn cmd_stats(&self, chat_id: i64, user_id: i64) -> Result<(), DispatchError> {
        match self.state.store.get_user(user_id).await? {
            Some(user) if user.total_questions > 0 => {
                self.say(chat_id, RenderRequest::text(render::stats_card(&user)))
                    .await;
            }
            _ => {
                self.say(chat_id, RenderRequest::text("❌ No statistics yet!"))
                    .await;
            }
        }
        Ok(())
    }

    async fn cmd_set_whitelist(
        &self,
        chat_id: i64,
        sender: &Sender,
        args: &[String],
        grant: bool,
    ) -> Result<(), DispatchError> {
        if !self.is_admin(sender.user_id) {
            self.say(chat_id, RenderRequest::text(ADMIN_ONLY)).await;
            return Ok(());
        }

        let command = if grant { "addwhite" } else { "removewhite" };
        let Some(target) = args.first().and_then(|raw| raw.parse::<i64>().ok()) else {
            self.say(
                chat_id,
                RenderRequest::text(format!("❌ Format: /{} USER_ID", command)),
            )
            .await;
            return Ok(());
        };

        self.state.store.set_whitelisted(target, grant).await?;
        if grant {
            self.say(
                chat_id,
                RenderRequest::text(format!("✅ User {} added to the whitelist!", target)),
            )
            .await;
            self.say(
                target,
                RenderRequest::text(
                    "🎉 ACCESS GRANTED!\n\nYou now have full access. Use /start to begin!",
                ),
            )
            .await;
        } else {
            self.say(
                chat_id,
                RenderRequest::text(format!("✅ User {} removed from the whitelist!", target)),
            )
            .await;
            self.say(
                target,
                RenderRequest::text(format!(
                    "🔒 ACCESS REVOKED\n\nYour subscription has ended.\n\nTo renew, contact {}",
                    self.state.config.payment_contact
                )),
            )
            .await;
        }
        Ok(())
    }

    async fn cmd_show_whitelist(&self, chat_id: i64, sender: &Sender) -> Result<(), DispatchError> {
        if !self.is_admin(sender.user_id) {
            self.say(chat_id, RenderRequest::text(ADMIN_ONLY)).await;
            return Ok(());
        }

        let users = self.state.store.whitelisted_users().await?;
        if users.is_empty() {
            self.say(chat_id, RenderRequest::text("📋 The whitelist is empty!"))
                .await;
            return Ok(());
        }

        let mut text = String::from("📋 WHITELISTED USERS:\n\n");
        for (i, user) in users.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} (ID: {})\n",
                i + 1,
                user.display_name(),
                user.user_id
            ));
        }
        text.push_str(&format!("\nTotal: {} users", users.len()));
        self.say(chat_id, RenderRequest::text(text)).await;
        Ok(())
    }

    async fn cmd_setname(
        &self,
        chat_id: i64,
        sender: &Sender,
        args: &[String],
    ) -> Result<(), DispatchError> {
        if !self.is_admin(sender.user_id) {
            self.say(chat_id, RenderRequest::text(ADMIN_ONLY)).await;
            return Ok(());
        }

        let target = args.first().and_then(|raw| raw.parse::<i64>().ok());
        let name = args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
        let (Some(target), false) = (target, name.is_empty()) else {
            self.say(
                chat_id,
                RenderRequest::text("❌ Format: /setname USER_ID NAME"),
            )
            .await;
            return Ok(());
        };

        if self.state.store.get_user(target).await?.is_none() {
            self.say(
                chat_id,
                RenderRequest::text(format!("❌ User {} not found!", target)),
            )
            .await;
            return Ok(());
        }

        self.state.store.set_custom_name(target, &name).await?;
        self.say(
            chat_id,
            RenderRequest::text(format!("✅ User {} is now called: {}", target, name)),
        )
        .await;
        self.say(
            target,
            RenderRequest::text(format!("👤 The admin set your name to: {}", name)),
        )
        .await;
        Ok(())
    }

    async fn cmd_notif(
        &self,
        chat_id: i64,
        sender: &Sender,
        args: &[String],
    ) -> Result<(), DispatchError> {
        if !self.is_admin(sender.user_id) {
            self.say(chat_id, RenderRequest::text(ADMIN_ONLY)).await;
            return Ok(());
        }

        let enabled = match args.first().map(String::as_str) {
            Some("on") => true,
            Some("off") => false,
            _ => {
                self.say(
                    chat_id,
                    RenderRequest::text("❌ Format: /notif on|off USER_ID"),
                )
                .await;
                return Ok(());
            }
        };
        let Some(target) = args.get(1).and_then(|raw| raw.parse::<i64>().ok()) else {
            self.say(
                chat_id,
                RenderRequest::text("❌ Format: /notif on|off USER_ID"),
            )
            .await;
            return Ok(());
        };

        self.state.store.set_admin_notif(target, enabled).await?;
        let mark = if enabled { "🔔 on" } else { "🔕 off" };
        self.say(
            chat_id,
            RenderRequest::text(format!("Notifications for {}: {}", target, mark)),
        )
        .await;
        Ok(())
    }

    async fn cmd_broadcast(
        &self,
        chat_id: i64,
        sender: &Sender,
        args: &[String],
    ) -> Result<(), DispatchError> {
        if !self.is_admin(sender.user_id) {
            self.say(chat_id, RenderRequest::text(ADMIN_ONLY)).await;
            return Ok(());
        }

        let filter = args.first().and_then(|raw| AudienceFilter::parse(raw));
        let text = args.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
        let (Some(filter), false) = (filter, text.is_empty()) else {
            self.say(
                chat_id,
                RenderRequest::text(
                    "❌ Format: /broadcast whitelist|non_whitelist|active_<days> TEXT",
                ),
            )
            .await;
            return Ok(());
        };

        let service = BroadcastService::new(self.state.store.clone(), self.state.outbound.clone());
        let report = service.broadcast(filter, &text).await?;
        self.say(
            chat_id,
            RenderRequest::text(format!(
                "✅ BROADCAST DONE\n\n📨 Sent: {}\n🚫 Blocked: {}\n❌ Errors: {}",
                report.sent, report.blocked, report.failed
            )),
        )
        .await;
        Ok(())
    }

    async fn handle_callback(
        &self,
        chat_id: i64,
        sender: &Sender,
        token: &str,
    ) -> Result<(), DispatchError> {
        let user_id = sender.user_id;

        match token {
            "start_quiz" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu("🎮 PICK A GAME MODE", render::mode_menu()),
                )
                .await;
            }
            "mode_random" => {
                self.quiz().set_menu_state(
                    chat_id,
                    SessionState::ChoosingLevel {
                        kind: QuestionKind::Standard,
                    },
                );
                self.say(
                    chat_id,
                    RenderRequest::with_menu("⭐ PICK A DIFFICULTY LEVEL", render::level_menu()),
                )
                .await;
            }
            "find_x_mode" => {
                self.quiz().set_menu_state(
                    chat_id,
                    SessionState::ChoosingLevel {
                        kind: QuestionKind::FindUnknown,
                    },
                );
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        "🔍 FIND X MODE\n\nSolve the equation for the unknown.\n\nPick a difficulty level:",
                        render::level_menu(),
                    ),
                )
                .await;
            }
            "mode_specific" => {
                self.quiz()
                    .set_menu_state(chat_id, SessionState::ChoosingNumber);
                self.say(
                    chat_id,
                    RenderRequest::with_menu("🔢 PICK A NUMBER (2-9)", render::number_menu()),
                )
                .await;
            }
            "mode_weak_spots" => {
                let spots = self.state.store.top_weak_spots(user_id, 10).await?;
                if spots.is_empty() {
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(
                            "🎯 You have no weak spots!\n\nPlay a few quizzes first.",
                            render::main_menu(),
                        ),
                    )
                    .await;
                } else {
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(
                            format!(
                                "🎯 WEAK-SPOT DRILL\n\n{} problems found.\n\nLet's go!",
                                spots.len()
                            ),
                            vec![
                                Choice::new("🚀 Start!", "start_weak_training"),
                                Choice::new("🔙 Back", "back_mode"),
                            ],
                        ),
                    )
                    .await;
                }
            }
            "start_weak_training" => {
                let spots = self.state.store.top_weak_spots(user_id, 10).await?;
                let worklist: Vec<(i64, i64)> = spots
                    .iter()
                    .map(|spot| (spot.number1, spot.number2))
                    .collect();
                self.quiz()
                    .begin(chat_id, user_id, Mode::WeakSpots { worklist, cursor: 0 })
                    .await?;
            }
            "lightning_mode" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        "⚡ LIGHTNING MODE\n\n5 seconds per question!\nReady?",
                        vec![
                            Choice::new("🚀 Start!", "start_lightning"),
                            Choice::new("🔙 Back", "back_main"),
                        ],
                    ),
                )
                .await;
            }
            "sniper_mode" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        "🎯 SNIPER MODE\n\nNo timer, but only one attempt!\nReady?",
                        vec![
                            Choice::new("🎯 Start!", "start_sniper"),
                            Choice::new("🔙 Back", "back_main"),
                        ],
                    ),
                )
                .await;
            }
            "training_mode" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        "🎓 TRAINING MODE\n\nNo timer + hints!\nShall we?",
                        vec![
                            Choice::new("📚 Start!", "start_training"),
                            Choice::new("🔙 Back", "back_main"),
                        ],
                    ),
                )
                .await;
            }
            "start_lightning" => {
                self.quiz().begin(chat_id, user_id, Mode::Lightning).await?;
            }
            "start_sniper" => {
                self.quiz().begin(chat_id, user_id, Mode::Sniper).await?;
            }
            "start_training" => {
                self.quiz().begin(chat_id, user_id, Mode::Training).await?;
            }
            "continue_quiz" => {
                self.quiz().issue_question(chat_id, user_id).await?;
            }
            "finish_quiz" => {
                self.quiz().finish(chat_id, user_id).await?;
            }
            "view_table" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu("📋 PICK A NUMBER:", render::table_selection_menu()),
                )
                .await;
            }
            "my_stats" => {
                match self.state.store.get_user(user_id).await? {
                    Some(user) if user.total_questions > 0 => {
                        self.say(
                            chat_id,
                            RenderRequest::with_menu(
                                render::stats_card(&user),
                                vec![Choice::new("🔙 Main menu", "back_main")],
                            ),
                        )
                        .await;
                    }
                    _ => {
                        self.say(
                            chat_id,
                            RenderRequest::with_menu("❌ No statistics yet!", render::main_menu()),
                        )
                        .await;
                    }
                }
            }
            "ai_analysis" => {
                let spots = self.state.store.top_weak_spots(user_id, 5).await?;
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        render::analysis(&spots),
                        vec![
                            Choice::new("🎯 Drill weak spots", "mode_weak_spots"),
                            Choice::new("🔙 Main menu", "back_main"),
                        ],
                    ),
                )
                .await;
            }
            "activity_calendar" => {
                let entries = self.state.store.activity_window(user_id, 30).await?;
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        render::activity_calendar(&entries),
                        vec![Choice::new("🔙 Main menu", "back_main")],
                    ),
                )
                .await;
            }
            "leaderboard" => {
                let top = self.state.store.top_leaderboard(10).await?;
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        render::leaderboard(&top),
                        vec![Choice::new("🔙 Main menu", "back_main")],
                    ),
                )
                .await;
            }
            "info" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        render::info(),
                        vec![Choice::new("🔙 Main menu", "back_main")],
                    ),
                )
                .await;
            }
            "back_main" => {
                self.quiz().clear(chat_id);
                let name = self
                    .state
                    .store
                    .get_user(user_id)
                    .await?
                    .map(|user| user.display_name().to_string())
                    .unwrap_or_else(|| "User".to_string());
                self.say(
                    chat_id,
                    RenderRequest::with_menu(
                        format!("🎓 Hi, {}!\n\nPick a mode:", name),
                        render::main_menu(),
                    ),
                )
                .await;
            }
            "back_mode" => {
                self.say(
                    chat_id,
                    RenderRequest::with_menu("🎮 PICK A MODE", render::mode_menu()),
                )
                .await;
            }
            "check_access" => {
                let user = self.state.store.get_user(user_id).await?;
                let allowed =
                    user.map(|u| u.is_whitelisted).unwrap_or(false) || self.is_admin(user_id);
                if allowed {
                    let name = self
                        .state
                        .store
                        .get_user(user_id)
                        .await?
                        .map(|u| u.display_name().to_string())
                        .unwrap_or_else(|| "User".to_string());
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(render::welcome(&name), render::main_menu()),
                    )
                    .await;
                } else {
                    self.say(
                        chat_id,
                        RenderRequest::text("❌ Access not granted yet. Contact the admin."),
                    )
                    .await;
                }
            }
            "snooze_reminder" => {
                reminder_worker::schedule_snooze(self.state.clone(), chat_id, user_id);
                self.say(
                    chat_id,
                    RenderRequest::text("⏰ OK, I'll remind you in an hour!"),
                )
                .await;
            }
            "disable_reminders" => {
                self.state.store.set_reminder_enabled(user_id, false).await?;
                reminder_worker::cancel_snooze(&self.state, chat_id);
                self.say(
                    chat_id,
                    RenderRequest::with_menu("🔕 Reminders disabled.", render::main_menu()),
                )
                .await;
            }
            other => {
                if let Some(rest) = other.strip_prefix("level_") {
                    let level: u8 = rest
                        .parse()
                        .map_err(|_| DispatchError::Invalid(format!("bad level token {other}")))?;
                    let level = level.clamp(1, 3);
                    match self.quiz().choosing_level_kind(chat_id) {
                        Some(QuestionKind::FindUnknown) => {
                            self.quiz()
                                .begin(chat_id, user_id, Mode::FindUnknown { level })
                                .await?;
                        }
                        Some(QuestionKind::Standard) => {
                            self.quiz()
                                .begin(chat_id, user_id, Mode::Random { level })
                                .await?;
                        }
                        None => {
                            tracing::debug!("Level pick without a menu stage, chat {}", chat_id);
                        }
                    }
                } else if let Some(rest) = other.strip_prefix("number_") {
                    let number: i64 = rest
                        .parse()
                        .map_err(|_| DispatchError::Invalid(format!("bad number token {other}")))?;
                    self.quiz()
                        .begin(chat_id, user_id, Mode::Specific { number })
                        .await?;
                } else if let Some(rest) = other.strip_prefix("show_table_") {
                    let number: i64 = rest
                        .parse()
                        .map_err(|_| DispatchError::Invalid(format!("bad table token {other}")))?;
                    let text =
                        format!("{}\n\n💡 Study it and keep going!", render::multiplication_table(number));
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(text, render::next_finish_menu()),
                    )
                    .await;
                } else if let Some(rest) = other.strip_prefix("table_") {
                    let number: i64 = rest
                        .parse()
                        .map_err(|_| DispatchError::Invalid(format!("bad table token {other}")))?;
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(
                            render::multiplication_table(number),
                            vec![
                                Choice::new("🔙 Another number", "view_table"),
                                Choice::new("🏠 Main menu", "back_main"),
                            ],
                        ),
                    )
                    .await;
                } else if let Some(rest) = other.strip_prefix("hint_") {
                    let mut parts = rest.splitn(2, '_');
                    let a = parts.next().and_then(|raw| raw.parse::<i64>().ok());
                    let b = parts.next().and_then(|raw| raw.parse::<i64>().ok());
                    let (Some(a), Some(b)) = (a, b) else {
                        return Err(DispatchError::Invalid(format!("bad hint token {other}")));
                    };
                    self.say(
                        chat_id,
                        RenderRequest::with_menu(
                            format!("💡 {}", advisor::hint(a, b)),
                            render::next_finish_menu(),
                        ),
                    )
                    .await;
                } else {
                    tracing::debug!("Ignoring unknown callback {:?}", other);
                }
            }
        }

        Ok(())
    }
}
