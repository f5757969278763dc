use serde::{Deserialize, Serialize};
use validator::Validate;

/// Normalized inbound event posted by the messenger gateway.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventRequest {
    pub chat_id: i64,
    #[validate(nested)]
    pub from: Sender,
    pub event: InboundEvent,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Sender {
    pub user_id: i64,
    #[serde(default)]
    #[validate(length(max = 64, message = "username too long"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "first name too long"))]
    pub first_name: String,
}

/// The three inbound shapes the core understands: a slash command with
/// pre-tokenized arguments, a menu callback token, and a free-text answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Command { name: String, #[serde(default)] args: Vec<String> },
    Callback { token: String },
    Answer { text: String },
}

/// One tappable menu entry. `token` comes back verbatim as a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self { label: label.into(), token: token.into() }
    }
}

/// Opaque render request handed to the transport: text plus an optional
/// structured choice menu. The core never knows how it is displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<Choice>,
}

impl RenderRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), menu: Vec::new() }
    }

    pub fn with_menu(text: impl Into<String>, menu: Vec<Choice>) -> Self {
        Self { text: text.into(), menu }
    }
}
