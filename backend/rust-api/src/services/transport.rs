use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;

use crate::metrics::OUTBOUND_SEND_TOTAL;
use crate::models::RenderRequest;

/// Outbound edge of the transport collaborator: the core hands over a
/// render request for a conversation and never learns how it is displayed.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn deliver(&self, chat_id: i64, message: RenderRequest) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct DeliverPayload<'a> {
    chat_id: i64,
    #[serde(flatten)]
    message: &'a RenderRequest,
}

/// Delivers render requests to the messenger gateway over HTTP.
pub struct HttpOutbound {
    client: reqwest::Client,
    gateway_url: String,
}

impl HttpOutbound {
    pub fn new(gateway_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
        }
    }
}

#[async_trait]
impl Outbound for HttpOutbound {
    async fn deliver(&self, chat_id: i64, message: RenderRequest) -> Result<()> {
        let url = format!("{}/messages", self.gateway_url);
        let payload = DeliverPayload {
            chat_id,
            message: &message,
        };

        let result = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .context("Failed to reach messenger gateway");

        match result {
            Ok(response) if response.status().is_success() => {
                OUTBOUND_SEND_TOTAL.with_label_values(&["success"]).inc();
                Ok(())
            }
            Ok(response) => {
                OUTBOUND_SEND_TOTAL.with_label_values(&["error"]).inc();
                anyhow::bail!(
                    "Gateway rejected delivery to chat {}: {}",
                    chat_id,
                    response.status()
                )
            }
            Err(e) => {
                OUTBOUND_SEND_TOTAL.with_label_values(&["error"]).inc();
                Err(e)
            }
        }
    }
}

/// Captures deliveries in memory. Tests assert on what the core tried to
/// say; local development can run without a gateway.
#[derive(Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<(i64, RenderRequest)>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(i64, RenderRequest)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<RenderRequest> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn last_text(&self, chat_id: i64) -> Option<String> {
        self.sent_to(chat_id).last().map(|m| m.text.clone())
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn deliver(&self, chat_id: i64, message: RenderRequest) -> Result<()> {
        OUTBOUND_SEND_TOTAL.with_label_values(&["success"]).inc();
        self.sent.lock().unwrap().push((chat_id, message));
        Ok(())
    }
}
