use anyhow::Result;
use std::sync::Arc;
use tokio::time::sleep;

use crate::metrics::BROADCAST_MESSAGES_TOTAL;
use crate::models::RenderRequest;

use super::store::{AudienceFilter, Store};
use super::transport::Outbound;

/// Inter-send pause so the fan-out stays inside gateway rate limits.
const SEND_PAUSE: std::time::Duration = std::time::Duration::from_millis(50);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub blocked: usize,
    pub failed: usize,
}

/// Admin fan-out: filter the audience, send to each recipient, keep going
/// past failures and report the totals.
pub struct BroadcastService {
    store: Arc<dyn Store>,
    outbound: Arc<dyn Outbound>,
}

impl BroadcastService {
    pub fn new(store: Arc<dyn Store>, outbound: Arc<dyn Outbound>) -> Self {
        Self { store, outbound }
    }

    pub async fn broadcast(&self, filter: AudienceFilter, text: &str) -> Result<BroadcastReport> {
        let recipients = self.store.audience(filter).await?;
        tracing::info!(
            "Broadcasting to {} recipients (filter {:?})",
            recipients.len(),
            filter
        );

        let mut report = BroadcastReport::default();

        for user_id in recipients {
            match self
                .outbound
                .deliver(user_id, RenderRequest::text(text.to_string()))
                .await
            {
                Ok(()) => {
                    BROADCAST_MESSAGES_TOTAL
                        .with_label_values(&["success"])
                        .inc();
                    report.sent += 1;
                }
                Err(e) => {
                    let reason = e.to_string();
                    if reason.to_lowercase().contains("blocked") {
                        BROADCAST_MESSAGES_TOTAL
                            .with_label_values(&["blocked"])
                            .inc();
                        report.blocked += 1;
                    } else {
                        BROADCAST_MESSAGES_TOTAL.with_label_values(&["error"]).inc();
                        report.failed += 1;
                    }
                    tracing::warn!("Broadcast to {} failed: {:#}", user_id, e);
                }
            }

            sleep(SEND_PAUSE).await;
        }

        Ok(report)
    }
}
