//! Tapegauge notifier module for Caryatid
//! Dispatches rate-limited, category-scoped alerts to webhook channels

mod dispatch;
mod webhook;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::messages::{Message, NotifyChannel, NotifyKind, NotifyMessage};
use tracing::{error, info, warn};

use crate::dispatch::DispatchState;
use crate::webhook::WebhookClient;

const DEFAULT_SUBSCRIBE_TOPIC: (&str, &str) = ("subscribe-topic", "gauge.notify");

const DEFAULT_MAX_MESSAGES_PER_PERIOD: i64 = 20;
const DEFAULT_PERIOD_SECS: i64 = 60;
const DEFAULT_SEND_TIMEOUT_SECS: i64 = 5;

/// Notifier module
#[module(
    message_type(Message),
    name = "notifier",
    description = "Rate-limited webhook notification dispatch"
)]
pub struct Notifier;

impl Notifier {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let subscribe_topic = config
            .get_string(DEFAULT_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_SUBSCRIBE_TOPIC.1.to_string());
        info!("Creating subscriber on '{subscribe_topic}'");

        let alert_webhook = config.get_string("alert-webhook").unwrap_or_default();
        let operations_webhook = config.get_string("operations-webhook").unwrap_or_default();
        if alert_webhook.is_empty() && operations_webhook.is_empty() {
            warn!("No webhook URLs configured, all notifications will be dropped");
        }

        let max_per_period = config
            .get_int("max-messages-per-period")
            .unwrap_or(DEFAULT_MAX_MESSAGES_PER_PERIOD) as usize;
        let period_secs =
            config.get_int("period-seconds").unwrap_or(DEFAULT_PERIOD_SECS) as u64;
        let timeout_secs = config
            .get_int("send-timeout-seconds")
            .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS) as u64;

        let client = WebhookClient::new(timeout_secs)?;
        let mut state = DispatchState::new(max_per_period, Duration::from_secs(period_secs));
        let mut subscription = context.subscribe(&subscribe_topic).await?;

        context.run(async move {
            // Announce the service on the operations channel
            let startup = NotifyMessage {
                kind: NotifyKind::Info,
                category: "system".to_string(),
                channel: NotifyChannel::Operations,
                message: "Tapegauge service started".to_string(),
                escalate_after: 0,
            };
            Self::dispatch(&mut state, &client, &alert_webhook, &operations_webhook, &startup)
                .await;

            loop {
                let Ok((_, message)) = subscription.read().await else {
                    return;
                };
                if let Message::Notify(request) = message.as_ref() {
                    Self::dispatch(
                        &mut state,
                        &client,
                        &alert_webhook,
                        &operations_webhook,
                        request,
                    )
                    .await;
                }
            }
        });

        Ok(())
    }

    /// Run one request through category and rate gating, then the transport.
    /// Returns true iff a message was actually transmitted.
    async fn dispatch(
        state: &mut DispatchState,
        client: &WebhookClient,
        alert_webhook: &str,
        operations_webhook: &str,
        request: &NotifyMessage,
    ) -> bool {
        let Some(text) = state.prepare(request) else {
            return false;
        };

        let url = match request.channel {
            NotifyChannel::Alerts => alert_webhook,
            NotifyChannel::Operations => operations_webhook,
        };
        if url.is_empty() {
            return false;
        }

        if !state.allow_send(Instant::now()) {
            warn!(
                category = %request.category,
                "Notification rate cap reached, dropping message"
            );
            return false;
        }

        match client.post_text(url, &text).await {
            Ok(()) => {
                state.record_sent(Instant::now());
                true
            }
            Err(e) => {
                error!("Notification delivery failed: {e}");
                false
            }
        }
    }
}
