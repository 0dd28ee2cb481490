//! Tapegauge inflator control module for Caryatid
//! Executes inflate commands against the actuator's HTTP endpoint

mod client;

use std::sync::Arc;

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::GaugeSettings;
use tapegauge_common::commands::inflate::{InflateCommand, InflateCommandResponse};
use tapegauge_common::messages::{Command, CommandResponse, Message};
use tapegauge_common::settings;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::client::InflateClient;

const DEFAULT_COMMAND_TOPIC: (&str, &str) = ("command-topic", "gauge.inflate.command");
const DEFAULT_SETTINGS_SUBSCRIBE_TOPIC: (&str, &str) =
    ("settings-subscribe-topic", "gauge.settings.updated");

const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 10;

/// Inflator control module
#[module(
    message_type(Message),
    name = "inflator-control",
    description = "Inflate actuator control over HTTP"
)]
pub struct InflatorControl;

impl InflatorControl {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let command_topic = config
            .get_string(DEFAULT_COMMAND_TOPIC.0)
            .unwrap_or(DEFAULT_COMMAND_TOPIC.1.to_string());
        let settings_topic = config
            .get_string(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.1.to_string());
        let timeout_secs = config
            .get_int("request-timeout-seconds")
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS) as u64;
        info!("Creating command handler on '{command_topic}'");

        let client = Arc::new(InflateClient::new(timeout_secs)?);
        let shared_settings = Arc::new(Mutex::new(GaugeSettings::default()));

        let settings_subscription = context.subscribe(&settings_topic).await?;
        let follower_settings = shared_settings.clone();
        context.run(async move {
            settings::follow(settings_subscription, follower_settings).await;
        });

        context.handle(&command_topic, move |message: Arc<Message>| {
            let client = client.clone();
            let shared_settings = shared_settings.clone();
            async move {
                let response = match message.as_ref() {
                    Message::Command(Command::Inflate(InflateCommand::Trigger {
                        duration_ms,
                    })) => Self::trigger(&client, &shared_settings, *duration_ms).await,
                    _ => {
                        error!("Unexpected message type on inflate command topic");
                        InflateCommandResponse::Failed {
                            reason: "unexpected message".to_string(),
                        }
                    }
                };
                Arc::new(Message::CommandResponse(CommandResponse::Inflate(response)))
            }
        });

        Ok(())
    }

    async fn trigger(
        client: &InflateClient,
        shared_settings: &Mutex<GaugeSettings>,
        duration_ms: u64,
    ) -> InflateCommandResponse {
        let base_url = shared_settings.lock().await.inflator_base_url();
        let Some(base_url) = base_url else {
            return InflateCommandResponse::Failed {
                reason: "inflator address not configured".to_string(),
            };
        };

        info!("Triggering inflate for {duration_ms}ms");
        match client.trigger(&base_url, duration_ms).await {
            Ok(()) => InflateCommandResponse::Completed,
            Err(e) => {
                error!("Inflate request failed: {e}");
                InflateCommandResponse::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
