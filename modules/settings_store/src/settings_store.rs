//! Tapegauge settings store module for Caryatid
//! Loads, validates and publishes the operator settings

mod store;

use std::sync::Arc;

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::commands::settings::{SettingsCommand, SettingsCommandResponse};
use tapegauge_common::messages::{Command, CommandResponse, Message, SettingsMessage};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::store::SettingsFile;

const DEFAULT_SETTINGS_FILE: (&str, &str) = ("settings-file", "gauge-settings.txt");
const DEFAULT_COMMAND_TOPIC: (&str, &str) = ("command-topic", "gauge.settings.command");
const DEFAULT_PUBLISH_TOPIC: (&str, &str) = ("publish-topic", "gauge.settings.updated");

/// Settings store module
#[module(
    message_type(Message),
    name = "settings-store",
    description = "Operator settings persistence and publication"
)]
pub struct SettingsStore;

impl SettingsStore {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let settings_file = config
            .get_string(DEFAULT_SETTINGS_FILE.0)
            .unwrap_or(DEFAULT_SETTINGS_FILE.1.to_string());
        let command_topic = config
            .get_string(DEFAULT_COMMAND_TOPIC.0)
            .unwrap_or(DEFAULT_COMMAND_TOPIC.1.to_string());
        let publish_topic = config
            .get_string(DEFAULT_PUBLISH_TOPIC.0)
            .unwrap_or(DEFAULT_PUBLISH_TOPIC.1.to_string());
        info!("Creating command handler on '{command_topic}'");

        let store = Arc::new(Mutex::new(SettingsFile::load(&settings_file)));
        info!("Loaded operator settings from {settings_file}");

        let handler_store = store.clone();
        let handler_context = context.clone();
        let handler_publish_topic = publish_topic.clone();
        context.handle(&command_topic, move |message: Arc<Message>| {
            let store = handler_store.clone();
            let context = handler_context.clone();
            let publish_topic = handler_publish_topic.clone();
            async move {
                let response = match message.as_ref() {
                    Message::Command(Command::Settings(command)) => {
                        let mut store = store.lock().await;
                        let response = Self::handle_command(&mut store, command);
                        if let SettingsCommandResponse::Updated(settings) = &response {
                            let update = Arc::new(Message::SettingsUpdated(SettingsMessage {
                                settings: settings.clone(),
                            }));
                            context.publish(&publish_topic, update).await.unwrap_or_else(
                                |e| error!("Failed to publish settings update: {e}"),
                            );
                        }
                        response
                    }
                    _ => {
                        error!("Unexpected message type on settings command topic");
                        SettingsCommandResponse::Error("unexpected message".to_string())
                    }
                };
                Arc::new(Message::CommandResponse(CommandResponse::Settings(response)))
            }
        });

        // Publish the loaded settings once the process is running so the
        // consuming modules start from the persisted values
        let startup_context = context.clone();
        context.run(async move {
            let settings = store.lock().await.settings().clone();
            let message = Arc::new(Message::SettingsUpdated(SettingsMessage { settings }));
            startup_context.publish(&publish_topic, message).await.unwrap_or_else(|e| {
                error!("Failed to publish initial settings: {e}");
            });
        });

        Ok(())
    }

    fn handle_command(
        store: &mut SettingsFile,
        command: &SettingsCommand,
    ) -> SettingsCommandResponse {
        let result = match command {
            SettingsCommand::Get => {
                return SettingsCommandResponse::Current(store.settings().clone());
            }
            SettingsCommand::SetCameraHost { host } => store.set_camera_host(host),
            SettingsCommand::SetInflatorHost { host } => store.set_inflator_host(host),
            SettingsCommand::SetInflateDuration { seconds } => {
                store.set_inflate_duration(*seconds)
            }
            SettingsCommand::SetPostInflateWait { seconds } => {
                store.set_post_inflate_wait(*seconds)
            }
            SettingsCommand::SetDetectionLineRatio { ratio } => {
                store.set_detection_line_ratio(*ratio)
            }
        };

        match result {
            Ok(()) => SettingsCommandResponse::Updated(store.settings().clone()),
            Err(e) => SettingsCommandResponse::Error(e.to_string()),
        }
    }
}
