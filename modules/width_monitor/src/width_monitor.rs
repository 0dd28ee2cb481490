//! Tapegauge width monitor module for Caryatid
//! Applies threshold/debounce logic to measurements and drives the inflator

mod session;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::GaugeSettings;
use tapegauge_common::commands::inflate::{InflateCommand, InflateCommandResponse};
use tapegauge_common::commands::monitor::{MonitorCommand, MonitorCommandResponse};
use tapegauge_common::messages::{
    Command, CommandResponse, Message, NotifyChannel, NotifyKind, NotifyMessage,
};
use tapegauge_common::settings;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::session::{MonitorSession, SessionEffect};

const DEFAULT_MEASUREMENT_SUBSCRIBE_TOPIC: (&str, &str) =
    ("measurement-subscribe-topic", "camera.measurement");
const DEFAULT_FAILURE_SUBSCRIBE_TOPIC: (&str, &str) =
    ("failure-subscribe-topic", "camera.capture.failed");
const DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC: (&str, &str) =
    ("clock-tick-subscribe-topic", "clock.tick");
const DEFAULT_SETTINGS_SUBSCRIBE_TOPIC: (&str, &str) =
    ("settings-subscribe-topic", "gauge.settings.updated");
const DEFAULT_COMMAND_TOPIC: (&str, &str) = ("command-topic", "gauge.monitor.command");
const DEFAULT_INFLATE_COMMAND_TOPIC: (&str, &str) =
    ("inflate-command-topic", "gauge.inflate.command");
const DEFAULT_NOTIFY_TOPIC: (&str, &str) = ("notify-topic", "gauge.notify");

// Escalation points, in consecutive occurrences per category
const WIDTH_LOW_ESCALATE_AFTER: u32 = 3;
const CAMERA_ESCALATE_AFTER: u32 = 2;
const INFLATE_ESCALATE_AFTER: u32 = 2;

/// Width monitor module
#[module(
    message_type(Message),
    name = "width-monitor",
    description = "Threshold monitoring and corrective action dispatch"
)]
pub struct WidthMonitor;

impl WidthMonitor {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let measurement_topic = config
            .get_string(DEFAULT_MEASUREMENT_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_MEASUREMENT_SUBSCRIBE_TOPIC.1.to_string());
        let failure_topic = config
            .get_string(DEFAULT_FAILURE_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_FAILURE_SUBSCRIBE_TOPIC.1.to_string());
        let clock_topic = config
            .get_string(DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_CLOCK_TICK_SUBSCRIBE_TOPIC.1.to_string());
        let settings_topic = config
            .get_string(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.1.to_string());
        let command_topic = config
            .get_string(DEFAULT_COMMAND_TOPIC.0)
            .unwrap_or(DEFAULT_COMMAND_TOPIC.1.to_string());
        let inflate_topic = config
            .get_string(DEFAULT_INFLATE_COMMAND_TOPIC.0)
            .unwrap_or(DEFAULT_INFLATE_COMMAND_TOPIC.1.to_string());
        let notify_topic = config
            .get_string(DEFAULT_NOTIFY_TOPIC.0)
            .unwrap_or(DEFAULT_NOTIFY_TOPIC.1.to_string());
        info!("Creating subscriber on '{measurement_topic}'");

        let session = Arc::new(Mutex::new(MonitorSession::new()));
        let shared_settings = Arc::new(Mutex::new(GaugeSettings::default()));

        let settings_subscription = context.subscribe(&settings_topic).await?;
        let follower_settings = shared_settings.clone();
        context.run(async move {
            settings::follow(settings_subscription, follower_settings).await;
        });

        // Measurement loop
        let mut measurement_subscription = context.subscribe(&measurement_topic).await?;
        let measurement_session = session.clone();
        let measurement_settings = shared_settings.clone();
        let measurement_context = context.clone();
        let measurement_notify_topic = notify_topic.clone();
        let measurement_inflate_topic = inflate_topic.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = measurement_subscription.read().await else {
                    return;
                };
                let Message::Measurement(measurement) = message.as_ref() else {
                    continue;
                };

                // No-segment cycles are skipped silently; the pipeline keeps
                // running and the display shows the annotated reason
                if measurement.pixel_length == 0 {
                    continue;
                }

                // A usable frame means the camera path has recovered
                Self::notify(
                    &measurement_context,
                    &measurement_notify_topic,
                    NotifyKind::Recovery,
                    "camera-processing",
                    NotifyChannel::Operations,
                    "frame capture back to normal",
                    0,
                )
                .await;

                // Uncalibrated measurements cannot drive the threshold logic
                let Some(length_mm) = measurement.physical_mm else {
                    continue;
                };

                let effects = measurement_session
                    .lock()
                    .await
                    .handle_measurement(length_mm, Instant::now());
                Self::apply_effects(
                    &measurement_context,
                    effects,
                    &measurement_session,
                    &measurement_settings,
                    &measurement_notify_topic,
                    &measurement_inflate_topic,
                )
                .await;
            }
        });

        // Capture failure loop
        let mut failure_subscription = context.subscribe(&failure_topic).await?;
        let failure_context = context.clone();
        let failure_notify_topic = notify_topic.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = failure_subscription.read().await else {
                    return;
                };
                let Message::CaptureFailed(failure) = message.as_ref() else {
                    continue;
                };
                Self::notify(
                    &failure_context,
                    &failure_notify_topic,
                    NotifyKind::Error,
                    "camera-processing",
                    NotifyChannel::Operations,
                    &format!("frame capture failed: {}", failure.reason),
                    CAMERA_ESCALATE_AFTER,
                )
                .await;
            }
        });

        // Periodic state logging, once a minute
        let mut clock_subscription = context.subscribe(&clock_topic).await?;
        let clock_session = session.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = clock_subscription.read().await else {
                    return;
                };
                if let Message::Clock(tick) = message.as_ref() {
                    if tick.number % 60 == 0 {
                        let status = clock_session.lock().await.status();
                        if status.monitoring {
                            info!(
                                state = %status.state,
                                threshold = ?status.threshold_mm,
                                triggers = status.trigger_count,
                                "Monitoring"
                            );
                        }
                    }
                }
            }
        });

        // Operator command handler
        let command_session = session.clone();
        let command_context = context.clone();
        context.handle(&command_topic, move |message: Arc<Message>| {
            let session = command_session.clone();
            let context = command_context.clone();
            let notify_topic = notify_topic.clone();
            async move {
                let response = match message.as_ref() {
                    Message::Command(Command::Monitor(command)) => {
                        Self::handle_command(&context, &session, &notify_topic, command).await
                    }
                    _ => {
                        error!("Unexpected message type on monitor command topic");
                        MonitorCommandResponse::Error("unexpected message".to_string())
                    }
                };
                Arc::new(Message::CommandResponse(CommandResponse::Monitor(response)))
            }
        });

        Ok(())
    }

    async fn handle_command(
        context: &Arc<Context<Message>>,
        session: &Arc<Mutex<MonitorSession>>,
        notify_topic: &str,
        command: &MonitorCommand,
    ) -> MonitorCommandResponse {
        match command {
            MonitorCommand::Start { threshold_mm } => {
                let effects = match session.lock().await.start(*threshold_mm) {
                    Ok(effects) => effects,
                    Err(e) => return MonitorCommandResponse::Error(e.to_string()),
                };
                Self::apply_notify_effects(context, notify_topic, &effects, "width monitoring restarted")
                    .await;
                info!("Monitoring started with threshold {threshold_mm}mm");
                MonitorCommandResponse::Started {
                    threshold_mm: *threshold_mm,
                }
            }
            MonitorCommand::Stop => {
                let effects = session.lock().await.stop();
                Self::apply_notify_effects(context, notify_topic, &effects, "width monitoring stopped")
                    .await;
                info!("Monitoring stopped");
                MonitorCommandResponse::Stopped
            }
            MonitorCommand::Status => {
                MonitorCommandResponse::Status(session.lock().await.status())
            }
        }
    }

    /// Execute session effects: notifications plus the inflate dispatch
    async fn apply_effects(
        context: &Arc<Context<Message>>,
        effects: Vec<SessionEffect>,
        session: &Arc<Mutex<MonitorSession>>,
        shared_settings: &Arc<Mutex<GaugeSettings>>,
        notify_topic: &str,
        inflate_topic: &str,
    ) {
        for effect in effects {
            match effect {
                SessionEffect::AlertLow { length_mm } => {
                    Self::notify(
                        context,
                        notify_topic,
                        NotifyKind::Error,
                        "width-low",
                        NotifyChannel::Alerts,
                        &format!("tape width low: {length_mm:.2}mm"),
                        WIDTH_LOW_ESCALATE_AFTER,
                    )
                    .await;
                }
                SessionEffect::RecoveredLow => {
                    Self::notify(
                        context,
                        notify_topic,
                        NotifyKind::Recovery,
                        "width-low",
                        NotifyChannel::Alerts,
                        "tape width back to normal",
                        0,
                    )
                    .await;
                }
                SessionEffect::TriggerAction { length_mm } => {
                    Self::notify(
                        context,
                        notify_topic,
                        NotifyKind::Info,
                        "inflate",
                        NotifyChannel::Operations,
                        &format!("auto inflate triggered at {length_mm:.2}mm"),
                        0,
                    )
                    .await;
                    Self::dispatch_inflate(
                        context,
                        session,
                        shared_settings,
                        notify_topic,
                        inflate_topic,
                    )
                    .await;
                }
            }
        }
    }

    async fn apply_notify_effects(
        context: &Arc<Context<Message>>,
        notify_topic: &str,
        effects: &[SessionEffect],
        recovery_message: &str,
    ) {
        for effect in effects {
            if matches!(effect, SessionEffect::RecoveredLow) {
                Self::notify(
                    context,
                    notify_topic,
                    NotifyKind::Recovery,
                    "width-low",
                    NotifyChannel::Alerts,
                    recovery_message,
                    0,
                )
                .await;
            }
        }
    }

    /// Send the inflate command from its own task so the measurement loop is
    /// not held up for the duration of the actuation
    async fn dispatch_inflate(
        context: &Arc<Context<Message>>,
        session: &Arc<Mutex<MonitorSession>>,
        shared_settings: &Arc<Mutex<GaugeSettings>>,
        notify_topic: &str,
        inflate_topic: &str,
    ) {
        let (duration_ms, settle_secs) = {
            let settings = shared_settings.lock().await;
            let duration_ms = ((settings.inflate_duration_secs * 1000.0).round() as u64).max(1);
            (duration_ms, settings.post_inflate_wait_secs)
        };

        let request_context = context.clone();
        let request_session = session.clone();
        let notify_topic = notify_topic.to_string();
        let inflate_topic = inflate_topic.to_string();
        tokio::spawn(async move {
            let request = Arc::new(Message::Command(Command::Inflate(InflateCommand::Trigger {
                duration_ms,
            })));
            let outcome = match request_context.request(&inflate_topic, request).await {
                Ok(response) => match response.as_ref() {
                    Message::CommandResponse(CommandResponse::Inflate(
                        InflateCommandResponse::Completed,
                    )) => Ok(()),
                    Message::CommandResponse(CommandResponse::Inflate(
                        InflateCommandResponse::Failed { reason },
                    )) => Err(reason.clone()),
                    _ => Err("unexpected inflate response".to_string()),
                },
                Err(e) => Err(e.to_string()),
            };

            let success = outcome.is_ok();
            request_session.lock().await.action_completed(
                success,
                Instant::now(),
                Duration::from_secs(settle_secs),
            );

            match outcome {
                Ok(()) => {
                    info!("Inflate completed, settling for {settle_secs}s");
                    Self::notify(
                        &request_context,
                        &notify_topic,
                        NotifyKind::Recovery,
                        "inflate-request",
                        NotifyChannel::Operations,
                        "inflate control back to normal",
                        0,
                    )
                    .await;
                }
                Err(reason) => {
                    warn!("Inflate failed: {reason}");
                    Self::notify(
                        &request_context,
                        &notify_topic,
                        NotifyKind::Error,
                        "inflate-request",
                        NotifyChannel::Operations,
                        &format!("inflate request failed: {reason}"),
                        INFLATE_ESCALATE_AFTER,
                    )
                    .await;
                }
            }
        });
    }

    async fn notify(
        context: &Arc<Context<Message>>,
        topic: &str,
        kind: NotifyKind,
        category: &str,
        channel: NotifyChannel,
        message: &str,
        escalate_after: u32,
    ) {
        let message_enum = Arc::new(Message::Notify(NotifyMessage {
            kind,
            category: category.to_string(),
            channel,
            message: message.to_string(),
            escalate_after,
        }));
        context
            .publish(topic, message_enum)
            .await
            .unwrap_or_else(|e| error!("Failed to publish notification: {e}"));
    }
}
