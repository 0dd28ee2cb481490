//! Tapegauge width measurer module for Caryatid
//! Turns captured frames into calibrated width measurements

mod overlay;
mod pipeline;
mod segment;

use std::sync::Arc;

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::GaugeSettings;
use tapegauge_common::commands::measurer::{
    LatestMeasurement, MeasurerCommand, MeasurerCommandResponse,
};
use tapegauge_common::messages::{Command, CommandResponse, Message, WidthMeasurementMessage};
use tapegauge_common::settings;
use tokio::sync::Mutex;
use tracing::{error, info};

const DEFAULT_FRAME_SUBSCRIBE_TOPIC: (&str, &str) = ("frame-subscribe-topic", "camera.frame");
const DEFAULT_MEASUREMENT_PUBLISH_TOPIC: (&str, &str) =
    ("measurement-publish-topic", "camera.measurement");
const DEFAULT_SETTINGS_SUBSCRIBE_TOPIC: (&str, &str) =
    ("settings-subscribe-topic", "gauge.settings.updated");
const DEFAULT_COMMAND_TOPIC: (&str, &str) = ("command-topic", "gauge.measurer.command");

/// Measurer state shared between the frame loop and the command handler
#[derive(Default)]
struct MeasurerState {
    /// mm per pixel, set by the calibrate command
    calibration_rate: Option<f64>,

    /// Latest measurement summary; zero-length cycles leave this untouched
    latest: Option<LatestMeasurement>,
}

/// Width measurer module
#[module(
    message_type(Message),
    name = "width-measurer",
    description = "Width measurement pipeline over captured frames"
)]
pub struct WidthMeasurer;

impl WidthMeasurer {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let frame_topic = config
            .get_string(DEFAULT_FRAME_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_FRAME_SUBSCRIBE_TOPIC.1.to_string());
        let measurement_topic = config
            .get_string(DEFAULT_MEASUREMENT_PUBLISH_TOPIC.0)
            .unwrap_or(DEFAULT_MEASUREMENT_PUBLISH_TOPIC.1.to_string());
        let settings_topic = config
            .get_string(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.1.to_string());
        let command_topic = config
            .get_string(DEFAULT_COMMAND_TOPIC.0)
            .unwrap_or(DEFAULT_COMMAND_TOPIC.1.to_string());
        info!("Creating subscriber on '{frame_topic}'");

        let state = Arc::new(Mutex::new(MeasurerState::default()));
        let shared_settings = Arc::new(Mutex::new(GaugeSettings::default()));

        let settings_subscription = context.subscribe(&settings_topic).await?;
        let follower_settings = shared_settings.clone();
        context.run(async move {
            settings::follow(settings_subscription, follower_settings).await;
        });

        // Frame loop: measure each frame in capture order
        let mut frame_subscription = context.subscribe(&frame_topic).await?;
        let frame_state = state.clone();
        let frame_context = context.clone();
        context.run(async move {
            loop {
                let Ok((_, message)) = frame_subscription.read().await else {
                    return;
                };
                let Message::Frame(frame_msg) = message.as_ref() else {
                    continue;
                };

                let line_ratio = shared_settings.lock().await.detection_line_ratio;
                let measurement = pipeline::measure(&frame_msg.frame, line_ratio);

                let physical_mm = {
                    let mut state = frame_state.lock().await;
                    let physical_mm = match (measurement.pixel_length, state.calibration_rate) {
                        (0, _) => None,
                        (px, rate) => rate.map(|r| px as f64 * r),
                    };
                    if measurement.pixel_length > 0 {
                        state.latest = Some(LatestMeasurement {
                            pixel_length: measurement.pixel_length,
                            physical_mm,
                        });
                    }
                    physical_mm
                };

                let message_enum = Arc::new(Message::Measurement(WidthMeasurementMessage {
                    sequence: frame_msg.sequence,
                    pixel_length: measurement.pixel_length,
                    physical_mm,
                    row: measurement.row,
                    status: measurement.status,
                    overlay: measurement.overlay,
                }));
                frame_context
                    .publish(&measurement_topic, message_enum)
                    .await
                    .unwrap_or_else(|e| error!("Failed to publish measurement: {e}"));
            }
        });

        // Command handler: calibration and latest-measurement queries
        let command_state = state.clone();
        context.handle(&command_topic, move |message: Arc<Message>| {
            let state = command_state.clone();
            async move {
                let response = match message.as_ref() {
                    Message::Command(Command::Measurer(command)) => {
                        let mut state = state.lock().await;
                        Self::handle_command(&mut state, command)
                    }
                    _ => {
                        error!("Unexpected message type on measurer command topic");
                        MeasurerCommandResponse::Error("unexpected message".to_string())
                    }
                };
                Arc::new(Message::CommandResponse(CommandResponse::Measurer(response)))
            }
        });

        Ok(())
    }

    fn handle_command(
        state: &mut MeasurerState,
        command: &MeasurerCommand,
    ) -> MeasurerCommandResponse {
        match command {
            MeasurerCommand::Calibrate { known_length_mm } => {
                if !known_length_mm.is_finite() || *known_length_mm <= 0.0 {
                    return MeasurerCommandResponse::Error(
                        "known length must be a positive number".to_string(),
                    );
                }
                let Some(latest) = &state.latest else {
                    return MeasurerCommandResponse::Error(
                        "no usable measurement to calibrate against".to_string(),
                    );
                };
                let rate = known_length_mm / latest.pixel_length as f64;
                state.calibration_rate = Some(rate);
                info!(
                    "Calibrated at {rate:.5} mm/px from {} px",
                    latest.pixel_length
                );
                MeasurerCommandResponse::Calibrated {
                    rate_mm_per_px: rate,
                }
            }
            MeasurerCommand::GetMeasurement => match &state.latest {
                Some(latest) => MeasurerCommandResponse::Measurement(latest.clone()),
                None => MeasurerCommandResponse::Error("no measurement yet".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrate_uses_the_latest_measurement() {
        let mut state = MeasurerState {
            calibration_rate: None,
            latest: Some(LatestMeasurement {
                pixel_length: 21,
                physical_mm: None,
            }),
        };

        let response = WidthMeasurer::handle_command(
            &mut state,
            &MeasurerCommand::Calibrate {
                known_length_mm: 10.5,
            },
        );
        match response {
            MeasurerCommandResponse::Calibrated { rate_mm_per_px } => {
                assert_eq!(rate_mm_per_px, 0.5);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(state.calibration_rate, Some(0.5));
    }

    #[test]
    fn calibrate_rejects_bad_input_without_mutation() {
        let mut state = MeasurerState::default();

        for known in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let response = WidthMeasurer::handle_command(
                &mut state,
                &MeasurerCommand::Calibrate {
                    known_length_mm: known,
                },
            );
            assert!(matches!(response, MeasurerCommandResponse::Error(_)));
        }
        assert_eq!(state.calibration_rate, None);
    }

    #[test]
    fn calibrate_requires_a_usable_measurement() {
        let mut state = MeasurerState::default();
        let response = WidthMeasurer::handle_command(
            &mut state,
            &MeasurerCommand::Calibrate {
                known_length_mm: 10.0,
            },
        );
        assert!(matches!(response, MeasurerCommandResponse::Error(_)));
    }

    #[test]
    fn get_measurement_returns_the_latest() {
        let mut state = MeasurerState::default();
        assert!(matches!(
            WidthMeasurer::handle_command(&mut state, &MeasurerCommand::GetMeasurement),
            MeasurerCommandResponse::Error(_)
        ));

        state.latest = Some(LatestMeasurement {
            pixel_length: 42,
            physical_mm: Some(21.0),
        });
        match WidthMeasurer::handle_command(&mut state, &MeasurerCommand::GetMeasurement) {
            MeasurerCommandResponse::Measurement(latest) => {
                assert_eq!(latest.pixel_length, 42);
                assert_eq!(latest.physical_mm, Some(21.0));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
