//! Tapegauge camera capture module for Caryatid
//! Periodically acquires frames from the camera and publishes them in order

mod fetcher;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use caryatid_sdk::{Context, module};
use config::Config;
use tapegauge_common::messages::{CaptureFailedMessage, FrameCapturedMessage, Message};
use tapegauge_common::{FrameImage, GaugeSettings};
use tapegauge_common::settings;
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

use crate::fetcher::{CaptureError, FrameFetcher};

const DEFAULT_FRAME_PUBLISH_TOPIC: (&str, &str) = ("frame-publish-topic", "camera.frame");
const DEFAULT_FAILURE_PUBLISH_TOPIC: (&str, &str) =
    ("failure-publish-topic", "camera.capture.failed");
const DEFAULT_SETTINGS_SUBSCRIBE_TOPIC: (&str, &str) =
    ("settings-subscribe-topic", "gauge.settings.updated");

const DEFAULT_CAPTURE_INTERVAL_MS: i64 = 500;
const DEFAULT_FETCH_ATTEMPTS: i64 = 3;
const DEFAULT_RETRY_DELAY_MS: i64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 5;
const DEFAULT_CONNECT_TIMEOUT_SECS: i64 = 5;

// ESP32 camera framesize option: 13 = UXGA
const DEFAULT_FRAMESIZE: &str = "13";

/// Camera capture module
#[module(
    message_type(Message),
    name = "camera-capture",
    description = "Periodic camera frame acquisition over HTTP"
)]
pub struct CameraCapture;

impl CameraCapture {
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        let frame_topic = config
            .get_string(DEFAULT_FRAME_PUBLISH_TOPIC.0)
            .unwrap_or(DEFAULT_FRAME_PUBLISH_TOPIC.1.to_string());
        let failure_topic = config
            .get_string(DEFAULT_FAILURE_PUBLISH_TOPIC.0)
            .unwrap_or(DEFAULT_FAILURE_PUBLISH_TOPIC.1.to_string());
        let settings_topic = config
            .get_string(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.0)
            .unwrap_or(DEFAULT_SETTINGS_SUBSCRIBE_TOPIC.1.to_string());
        info!("Publishing frames on '{frame_topic}'");

        let interval_ms =
            config.get_int("capture-interval-ms").unwrap_or(DEFAULT_CAPTURE_INTERVAL_MS) as u64;
        let attempts =
            (config.get_int("fetch-attempts").unwrap_or(DEFAULT_FETCH_ATTEMPTS) as u32).max(1);
        let retry_delay_ms =
            config.get_int("retry-delay-ms").unwrap_or(DEFAULT_RETRY_DELAY_MS) as u64;
        let timeout_secs = config
            .get_int("request-timeout-seconds")
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS) as u64;
        let connect_timeout_secs = config
            .get_int("connect-timeout-seconds")
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS) as u64;
        let framesize =
            config.get_string("framesize").unwrap_or(DEFAULT_FRAMESIZE.to_string());

        let fetcher = FrameFetcher::new(timeout_secs, connect_timeout_secs)?;
        let shared_settings = Arc::new(Mutex::new(GaugeSettings::default()));

        let settings_subscription = context.subscribe(&settings_topic).await?;
        let follower_settings = shared_settings.clone();
        context.run(async move {
            settings::follow(settings_subscription, follower_settings).await;
        });

        let capture_context = context.clone();
        context.run(async move {
            let camera_options = vec![("framesize".to_string(), framesize)];
            let mut ticker = interval(Duration::from_millis(interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut sequence = 0u64;
            let mut initialised_for: Option<String> = None;

            loop {
                ticker.tick().await;

                let base_url = shared_settings.lock().await.camera_base_url();
                let Some(base_url) = base_url else {
                    Self::publish_failure(
                        &capture_context,
                        &failure_topic,
                        "camera address not configured",
                    )
                    .await;
                    continue;
                };

                // (Re-)apply camera options whenever the host changes
                if initialised_for.as_deref() != Some(base_url.as_str()) {
                    let status = fetcher.apply_options(&base_url, &camera_options).await;
                    info!("Applied camera options to {base_url}: {status:?}");
                    initialised_for = Some(base_url.clone());
                }

                match Self::fetch_with_retry(
                    &fetcher,
                    &base_url,
                    attempts,
                    Duration::from_millis(retry_delay_ms),
                )
                .await
                {
                    Ok(frame) => {
                        sequence += 1;
                        let message =
                            Arc::new(Message::Frame(FrameCapturedMessage { sequence, frame }));
                        capture_context
                            .publish(&frame_topic, message)
                            .await
                            .unwrap_or_else(|e| error!("Failed to publish frame: {e}"));
                    }
                    Err(e) => {
                        Self::publish_failure(&capture_context, &failure_topic, &e.to_string())
                            .await;
                    }
                }
            }
        });

        Ok(())
    }

    /// Fetch one frame, retrying transient failures with a fixed delay
    async fn fetch_with_retry(
        fetcher: &FrameFetcher,
        base_url: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<FrameImage, CaptureError> {
        let mut attempt = 1;
        loop {
            match fetcher.fetch_frame(base_url).await {
                Ok(frame) => return Ok(frame),
                Err(e) if attempt < attempts => {
                    warn!("Frame fetch attempt {attempt}/{attempts} failed: {e}");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn publish_failure(context: &Arc<Context<Message>>, topic: &str, reason: &str) {
        let message = Arc::new(Message::CaptureFailed(CaptureFailedMessage {
            reason: reason.to_string(),
        }));
        context
            .publish(topic, message)
            .await
            .unwrap_or_else(|e| error!("Failed to publish capture failure: {e}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jpeg_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageFormat::Jpeg)
            .unwrap();
        buffer.into_inner()
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let mock_server = MockServer::start().await;

        // First two attempts fail, the third succeeds
        Mock::given(method("GET"))
            .and(path("/capture"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/capture"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(jpeg_bytes()))
            .mount(&mock_server)
            .await;

        let fetcher = FrameFetcher::new(5, 5).unwrap();
        let frame = CameraCapture::fetch_with_retry(
            &fetcher,
            &mock_server.uri(),
            3,
            Duration::ZERO,
        )
        .await
        .unwrap();
        assert_eq!(frame.width, 4);
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_the_last_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/capture"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&mock_server)
            .await;

        let fetcher = FrameFetcher::new(5, 5).unwrap();
        let result = CameraCapture::fetch_with_retry(
            &fetcher,
            &mock_server.uri(),
            3,
            Duration::ZERO,
        )
        .await;
        assert!(matches!(result, Err(CaptureError::InvalidStatusCode(_, _))));
    }
}
