//! Frame acquisition from the camera's HTTP capture endpoint

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tapegauge_common::FrameImage;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to initialise HTTP client: {0}")]
    ClientInit(reqwest::Error),

    #[error("Frame request to {0} failed: {1}")]
    RequestFailed(String, reqwest::Error),

    #[error("Frame fetch from {0} failed: HTTP status {1}")]
    InvalidStatusCode(String, reqwest::StatusCode),

    #[error("Camera returned an undecodable image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Fetches and decodes frames, and applies camera option settings
pub struct FrameFetcher {
    client: Client,
}

impl FrameFetcher {
    pub fn new(timeout_secs: u64, connect_timeout_secs: u64) -> Result<Self, CaptureError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .build()
            .map_err(CaptureError::ClientInit)?;
        Ok(Self { client })
    }

    /// Fetch one JPEG frame from `{base}/capture` and decode it to RGB8
    pub async fn fetch_frame(&self, base_url: &str) -> Result<FrameImage, CaptureError> {
        let url = format!("{base_url}/capture");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CaptureError::RequestFailed(url.clone(), e))?;

        if !response.status().is_success() {
            return Err(CaptureError::InvalidStatusCode(url, response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CaptureError::RequestFailed(url, e))?;

        let decoded = image::load_from_memory(&bytes)?.into_rgb8();
        Ok(FrameImage {
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        })
    }

    /// Apply camera options via `{base}/control?var=...&val=...`, returning a
    /// status string per option. Failures are reported, not fatal.
    pub async fn apply_options(
        &self,
        base_url: &str,
        options: &[(String, String)],
    ) -> HashMap<String, String> {
        let mut results = HashMap::new();
        for (var, val) in options {
            let url = format!("{base_url}/control?var={var}&val={val}");
            let status = match self.client.get(&url).send().await {
                Ok(response) => response.status().as_u16().to_string(),
                Err(e) => {
                    warn!("Camera option request to {url} failed: {e}");
                    "request failed".to_string()
                }
            };
            results.insert(var.clone(), status);
        }
        results
    }
}
