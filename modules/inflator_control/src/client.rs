//! HTTP client for the inflate actuator

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InflateError {
    #[error("Failed to initialise HTTP client: {0}")]
    ClientInit(reqwest::Error),

    #[error("Inflate request to {0} failed: {1}")]
    RequestFailed(String, reqwest::Error),

    #[error("Inflate request to {0} rejected: HTTP status {1}")]
    InvalidStatusCode(String, reqwest::StatusCode),
}

/// Drives the actuator's GPIO pin over its HTTP control endpoint
pub struct InflateClient {
    client: Client,
}

impl InflateClient {
    pub fn new(timeout_secs: u64) -> Result<Self, InflateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(InflateError::ClientInit)?;
        Ok(Self { client })
    }

    /// Hold the inflate pin for `duration_ms`. The actuator blocks until the
    /// pin is released, so the response arrives after the full duration.
    pub async fn trigger(&self, base_url: &str, duration_ms: u64) -> Result<(), InflateError> {
        let url = format!("{base_url}/control?pin=D1&duration={duration_ms}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InflateError::RequestFailed(url.clone(), e))?;

        if !response.status().is_success() {
            return Err(InflateError::InvalidStatusCode(url, response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn trigger_hits_the_control_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/control"))
            .and(query_param("pin", "D1"))
            .and(query_param("duration", "10000"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = InflateClient::new(10).unwrap();
        assert!(client.trigger(&mock_server.uri(), 10_000).await.is_ok());
    }

    #[tokio::test]
    async fn non_2xx_fails_the_trigger() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = InflateClient::new(10).unwrap();
        let result = client.trigger(&mock_server.uri(), 5_000).await;
        assert!(matches!(result, Err(InflateError::InvalidStatusCode(_, _))));
    }

    #[tokio::test]
    async fn unreachable_host_fails_the_trigger() {
        // Reserved TEST-NET-1 address, nothing listens there
        let client = InflateClient::new(1).unwrap();
        let result = client.trigger("http://192.0.2.1:9", 5_000).await;
        assert!(matches!(result, Err(InflateError::RequestFailed(_, _))));
    }
}
