//! Outbound webhook transport for notifications

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Failed to initialise HTTP client: {0}")]
    ClientInit(reqwest::Error),

    #[error("Webhook request to {0} failed: {1}")]
    RequestFailed(String, reqwest::Error),

    #[error("Webhook delivery to {0} rejected: HTTP status {1}")]
    InvalidStatusCode(String, reqwest::StatusCode),
}

/// Posts text notifications to a webhook endpoint. Delivery failures are
/// surfaced, never retried here.
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(timeout_secs: u64) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(WebhookError::ClientInit)?;
        Ok(Self { client })
    }

    pub async fn post_text(&self, url: &str, content: &str) -> Result<(), WebhookError> {
        let payload = json!({
            "msgtype": "text",
            "text": { "content": content },
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WebhookError::RequestFailed(url.to_string(), e))?;

        if !response.status().is_success() {
            return Err(WebhookError::InvalidStatusCode(
                url.to_string(),
                response.status(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_the_expected_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(json!({
                "msgtype": "text",
                "text": { "content": "width back to normal" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = WebhookClient::new(5).unwrap();
        let url = format!("{}/send", mock_server.uri());
        assert!(client.post_text(&url, "width back to normal").await.is_ok());
    }

    #[tokio::test]
    async fn non_2xx_is_a_delivery_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = WebhookClient::new(5).unwrap();
        let result = client.post_text(&mock_server.uri(), "hello").await;
        assert!(matches!(
            result,
            Err(WebhookError::InvalidStatusCode(_, status)) if status.as_u16() == 500
        ));
    }
}
