use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::SubmissionPayload;
use tracing::debug;
use url::Url;

use crate::{SinkError, SubmissionSink};

/// Posts the nested payload to a script-hosted webhook.
///
/// Fire-and-forget: the relay answers with an opaque response, so neither
/// status nor body is inspected. A request that leaves without a network
/// error counts as delivered; a row the script silently drops is
/// indistinguishable from one it stored.
pub struct WebhookSink {
    http: Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, SinkError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::MissingConfiguration(format!(
                "webhook url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SubmissionSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, payload: &SubmissionPayload) -> Result<(), SinkError> {
        let body = payload.to_json()?;
        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        debug!(
            status = response.status().as_u16(),
            "webhook request sent; response not inspected"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/webhook_tests.rs"]
mod tests;
