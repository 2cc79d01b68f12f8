use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use shared::protocol::SubmissionPayload;
use thiserror::Error;
use tracing::{error, info};

pub mod sheets;
pub mod webhook;

pub use sheets::{SheetsEndpoints, SheetsSink, ServiceAccountCredentials};
pub use webhook::WebhookSink;

/// Sink-specific failure. Never crosses the gateway boundary.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("submission sink is not configured: {0}")]
    MissingConfiguration(String),
    #[error("service account authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sink rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unexpected sink response: {0}")]
    UnexpectedResponse(String),
}

/// The only failure the session controller ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("submission failed")]
pub struct SubmissionFailed;

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, payload: &SubmissionPayload) -> Result<(), SinkError>;
}

/// Stands in for a sink whose configuration is absent.
pub struct MissingSink {
    reason: String,
}

impl MissingSink {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SubmissionSink for MissingSink {
    fn name(&self) -> &'static str {
        "missing"
    }

    async fn deliver(&self, _payload: &SubmissionPayload) -> Result<(), SinkError> {
        Err(SinkError::MissingConfiguration(self.reason.clone()))
    }
}

#[derive(Clone)]
pub struct SubmissionGateway {
    sink: Arc<dyn SubmissionSink>,
}

impl SubmissionGateway {
    pub fn new(sink: Arc<dyn SubmissionSink>) -> Self {
        Self { sink }
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self::new(Arc::new(MissingSink::new(reason)))
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    pub async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmissionFailed> {
        let started = Instant::now();
        match self.sink.deliver(payload).await {
            Ok(()) => {
                info!(
                    sink = self.sink.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    timestamp = %payload.timestamp_iso(),
                    "survey submission delivered"
                );
                Ok(())
            }
            Err(error) => {
                error!(
                    sink = self.sink.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    %error,
                    "survey submission failed"
                );
                Err(SubmissionFailed)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
