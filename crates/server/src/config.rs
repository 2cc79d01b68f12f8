use std::{fs, io::ErrorKind, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::SurveyVariant;
use submission_gateway::{
    SheetsEndpoints, SheetsSink, ServiceAccountCredentials, SubmissionGateway, WebhookSink,
};
use tracing::{error, info};
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "survey.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Webhook,
    Sheets,
    None,
}

impl SinkKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "webhook" => Some(Self::Webhook),
            "sheets" | "google_sheets" => Some(Self::Sheets),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub variant: SurveyVariant,
    pub sink: Option<SinkKind>,
    pub webhook_url: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub google_client_email: Option<String>,
    pub google_private_key: Option<String>,
    pub request_timeout_seconds: u64,
    pub max_open_sessions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            variant: SurveyVariant::default(),
            sink: None,
            webhook_url: None,
            spreadsheet_id: None,
            google_client_email: None,
            google_private_key: None,
            request_timeout_seconds: 15,
            max_open_sessions: 1024,
        }
    }
}

impl Settings {
    /// An explicit sink wins; otherwise whichever sink has its settings present.
    pub fn resolved_sink(&self) -> SinkKind {
        if let Some(kind) = self.sink {
            return kind;
        }
        if self.spreadsheet_id.is_some() && self.google_client_email.is_some() {
            SinkKind::Sheets
        } else if self.webhook_url.is_some() {
            SinkKind::Webhook
        } else {
            SinkKind::None
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    bind_addr: Option<String>,
    survey_variant: Option<String>,
    survey_sink: Option<String>,
    webhook_url: Option<String>,
    spreadsheet_id: Option<String>,
    google_client_email: Option<String>,
    google_private_key: Option<String>,
    request_timeout_seconds: Option<u64>,
    max_open_sessions: Option<usize>,
}

/// `path` is `None` when no `--config` was given; only then may the file
/// be absent.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg)?;
        }
        Err(e) if !required && e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read config file '{}'", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) -> anyhow::Result<()> {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.survey_variant {
        settings.variant = parse_variant(&v)?;
    }
    if let Some(v) = file_cfg.survey_sink {
        settings.sink = Some(parse_sink(&v)?);
    }
    if let Some(v) = file_cfg.webhook_url {
        settings.webhook_url = non_empty(v);
    }
    if let Some(v) = file_cfg.spreadsheet_id {
        settings.spreadsheet_id = non_empty(v);
    }
    if let Some(v) = file_cfg.google_client_email {
        settings.google_client_email = non_empty(v);
    }
    if let Some(v) = file_cfg.google_private_key {
        settings.google_private_key = non_empty(v);
    }
    if let Some(v) = file_cfg.request_timeout_seconds {
        settings.request_timeout_seconds = v;
    }
    if let Some(v) = file_cfg.max_open_sessions {
        settings.max_open_sessions = v;
    }
    Ok(())
}

/// Plain names first, then their `APP__` counterparts, so the prefixed
/// form wins when both are set.
pub(crate) fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let pick = |plain: &str, prefixed: &str| lookup(prefixed).or_else(|| lookup(plain));

    if let Some(v) = pick("SERVER_BIND", "APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = pick("SURVEY_VARIANT", "APP__SURVEY_VARIANT") {
        settings.variant = parse_variant(&v)?;
    }
    if let Some(v) = pick("SURVEY_SINK", "APP__SURVEY_SINK") {
        settings.sink = Some(parse_sink(&v)?);
    }
    if let Some(v) = pick("SURVEY_WEBHOOK_URL", "APP__WEBHOOK_URL") {
        settings.webhook_url = non_empty(v);
    }
    if let Some(v) = pick("SPREADSHEET_ID", "APP__SPREADSHEET_ID") {
        settings.spreadsheet_id = non_empty(v);
    }
    if let Some(v) = pick("GOOGLE_CLIENT_EMAIL", "APP__GOOGLE_CLIENT_EMAIL") {
        settings.google_client_email = non_empty(v);
    }
    if let Some(v) = pick("GOOGLE_PRIVATE_KEY", "APP__GOOGLE_PRIVATE_KEY") {
        settings.google_private_key = non_empty(v);
    }
    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }
    if let Some(v) = lookup("APP__MAX_OPEN_SESSIONS") {
        if let Ok(parsed) = v.trim().parse::<usize>() {
            settings.max_open_sessions = parsed;
        }
    }
    Ok(())
}

fn parse_variant(raw: &str) -> anyhow::Result<SurveyVariant> {
    SurveyVariant::parse(raw).with_context(|| format!("unknown survey variant '{raw}'"))
}

fn parse_sink(raw: &str) -> anyhow::Result<SinkKind> {
    SinkKind::parse(raw).with_context(|| format!("unknown submission sink '{raw}'"))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Builds the deployment's sink. Incomplete configuration is logged and
/// degrades to a sink whose every delivery fails.
pub fn build_gateway(settings: &Settings) -> SubmissionGateway {
    match try_build_gateway(settings) {
        Ok(gateway) => {
            info!(sink = gateway.sink_name(), variant = ?settings.variant, "submission sink ready");
            gateway
        }
        Err(reason) => {
            error!(%reason, "submission sink unavailable; submissions will fail");
            SubmissionGateway::missing(reason)
        }
    }
}

fn try_build_gateway(settings: &Settings) -> Result<SubmissionGateway, String> {
    let timeout = settings.request_timeout();
    match settings.resolved_sink() {
        SinkKind::None => Err("no submission sink configured".into()),
        SinkKind::Webhook => {
            let raw = settings
                .webhook_url
                .as_deref()
                .ok_or("SURVEY_WEBHOOK_URL is not set")?;
            let url = Url::parse(raw).map_err(|e| format!("invalid webhook url '{raw}': {e}"))?;
            let sink = WebhookSink::new(url, timeout).map_err(|e| e.to_string())?;
            Ok(SubmissionGateway::new(std::sync::Arc::new(sink)))
        }
        SinkKind::Sheets => {
            let (Some(email), Some(key), Some(spreadsheet_id)) = (
                settings.google_client_email.as_deref(),
                settings.google_private_key.as_deref(),
                settings.spreadsheet_id.as_deref(),
            ) else {
                return Err(
                    "GOOGLE_CLIENT_EMAIL, GOOGLE_PRIVATE_KEY and SPREADSHEET_ID are required".into(),
                );
            };
            let credentials = ServiceAccountCredentials::new(email, key, spreadsheet_id);
            let endpoints = SheetsEndpoints::google().map_err(|e| e.to_string())?;
            let sink = SheetsSink::new(credentials, endpoints, timeout).map_err(|e| e.to_string())?;
            Ok(SubmissionGateway::new(std::sync::Arc::new(sink)))
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
