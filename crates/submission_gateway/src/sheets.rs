use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::protocol::SubmissionPayload;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::{SinkError, SubmissionSink};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECONDS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Clone)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub spreadsheet_id: String,
}

impl ServiceAccountCredentials {
    /// Keys pasted into env files usually carry literal `\n` sequences.
    pub fn new(
        client_email: impl Into<String>,
        private_key: impl AsRef<str>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.as_ref().replace("\\n", "\n"),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SheetsEndpoints {
    pub token_uri: Url,
    pub api_base: Url,
}

impl SheetsEndpoints {
    pub fn google() -> Result<Self, url::ParseError> {
        Ok(Self {
            token_uri: Url::parse(DEFAULT_TOKEN_URI)?,
            api_base: Url::parse(DEFAULT_SHEETS_API_BASE)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

pub fn mint_assertion(
    credentials: &ServiceAccountCredentials,
    key: &EncodingKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = AssertionClaims {
        iss: &credentials.client_email,
        scope: SPREADSHEETS_SCOPE,
        aud: audience,
        iat: now.timestamp(),
        exp: (now + ChronoDuration::seconds(ASSERTION_TTL_SECONDS)).timestamp(),
    };
    encode(&Header::new(Algorithm::RS256), &claims, key)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Appends one flattened row per submission to the spreadsheet's first
/// worksheet, authenticating as a service account.
pub struct SheetsSink {
    http: Client,
    credentials: ServiceAccountCredentials,
    endpoints: SheetsEndpoints,
    key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsSink {
    pub fn new(
        credentials: ServiceAccountCredentials,
        endpoints: SheetsEndpoints,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        if credentials.client_email.trim().is_empty() || credentials.spreadsheet_id.trim().is_empty() {
            return Err(SinkError::MissingConfiguration(
                "service account email and spreadsheet id are required".into(),
            ));
        }
        if endpoints.api_base.cannot_be_a_base() {
            return Err(SinkError::MissingConfiguration(format!(
                "sheets api base '{}' is not a base url",
                endpoints.api_base
            )));
        }
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|e| {
            SinkError::MissingConfiguration(format!("invalid service account private key: {e}"))
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            credentials,
            endpoints,
            key,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, SinkError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECONDS) > now {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = mint_assertion(
            &self.credentials,
            &self.key,
            self.endpoints.token_uri.as_str(),
            now,
        )
        .map_err(|e| SinkError::Auth(format!("failed to sign assertion: {e}")))?;

        let response = self
            .http
            .post(self.endpoints.token_uri.clone())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = response.json().await?;
        let expires_in = token.expires_in.unwrap_or(ASSERTION_TTL_SECONDS);
        debug!(expires_in, "obtained sheets access token");

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + ChronoDuration::seconds(expires_in),
        });
        Ok(token.access_token)
    }

    fn spreadsheet_url(&self, segments: &[&str]) -> Result<Url, SinkError> {
        let mut url = self.endpoints.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SinkError::MissingConfiguration("sheets api base is not a base url".into())
            })?
            .pop_if_empty()
            .push(&self.credentials.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn first_sheet_title(&self, token: &str) -> Result<String, SinkError> {
        let url = self.spreadsheet_url(&[])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(title,index)")])
            .send()
            .await?;
        let info: SpreadsheetInfo = expect_success(response).await?.json().await?;
        info.sheets
            .into_iter()
            .map(|sheet| sheet.properties)
            .min_by_key(|properties| properties.index)
            .map(|properties| properties.title)
            .ok_or_else(|| SinkError::UnexpectedResponse("spreadsheet has no worksheets".into()))
    }

    async fn header_row(&self, token: &str, header_range: &str) -> Result<Vec<String>, SinkError> {
        let url = self.spreadsheet_url(&["values", header_range])?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let range: ValueRange = expect_success(response).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|cell| match cell {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect())
    }

    async fn write_header(
        &self,
        token: &str,
        header_range: &str,
        header: &[String],
    ) -> Result<(), SinkError> {
        let url = self.spreadsheet_url(&["values", header_range])?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [header] }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn append_row(&self, token: &str, sheet_range: &str, values: Vec<Value>) -> Result<(), SinkError> {
        let append_segment = format!("{sheet_range}:append");
        let url = self.spreadsheet_url(&["values", append_segment.as_str()])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}

fn quoted_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

async fn expect_success(response: Response) -> Result<Response, SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SubmissionSink for SheetsSink {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn deliver(&self, payload: &SubmissionPayload) -> Result<(), SinkError> {
        let token = self.access_token().await?;
        let sheet = quoted_sheet(&self.first_sheet_title(&token).await?);
        let header_range = format!("{sheet}!1:1");

        let row = payload.to_sheet_row();
        let mut header = self.header_row(&token, &header_range).await?;
        if header.is_empty() {
            header = row.header();
            self.write_header(&token, &header_range, &header).await?;
            info!(columns = header.len(), sheet = %sheet, "wrote header row to empty worksheet");
        }

        let (values, missing) = row.align_to(&header);
        if !missing.is_empty() {
            warn!(?missing, "worksheet header lacks columns; values dropped");
        }
        self.append_row(&token, &sheet, values).await
    }
}

#[cfg(test)]
#[path = "tests/sheets_tests.rs"]
mod tests;
