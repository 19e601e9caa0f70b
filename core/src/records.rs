//! Client for the clinical-notes Record API. A data source and sink only;
//! nothing in the orchestrator state machine depends on it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::config::RecordSettings;
use crate::error::AgentError;

pub const API_KEY_ENV: &str = "NOTELINK_RECORDS_API_KEY";
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSession {
    #[serde(alias = "id")]
    pub session_id: String,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    token: String,
    #[serde(alias = "expiration_time")]
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Bearer token cache. A token counts as usable until `margin` before it
/// expires.
#[derive(Debug, Clone)]
pub struct TokenCache {
    token: Option<CachedToken>,
    margin: chrono::Duration,
}

impl TokenCache {
    pub fn new(margin_secs: i64) -> Self {
        Self {
            token: None,
            margin: chrono::Duration::seconds(margin_secs.max(0)),
        }
    }

    pub fn valid_at(&self, now: DateTime<Utc>) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|token| token.expires_at - self.margin > now)
            .map(|token| token.value.as_str())
    }

    pub fn store(&mut self, value: String, expires_at: DateTime<Utc>) {
        self.token = Some(CachedToken { value, expires_at });
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}

pub struct RecordClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    email: Option<String>,
    third_party_id: Option<String>,
    cache: Mutex<TokenCache>,
}

impl RecordClient {
    pub fn new(settings: &RecordSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()),
            email: settings.email.clone(),
            third_party_id: settings.third_party_id.clone(),
            cache: Mutex::new(TokenCache::new(settings.refresh_margin_secs)),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn url(&self, path: &str) -> Result<String, AgentError> {
        if !self.is_configured() {
            return Err(AgentError::ExternalService(
                "record API base URL is not configured".to_string(),
            ));
        }
        Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    async fn bearer_token(&self) -> Result<String, AgentError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.valid_at(Utc::now()) {
            return Ok(token.to_string());
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::ExternalService(format!("{API_KEY_ENV} is not set"))
        })?;
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(email) = self.email.as_deref() {
            query.push(("email", email));
        }
        if let Some(id) = self.third_party_id.as_deref() {
            query.push(("third_party_auth_id", id));
        }

        let response = self
            .client
            .get(self.url("jwt")?)
            .header(API_KEY_HEADER, api_key)
            .query(&query)
            .send()
            .await?;
        let reply: TokenReply = check_status(response).await?.json().await?;
        info!("Record API token refreshed, expires {}", reply.expires_at);
        cache.store(reply.token.clone(), reply.expires_at);
        Ok(reply.token)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AgentError> {
        let token = self.bearer_token().await?;
        let response = request.bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // Next call exchanges a fresh token.
            self.cache.lock().await.clear();
        }
        Ok(check_status(response).await?.json().await?)
    }

    pub async fn fetch_profile(&self) -> Result<RecordProfile, AgentError> {
        debug!("fetching record profile");
        self.send_json(self.client.get(self.url("me")?)).await
    }

    pub async fn create_session(&self) -> Result<RecordSession, AgentError> {
        self.send_json(self.client.post(self.url("sessions")?).json(&Map::new()))
            .await
    }

    pub async fn fetch_session(&self, session_id: &str) -> Result<RecordSession, AgentError> {
        let path = format!("sessions/{}", session_path_segment(session_id)?);
        self.send_json(self.client.get(self.url(&path)?)).await
    }

    pub async fn update_session(
        &self,
        session_id: &str,
        changes: &Map<String, Value>,
    ) -> Result<RecordSession, AgentError> {
        let path = format!("sessions/{}", session_path_segment(session_id)?);
        self.send_json(self.client.patch(self.url(&path)?).json(changes))
            .await
    }
}

fn session_path_segment(session_id: &str) -> Result<&str, AgentError> {
    let trimmed = session_id.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(AgentError::NoActiveSession(format!(
            "invalid record session id {session_id:?}"
        )))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AgentError::ExternalService(format!("record API rejected credentials ({status})"))
        }
        StatusCode::NOT_FOUND => AgentError::NoActiveSession(format!("record not found: {snippet}")),
        _ => AgentError::ExternalService(format!("record API returned {status}: {snippet}")),
    })
}
