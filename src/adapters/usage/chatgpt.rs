//! ChatGPT account usage adapter.
//!
//! Reads the agent CLI's credential file and queries
//! `{base_url}/backend-api/wham/usage` for the account's rolling five-hour and
//! weekly windows. Transient failures (network errors, 429, 5xx) are retried
//! with exponential backoff; anything else fails the check immediately.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{UsageConfig, UsageReport};
use crate::domain::ports::{UsageRequest, UsageSource};

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("cannot read auth file {path}: {source}")]
    AuthFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("auth file {path} is not valid: {reason}")]
    AuthFormat { path: PathBuf, reason: String },
    #[error("auth file {0} has no access token")]
    MissingToken(PathBuf),
    #[error("invalid proxy {proxy}: {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("usage request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("usage endpoint returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("cannot parse usage response: {0}")]
    Decode(String),
}

impl From<UsageError> for DomainError {
    fn from(err: UsageError) -> Self {
        DomainError::UsageCheckFailed(err.to_string())
    }
}

/// Credentials written by the agent CLI login flow.
#[derive(Debug, Deserialize)]
struct AuthFile {
    tokens: Option<AuthTokens>,
}

#[derive(Debug, Deserialize)]
struct AuthTokens {
    access_token: Option<String>,
    account_id: Option<String>,
}

#[derive(Debug)]
struct Credentials {
    access_token: String,
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    email: Option<String>,
    rate_limit: Option<RateLimit>,
}

#[derive(Debug, Deserialize)]
struct RateLimit {
    #[serde(default = "default_allowed")]
    allowed: bool,
    #[serde(default)]
    limit_reached: bool,
    primary_window: Option<UsageWindow>,
    secondary_window: Option<UsageWindow>,
}

const fn default_allowed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct UsageWindow {
    used_percent: f64,
    reset_after_seconds: Option<i64>,
    /// Unix seconds
    reset_at: Option<i64>,
}

impl UsageWindow {
    fn resets_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.reset_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.reset_after_seconds.map(|secs| now + ChronoDuration::seconds(secs)))
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |home| home.join(rest)),
        None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

fn read_credentials(path: &Path) -> Result<Credentials, UsageError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| UsageError::AuthFile { path: path.to_path_buf(), source })?;
    let parsed: AuthFile = serde_json::from_str(&raw)
        .map_err(|e| UsageError::AuthFormat { path: path.to_path_buf(), reason: e.to_string() })?;

    let tokens = parsed.tokens.ok_or_else(|| UsageError::MissingToken(path.to_path_buf()))?;
    let access_token = tokens
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| UsageError::MissingToken(path.to_path_buf()))?;

    Ok(Credentials { access_token, account_id: tokens.account_id })
}

fn into_report(response: UsageResponse, account_id: Option<String>) -> Result<UsageReport, UsageError> {
    let rate_limit = response
        .rate_limit
        .ok_or_else(|| UsageError::Decode("response has no rate_limit section".to_string()))?;
    let now = Utc::now();

    let allowed = rate_limit.allowed && !rate_limit.limit_reached;
    Ok(UsageReport {
        allowed,
        account: response.email.or(account_id),
        five_hour_used_percent: rate_limit.primary_window.as_ref().map(|w| w.used_percent),
        weekly_used_percent: rate_limit.secondary_window.as_ref().map(|w| w.used_percent),
        five_hour_resets_at: rate_limit.primary_window.as_ref().and_then(|w| w.resets_at(now)),
        weekly_resets_at: rate_limit.secondary_window.as_ref().and_then(|w| w.resets_at(now)),
        per_model: Vec::new(),
        error: (!allowed).then(|| "usage limit reached".to_string()),
        checked_at: now,
    })
}

/// Usage source backed by the ChatGPT backend API.
pub struct ChatGptUsageSource {
    base_url: String,
    timeout: Duration,
    max_retry_elapsed: Duration,
}

impl ChatGptUsageSource {
    pub fn new(config: &UsageConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retry_elapsed: Duration::from_secs(config.request_timeout_secs.saturating_mul(2)),
        }
    }

    fn client(&self, proxy: Option<&str>) -> Result<reqwest::Client, UsageError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
            let proxy_cfg = reqwest::Proxy::all(proxy)
                .map_err(|source| UsageError::Proxy { proxy: proxy.to_string(), source })?;
            builder = builder.proxy(proxy_cfg);
        }
        Ok(builder.build()?)
    }

    async fn request_once(
        &self,
        client: &reqwest::Client,
        credentials: &Credentials,
    ) -> Result<UsageResponse, backoff::Error<UsageError>> {
        let url = format!("{}/backend-api/wham/usage", self.base_url);

        let mut request = client
            .get(&url)
            .header("Authorization", format!("Bearer {}", credentials.access_token))
            .header("Accept", "application/json");
        if let Some(account_id) = &credentials.account_id {
            request = request.header("ChatGPT-Account-Id", account_id);
        }

        let response = request.send().await.map_err(|e| backoff::Error::transient(UsageError::Http(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            let err = UsageError::Status { status, body };
            return if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        response
            .json::<UsageResponse>()
            .await
            .map_err(|e| backoff::Error::permanent(UsageError::Decode(e.to_string())))
    }
}

#[async_trait]
impl UsageSource for ChatGptUsageSource {
    #[tracing::instrument(skip(self, request), fields(auth_file = %request.auth_file.display()))]
    async fn fetch(&self, request: &UsageRequest) -> DomainResult<UsageReport> {
        let credentials = read_credentials(&request.auth_file)?;
        let client = self.client(request.proxy.as_deref())?;

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(self.max_retry_elapsed))
            .build();

        let response = backoff::future::retry(policy, || self.request_once(&client, &credentials)).await?;
        let report = into_report(response, credentials.account_id.clone())?;

        tracing::debug!(
            allowed = report.allowed,
            five_hour = ?report.five_hour_used_percent,
            weekly = ?report.weekly_used_percent,
            "usage fetched"
        );
        Ok(report)
    }
}
