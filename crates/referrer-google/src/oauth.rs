use chrono::Utc;
use referrer_core::config::GoogleConfig;
use referrer_core::error::{ReferrerError, Result};
use referrer_core::types::AuthTokens;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// OAuth scopes requested from the user.
pub const ANALYTICS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/analytics.readonly",
    "https://www.googleapis.com/auth/analytics",
];

/// Per-request Google credentials taken from the caller's headers.
#[derive(Clone)]
pub struct GoogleCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl GoogleCredentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            // Browsers send an empty header when no refresh token is stored.
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Token endpoint response (success or error shape).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// Lifetime in seconds.
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Google OAuth2 web-server flow client.
pub struct OAuthClient {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl OAuthClient {
    pub fn new(config: GoogleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("ai-referrer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Consent screen URL requesting offline access to Analytics.
    pub fn authorization_url(&self) -> Result<String> {
        if self.config.client_id.is_empty() {
            return Err(ReferrerError::Config(
                "google.client_id is not configured".into(),
            ));
        }

        let mut url = Url::parse(&self.config.auth_base)
            .map_err(|e| ReferrerError::Config(format!("invalid google.auth_base: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", &ANALYTICS_SCOPES.join(" "));
        Ok(url.into())
    }

    /// Exchange an authorization code for access/refresh tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthTokens> {
        let secret = self.client_secret()?;
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let tokens = self.token_request(&params).await?;
        tracing::info!("Exchanged authorization code for Google tokens");
        Ok(tokens)
    }

    /// Mint a new access token from a refresh token. The refresh token itself
    /// is carried over since Google does not rotate it here.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        let secret = self.client_secret()?;
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", "refresh_token"),
        ];
        let mut tokens = self.token_request(&params).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        tracing::debug!("Refreshed Google access token");
        Ok(tokens)
    }

    fn client_secret(&self) -> Result<&str> {
        self.config
            .client_secret
            .as_deref()
            .ok_or_else(|| ReferrerError::Config("google.client_secret is not configured".into()))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<AuthTokens> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await?;
        let status = resp.status();
        let body: TokenResponse = resp.json().await?;
        tokens_from_response(status.as_u16(), body)
    }
}

fn tokens_from_response(status: u16, body: TokenResponse) -> Result<AuthTokens> {
    if let Some(error) = body.error {
        let detail = body.error_description.unwrap_or_default();
        return Err(ReferrerError::OAuth(format!("{} ({}): {}", error, status, detail)));
    }

    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ReferrerError::OAuth("Failed to obtain tokens from Google".into()))?;

    let expiry_date = body
        .expires_in
        .map(|secs| Utc::now().timestamp_millis() + secs * 1000);

    Ok(AuthTokens {
        access_token,
        refresh_token: body.refresh_token,
        expiry_date,
    })
}
