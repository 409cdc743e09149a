use crate::cache::{report_cache_key, TtlCache};
use crate::data_api::{DataApiClient, ReportSource, RunReportRequest, RunReportResponse};
use crate::oauth::{GoogleCredentials, OAuthClient};
use async_trait::async_trait;
use referrer_analytics::aggregate;
use referrer_core::config::AppConfig;
use referrer_core::error::{ReferrerError, Result};
use referrer_core::types::{AnalyticsData, AuthTokens};
use std::time::Duration;

/// Everything the HTTP layer needs from Google.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    /// Consent screen URL for the OAuth flow.
    fn authorization_url(&self) -> Result<String>;

    async fn exchange_code(&self, code: &str) -> Result<AuthTokens>;

    /// AI referral summary for a property. Upstream failures yield
    /// [`AnalyticsData::empty`] instead of an error.
    async fn ai_referral_data(
        &self,
        credentials: &GoogleCredentials,
        property_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> AnalyticsData;

    /// Whether the credentials can read the property. Failures count as no.
    async fn validate_property_access(
        &self,
        credentials: &GoogleCredentials,
        property_id: &str,
    ) -> bool;
}

/// GA4-backed [`AnalyticsBackend`] with a processed-result cache.
pub struct GoogleAnalyticsService<S = DataApiClient> {
    oauth: OAuthClient,
    source: S,
    cache: TtlCache<AnalyticsData>,
    top_pages_limit: u32,
}

impl GoogleAnalyticsService<DataApiClient> {
    pub fn from_config(config: &AppConfig) -> Self {
        let source = DataApiClient::new(&config.google);
        Self::with_source(config, source)
    }
}

impl<S: ReportSource> GoogleAnalyticsService<S> {
    pub fn with_source(config: &AppConfig, source: S) -> Self {
        Self {
            oauth: OAuthClient::new(config.google.clone()),
            source,
            cache: TtlCache::new(Duration::from_secs(config.cache.ttl_secs)),
            top_pages_limit: config.google.top_pages_limit,
        }
    }

    pub fn cache(&self) -> &TtlCache<AnalyticsData> {
        &self.cache
    }

    /// Run both reports and aggregate them, bypassing the fallback policy.
    pub async fn fetch_ai_referral_data(
        &self,
        credentials: &GoogleCredentials,
        property_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<AnalyticsData> {
        let key = report_cache_key(property_id, start_date, end_date);
        if let Some(cached) = self.cache.get(&key) {
            tracing::info!("Returning cached data for property {}", property_id);
            return Ok(cached);
        }

        tracing::info!("Fetching analytics data for property {}", property_id);

        let referrals = RunReportRequest::ai_referrals(start_date, end_date);
        let pages = RunReportRequest::top_pages(start_date, end_date, self.top_pages_limit);

        // A token refreshed for the first report is reused for the second.
        let mut credentials = credentials.clone();
        let referral_resp = self
            .run_with_refresh(&mut credentials, property_id, &referrals)
            .await?;
        let pages_resp = self
            .run_with_refresh(&mut credentials, property_id, &pages)
            .await?;

        let session_rows = referral_resp.session_rows()?;
        let page_rows = pages_resp.page_rows()?;
        let data = aggregate(&session_rows, &page_rows);

        self.cache.insert(key, data.clone());
        tracing::info!(
            "Processed GA4 data for property {} ({} sessions)",
            property_id,
            data.total_sessions
        );
        Ok(data)
    }

    /// Run a report; on 401 retry once with a refreshed access token.
    ///
    /// After a refresh `credentials` holds the new access token and no
    /// refresh token, so later reports reuse it and never refresh again.
    async fn run_with_refresh(
        &self,
        credentials: &mut GoogleCredentials,
        property_id: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse> {
        match self
            .source
            .run_report(property_id, &credentials.access_token, request)
            .await
        {
            Err(ReferrerError::GoogleApi { status: 401, message }) => {
                let Some(refresh_token) = credentials.refresh_token.take() else {
                    return Err(ReferrerError::GoogleApi {
                        status: 401,
                        message,
                    });
                };
                tracing::debug!("Access token rejected, refreshing");
                let tokens = self.oauth.refresh(&refresh_token).await?;
                credentials.access_token = tokens.access_token;
                self.source
                    .run_report(property_id, &credentials.access_token, request)
                    .await
            }
            other => other,
        }
    }
}

#[async_trait]
impl<S: ReportSource> AnalyticsBackend for GoogleAnalyticsService<S> {
    fn authorization_url(&self) -> Result<String> {
        self.oauth.authorization_url()
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthTokens> {
        self.oauth.exchange_code(code).await
    }

    async fn ai_referral_data(
        &self,
        credentials: &GoogleCredentials,
        property_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> AnalyticsData {
        match self
            .fetch_ai_referral_data(credentials, property_id, start_date, end_date)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error fetching GA4 data for property {}: {}", property_id, e);
                AnalyticsData::empty()
            }
        }
    }

    async fn validate_property_access(
        &self,
        credentials: &GoogleCredentials,
        property_id: &str,
    ) -> bool {
        let probe = RunReportRequest::access_probe();
        let mut credentials = credentials.clone();
        match self.run_with_refresh(&mut credentials, property_id, &probe).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Property access validation failed for {}: {}", property_id, e);
                false
            }
        }
    }
}
