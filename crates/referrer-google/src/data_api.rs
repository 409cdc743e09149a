//! GA4 Data API `runReport` requests and response decoding.

use async_trait::async_trait;
use referrer_analytics::aggregations::SOURCE_PATTERNS;
use referrer_core::config::GoogleConfig;
use referrer_core::error::{ReferrerError, Result};
use referrer_core::types::{PageRow, SessionRow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Request bodies ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<DateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter: Option<FilterExpression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterExpression {
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_name: String,
    pub string_filter: StringFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    pub match_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<DimensionOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricOrder>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub desc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionOrder {
    pub dimension_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrder {
    pub metric_name: String,
}

fn dimensions(names: &[&str]) -> Vec<Dimension> {
    names.iter().map(|n| Dimension { name: n.to_string() }).collect()
}

fn metrics(names: &[&str]) -> Vec<Metric> {
    names.iter().map(|n| Metric { name: n.to_string() }).collect()
}

/// `FULL_REGEXP` alternation over every tracked referrer domain.
pub fn ai_source_regex() -> String {
    let alternatives: Vec<String> = SOURCE_PATTERNS
        .iter()
        .map(|(pattern, _)| pattern.replace('.', "\\."))
        .collect();
    format!("({})", alternatives.join("|"))
}

fn ai_source_filter() -> FilterExpression {
    FilterExpression {
        filter: Filter {
            field_name: "sessionSource".into(),
            string_filter: StringFilter {
                match_type: "FULL_REGEXP".into(),
                value: ai_source_regex(),
            },
        },
    }
}

impl RunReportRequest {
    /// Sessions per `sessionSource` per `date`, oldest first.
    pub fn ai_referrals(start_date: &str, end_date: &str) -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date: start_date.into(),
                end_date: end_date.into(),
            }],
            dimensions: dimensions(&["sessionSource", "date"]),
            metrics: metrics(&["sessions", "bounceRate", "averageSessionDuration"]),
            dimension_filter: Some(ai_source_filter()),
            order_bys: vec![OrderBy {
                dimension: Some(DimensionOrder {
                    dimension_name: "date".into(),
                }),
                metric: None,
                desc: false,
            }],
            limit: None,
        }
    }

    /// Landing pages for AI referrals, busiest first.
    pub fn top_pages(start_date: &str, end_date: &str, limit: u32) -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date: start_date.into(),
                end_date: end_date.into(),
            }],
            dimensions: dimensions(&["pagePath"]),
            metrics: metrics(&["sessions", "bounceRate"]),
            dimension_filter: Some(ai_source_filter()),
            order_bys: vec![OrderBy {
                dimension: None,
                metric: Some(MetricOrder {
                    metric_name: "sessions".into(),
                }),
                desc: true,
            }],
            limit: Some(limit),
        }
    }

    /// Smallest possible report; succeeds only if the caller can read the property.
    pub fn access_probe() -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date: "7daysAgo".into(),
                end_date: "today".into(),
            }],
            dimensions: Vec::new(),
            metrics: metrics(&["sessions"]),
            dimension_filter: None,
            order_bys: Vec::new(),
            limit: Some(1),
        }
    }
}

// ── Responses ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    /// Absent when the report matched nothing.
    #[serde(default)]
    pub rows: Option<Vec<ReportRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<CellValue>,
    #[serde(default)]
    pub metric_values: Vec<CellValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub value: String,
}

impl ReportRow {
    fn dimension(&self, idx: usize) -> Result<&str> {
        self.dimension_values
            .get(idx)
            .map(|c| c.value.as_str())
            .ok_or_else(|| ReferrerError::Decode(format!("row is missing dimension {}", idx)))
    }

    fn metric(&self, idx: usize) -> Result<&str> {
        self.metric_values
            .get(idx)
            .map(|c| c.value.as_str())
            .ok_or_else(|| ReferrerError::Decode(format!("row is missing metric {}", idx)))
    }
}

impl RunReportResponse {
    fn rows(&self) -> &[ReportRow] {
        self.rows.as_deref().unwrap_or(&[])
    }

    /// Decode an [`RunReportRequest::ai_referrals`] response.
    pub fn session_rows(&self) -> Result<Vec<SessionRow>> {
        self.rows()
            .iter()
            .map(|row| SessionRow::parse(row.dimension(0)?, row.dimension(1)?, row.metric(0)?))
            .collect()
    }

    /// Decode a [`RunReportRequest::top_pages`] response.
    pub fn page_rows(&self) -> Result<Vec<PageRow>> {
        self.rows()
            .iter()
            .map(|row| PageRow::parse(row.dimension(0)?, row.metric(0)?, row.metric(1)?))
            .collect()
    }
}

/// Google's JSON error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn api_error(status: u16, body: &str) -> ReferrerError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(code) => format!("{}: {}", code, parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.chars().take(200).collect(),
    };
    ReferrerError::GoogleApi { status, message }
}

// ── Client ──────────────────────────────────────────────────────────────

/// Anything that can execute a GA4 report for a property.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn run_report(
        &self,
        property_id: &str,
        access_token: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse>;
}

/// HTTP client for `properties/{id}:runReport`.
pub struct DataApiClient {
    client: reqwest::Client,
    api_base: String,
}

impl DataApiClient {
    pub fn new(config: &GoogleConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("ai-referrer/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: config.data_api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn report_url(&self, property_id: &str) -> String {
        format!("{}/properties/{}:runReport", self.api_base, property_id)
    }
}

#[async_trait]
impl ReportSource for DataApiClient {
    async fn run_report(
        &self,
        property_id: &str,
        access_token: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse> {
        let url = self.report_url(property_id);
        tracing::debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(resp.json().await?)
    }
}
