//! Google OAuth2 and Analytics Data API (GA4) access.
//!
//! The [`GoogleAnalyticsService`] ties the pieces together: it runs the AI
//! referral and top pages reports, decodes them into typed rows, aggregates,
//! and caches the result per property and date range.

pub mod cache;
pub mod data_api;
pub mod oauth;
pub mod service;

pub use cache::TtlCache;
pub use data_api::{DataApiClient, ReportSource, RunReportRequest, RunReportResponse};
pub use oauth::{GoogleCredentials, OAuthClient};
pub use service::{AnalyticsBackend, GoogleAnalyticsService};
