//! AI referral classification, aggregation, and reporting.
//!
//! Turns GA4 session/page rows into the dashboard summary: per-day series per
//! AI tool, a source breakdown with display colours, and top pages. Also
//! renders that summary as CSV, JSON, Markdown, and embeddable snippets.

pub mod aggregations;
pub mod reports;

pub use aggregations::{aggregate, classify_source, color_for, display_name, ReferralAggregator};
pub use reports::{EmbedKind, ExportFormat, ReportGenerator};
