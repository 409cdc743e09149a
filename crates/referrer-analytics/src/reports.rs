//! Export and presentation of an [`AnalyticsData`] summary.
//!
//! CSV and JSON downloads, a markdown summary, and the embed snippets
//! (iframe widget and client-side tracking script).

use crate::aggregations::SOURCE_PATTERNS;
use chrono::NaiveDate;
use referrer_core::error::{ReferrerError, Result};
use referrer_core::types::{AiTool, AnalyticsData};
use serde::{Deserialize, Serialize};

/// Download format for an exported summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ReferrerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ReferrerError::Validation(format!(
                "unknown export format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// Which embed snippet to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    Widget,
    Script,
}

/// CSV columns after `Date`. Google and LinkedIn fold into the last column
/// so each row still sums to that day's sessions.
const CSV_COLUMNS: &[(&str, &[AiTool])] = &[
    ("ChatGPT", &[AiTool::ChatGpt]),
    ("Perplexity", &[AiTool::Perplexity]),
    ("Google Bard", &[AiTool::Bard]),
    ("Claude", &[AiTool::Claude]),
    ("Microsoft Copilot", &[AiTool::Copilot]),
    ("You.com", &[AiTool::You]),
    (
        "Other AI Tools",
        &[AiTool::Google, AiTool::LinkedIn, AiTool::Other],
    ),
];

/// Report generator for exports and embeds.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Render in the requested format.
    pub fn export(data: &AnalyticsData, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => Self::to_csv(data),
            ExportFormat::Json => Self::to_json(data),
        }
    }

    /// One row per day.
    pub fn to_csv(data: &AnalyticsData) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["Date"];
        header.extend(CSV_COLUMNS.iter().map(|(name, _)| *name));
        writer.write_record(&header).map_err(csv_error)?;

        for day in &data.daily_data {
            let mut record = vec![day.date.format("%Y-%m-%d").to_string()];
            for (_, tools) in CSV_COLUMNS {
                let count: u64 = tools.iter().map(|t| day.get(*t)).sum();
                record.push(count.to_string());
            }
            writer.write_record(&record).map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ReferrerError::Other(anyhow::anyhow!("csv flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| ReferrerError::Decode(e.to_string()))
    }

    /// Pretty-printed JSON in the API's camelCase shape.
    pub fn to_json(data: &AnalyticsData) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Suggested download name, e.g. `ai-referrals-2024-03-01.csv`.
    pub fn default_filename(format: ExportFormat, date: NaiveDate) -> String {
        format!("ai-referrals-{}.{}", date.format("%Y-%m-%d"), format.extension())
    }

    /// Markdown summary for terminals and docs.
    pub fn markdown_summary(data: &AnalyticsData) -> String {
        let mut report = String::new();

        report.push_str("# AI Referral Report\n\n");

        if let (Some(first), Some(last)) = (data.daily_data.first(), data.daily_data.last()) {
            report.push_str(&format!(
                "**{} - {}**\n\n",
                first.date.format("%B %d, %Y"),
                last.date.format("%B %d, %Y")
            ));
        }

        report.push_str("## Overview\n\n");
        report.push_str(&format!("- **Total Sessions:** {}\n", data.total_sessions));
        report.push_str(&format!("- **Active Days:** {}\n", data.daily_data.len()));
        if !data.daily_data.is_empty() {
            report.push_str(&format!(
                "- **Avg Daily Sessions:** {:.1}\n",
                data.total_sessions as f64 / data.daily_data.len() as f64
            ));
        }
        report.push('\n');

        if !data.source_breakdown.is_empty() {
            report.push_str("## Sources\n\n");
            report.push_str("| Source | Sessions | Share |\n");
            report.push_str("|--------|----------|-------|\n");
            for entry in &data.source_breakdown {
                report.push_str(&format!(
                    "| {} | {} | {:.1}% |\n",
                    entry.name,
                    entry.value,
                    percentage(entry.value, data.total_sessions)
                ));
            }
            report.push('\n');
        }

        if !data.top_pages.is_empty() {
            report.push_str("## Top Pages\n\n");
            report.push_str("| Page | Sessions | Bounce Rate |\n");
            report.push_str("|------|----------|-------------|\n");
            for page in &data.top_pages {
                report.push_str(&format!(
                    "| {} | {} | {:.1}% |\n",
                    page.page,
                    page.sessions,
                    page.bounce_rate * 100.0
                ));
            }
            report.push('\n');
        }

        if data.is_empty() {
            report.push_str("No AI referral traffic in this period.\n");
        }

        report
    }

    /// HTML snippet for embedding the dashboard or tracking AI referrals.
    pub fn embed_snippet(kind: EmbedKind, origin: &str, measurement_id: &str) -> String {
        match kind {
            EmbedKind::Widget => Self::widget_snippet(origin, measurement_id),
            EmbedKind::Script => Self::tracking_script(),
        }
    }

    fn widget_snippet(origin: &str, measurement_id: &str) -> String {
        format!(
            "<iframe\n  src=\"{}/embed?id={}\"\n  width=\"100%\"\n  height=\"400\"\n  frameborder=\"0\">\n</iframe>",
            origin.trim_end_matches('/'),
            measurement_id
        )
    }

    /// Client script that reports AI referrers to GA4 via `gtag`.
    fn tracking_script() -> String {
        let sources = tracked_referrer_domains()
            .iter()
            .map(|d| format!("    '{}'", d))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            r#"<!-- AI Referral Tracking Script -->
<script>
(function() {{
  const aiSources = [
{}
  ];

  if (document.referrer) {{
    const referrerDomain = new URL(document.referrer).hostname;
    const isAIReferral = aiSources.some(source => referrerDomain.includes(source));

    if (isAIReferral && typeof gtag !== 'undefined') {{
      gtag('event', 'ai_referral_detected', {{
        'ai_source': referrerDomain,
        'page_location': window.location.href
      }});
    }}
  }}
}})();
</script>"#,
            sources
        )
    }
}

/// AI assistant domains worth reporting from the browser. Generic search and
/// social referrers are left to GA4's own source reporting.
fn tracked_referrer_domains() -> Vec<&'static str> {
    SOURCE_PATTERNS
        .iter()
        .filter(|(_, tool)| !matches!(tool, AiTool::Google | AiTool::LinkedIn))
        .map(|(pattern, _)| *pattern)
        .collect()
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn csv_error(e: csv::Error) -> ReferrerError {
    ReferrerError::Other(anyhow::anyhow!("csv write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregations::aggregate;
    use referrer_core::types::{PageRow, SessionRow};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> AnalyticsData {
        aggregate(
            &[
                SessionRow::new("chat.openai.com", day(2024, 3, 1), 5),
                SessionRow::new("claude.ai", day(2024, 3, 1), 2),
                SessionRow::new("linkedin.com", day(2024, 3, 2), 3),
            ],
            &[PageRow::new("/guide", 7, 0.25)],
        )
    }

    #[test]
    fn test_csv_export() {
        let csv = ReportGenerator::to_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Date,ChatGPT,Perplexity,Google Bard,Claude,Microsoft Copilot,You.com,Other AI Tools"
        );
        assert_eq!(lines[1], "2024-03-01,5,0,0,2,0,0,0");
        // LinkedIn sessions land in the Other column.
        assert_eq!(lines[2], "2024-03-02,0,0,0,0,0,0,3");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_csv_export_empty() {
        let csv = ReportGenerator::to_csv(&AnalyticsData::empty()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_json_export_parses_back() {
        let data = sample();
        let json = ReportGenerator::export(&data, ExportFormat::Json).unwrap();
        let parsed: AnalyticsData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
    }

    #[test]
    fn test_default_filename() {
        assert_eq!(
            ReportGenerator::default_filename(ExportFormat::Csv, day(2024, 3, 1)),
            "ai-referrals-2024-03-01.csv"
        );
        assert_eq!(
            ReportGenerator::default_filename(ExportFormat::Json, day(2024, 12, 31)),
            "ai-referrals-2024-12-31.json"
        );
    }

    #[test]
    fn test_markdown_summary_structure() {
        let report = ReportGenerator::markdown_summary(&sample());
        assert!(report.contains("# AI Referral Report"));
        assert!(report.contains("**March 01, 2024 - March 02, 2024**"));
        assert!(report.contains("- **Total Sessions:** 10"));
        assert!(report.contains("| ChatGPT | 5 | 50.0% |"));
        assert!(report.contains("| /guide | 7 | 25.0% |"));
        assert!(!report.contains("No AI referral traffic"));
    }

    #[test]
    fn test_markdown_summary_empty() {
        let report = ReportGenerator::markdown_summary(&AnalyticsData::empty());
        assert!(report.contains("- **Total Sessions:** 0"));
        assert!(report.contains("No AI referral traffic"));
        assert!(!report.contains("## Sources"));
    }

    #[test]
    fn test_widget_snippet() {
        let html =
            ReportGenerator::embed_snippet(EmbedKind::Widget, "https://dash.example.com/", "G-ABC123");
        assert!(html.contains("src=\"https://dash.example.com/embed?id=G-ABC123\""));
        assert!(html.contains("height=\"400\""));
        assert!(html.starts_with("<iframe"));
    }

    #[test]
    fn test_tracking_script() {
        let js = ReportGenerator::embed_snippet(EmbedKind::Script, "", "G-ABC123");
        assert!(js.contains("'chat.openai.com'"));
        assert!(js.contains("'claude.ai'"));
        assert!(js.contains("'perplexity.ai'"));
        assert!(!js.contains("'linkedin.com'"));
        assert!(js.contains("gtag('event', 'ai_referral_detected'"));
    }
}
