//! Referral classification and per-day/per-tool aggregation.
//!
//! Maps raw GA4 `sessionSource` strings onto canonical AI tools, buckets
//! sessions by calendar date, and derives the source breakdown and top pages.

use chrono::NaiveDate;
use referrer_core::types::{
    AiTool, AnalyticsData, DailyAggregate, PageRow, SessionRow, SourceBreakdown, TopPage,
};
use std::collections::BTreeMap;

/// Ordered (pattern, tool) pairs. First substring match wins, so more
/// specific domains must precede the broader ones they contain.
pub const SOURCE_PATTERNS: &[(&str, AiTool)] = &[
    ("chatgpt.com", AiTool::ChatGpt),
    ("chat.openai.com", AiTool::ChatGpt),
    ("openai.com", AiTool::ChatGpt),
    ("perplexity.ai", AiTool::Perplexity),
    ("bard.google.com", AiTool::Bard),
    ("claude.ai", AiTool::Claude),
    ("copilot.microsoft.com", AiTool::Copilot),
    ("you.com", AiTool::You),
    ("google.com", AiTool::Google),
    ("linkedin.com", AiTool::LinkedIn),
];

pub const OTHER_DISPLAY_NAME: &str = "Other AI Tools";
pub const NEUTRAL_COLOR: &str = "#6B7280";

/// Display name -> chart colour.
const COLOR_PALETTE: &[(&str, &str)] = &[
    ("ChatGPT", "#10B981"),
    ("Perplexity", "#3B82F6"),
    ("Google Bard", "#F59E0B"),
    ("Claude", "#F97316"),
    ("Microsoft Copilot", "#06B6D4"),
    ("You.com", "#8B5CF6"),
    ("Google", "#4285F4"),
    ("LinkedIn", "#0077B5"),
    (OTHER_DISPLAY_NAME, NEUTRAL_COLOR),
];

/// Classify a raw session source. Case-insensitive substring containment.
pub fn classify_source(source: &str) -> AiTool {
    let lower = source.to_lowercase();
    SOURCE_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, tool)| *tool)
        .unwrap_or(AiTool::Other)
}

/// Human label used as the breakdown key. Google and LinkedIn fold into
/// "Other AI Tools".
pub fn display_name(tool: AiTool) -> &'static str {
    match tool {
        AiTool::ChatGpt => "ChatGPT",
        AiTool::Perplexity => "Perplexity",
        AiTool::Bard => "Google Bard",
        AiTool::Claude => "Claude",
        AiTool::Copilot => "Microsoft Copilot",
        AiTool::You => "You.com",
        AiTool::Google | AiTool::LinkedIn | AiTool::Other => OTHER_DISPLAY_NAME,
    }
}

/// Colour for a display name; unknown names get the neutral grey.
pub fn color_for(display_name: &str) -> &'static str {
    COLOR_PALETTE
        .iter()
        .find(|(name, _)| *name == display_name)
        .map(|(_, color)| *color)
        .unwrap_or(NEUTRAL_COLOR)
}

/// Incremental aggregation engine for one report response.
#[derive(Debug, Default)]
pub struct ReferralAggregator {
    total_sessions: u64,
    /// Daily buckets, iterated in ascending date order.
    daily: BTreeMap<NaiveDate, DailyAggregate>,
    /// Breakdown totals in first-encounter order.
    breakdown: Vec<(&'static str, u64)>,
    top_pages: Vec<TopPage>,
    raw_sources: Vec<String>,
}

impl ReferralAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one session row into the totals, its day, and its breakdown bucket.
    pub fn process_session_row(&mut self, row: &SessionRow) {
        if !self.raw_sources.iter().any(|s| s == &row.source_domain) {
            self.raw_sources.push(row.source_domain.clone());
        }

        let tool = classify_source(&row.source_domain);
        self.total_sessions += row.session_count;

        self.daily
            .entry(row.date)
            .or_insert_with(|| DailyAggregate::new(row.date))
            .add(tool, row.session_count);

        let name = display_name(tool);
        match self.breakdown.iter_mut().find(|(n, _)| *n == name) {
            Some((_, value)) => *value += row.session_count,
            None => self.breakdown.push((name, row.session_count)),
        }
    }

    /// Copy a page row verbatim; callers pre-sort and truncate.
    pub fn process_page_row(&mut self, row: &PageRow) {
        self.top_pages.push(TopPage {
            page: row.page_path.clone(),
            sessions: row.session_count,
            bounce_rate: row.bounce_rate,
        });
    }

    pub fn total_sessions(&self) -> u64 {
        self.total_sessions
    }

    pub fn active_days(&self) -> usize {
        self.daily.len()
    }

    /// Consume the engine and produce the dashboard summary.
    pub fn finish(self) -> AnalyticsData {
        let source_breakdown = self
            .breakdown
            .into_iter()
            .map(|(name, value)| SourceBreakdown {
                name: name.to_string(),
                value,
                color: color_for(name).to_string(),
            })
            .collect();

        AnalyticsData {
            total_sessions: self.total_sessions,
            daily_data: self.daily.into_values().collect(),
            source_breakdown,
            top_pages: self.top_pages,
            raw_sources: self.raw_sources,
        }
    }
}

/// Aggregate both report row sets in one pass.
pub fn aggregate(session_rows: &[SessionRow], page_rows: &[PageRow]) -> AnalyticsData {
    let mut aggregator = ReferralAggregator::new();
    for row in session_rows {
        aggregator.process_session_row(row);
    }
    for row in page_rows {
        aggregator.process_page_row(row);
    }
    tracing::debug!(
        "Aggregated {} session rows over {} days ({} sessions), {} pages",
        session_rows.len(),
        aggregator.active_days(),
        aggregator.total_sessions(),
        page_rows.len(),
    );
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(source: &str, date: NaiveDate, count: u64) -> SessionRow {
        SessionRow::new(source, date, count)
    }

    fn sample_rows() -> Vec<SessionRow> {
        vec![
            session("chat.openai.com", day(2024, 3, 2), 5),
            session("perplexity.ai", day(2024, 3, 1), 3),
            session("claude.ai", day(2024, 3, 2), 2),
            session("example.org", day(2024, 3, 1), 1),
            session("chatgpt.com", day(2024, 3, 1), 4),
            session("www.google.com", day(2024, 3, 3), 6),
        ]
    }

    #[test]
    fn test_classify_known_domains() {
        assert_eq!(classify_source("chat.openai.com"), AiTool::ChatGpt);
        assert_eq!(classify_source("chatgpt.com"), AiTool::ChatGpt);
        assert_eq!(classify_source("perplexity.ai"), AiTool::Perplexity);
        assert_eq!(classify_source("bard.google.com"), AiTool::Bard);
        assert_eq!(classify_source("claude.ai"), AiTool::Claude);
        assert_eq!(classify_source("copilot.microsoft.com"), AiTool::Copilot);
        assert_eq!(classify_source("you.com"), AiTool::You);
        assert_eq!(classify_source("google.com"), AiTool::Google);
        assert_eq!(classify_source("linkedin.com"), AiTool::LinkedIn);
    }

    #[test]
    fn test_classify_is_case_insensitive_substring() {
        assert_eq!(classify_source("Chat.OpenAI.com"), AiTool::ChatGpt);
        assert_eq!(classify_source("www.perplexity.ai"), AiTool::Perplexity);
        // Containment, not host matching.
        assert_eq!(classify_source("notgoogle.com"), AiTool::Google);
    }

    #[test]
    fn test_classify_first_match_wins() {
        // bard.google.com contains google.com but is listed first.
        assert_eq!(classify_source("bard.google.com"), AiTool::Bard);
    }

    #[test]
    fn test_classify_unknown_is_other() {
        assert_eq!(classify_source("example.org"), AiTool::Other);
        assert_eq!(classify_source(""), AiTool::Other);
        assert_eq!(classify_source("(direct)"), AiTool::Other);
    }

    #[test]
    fn test_display_names_and_colors() {
        let chatgpt = display_name(classify_source("chat.openai.com"));
        assert_eq!(chatgpt, "ChatGPT");
        assert_eq!(color_for(chatgpt), "#10B981");

        let other = display_name(classify_source("example.org"));
        assert_eq!(other, "Other AI Tools");
        assert_eq!(color_for(other), "#6B7280");

        assert_eq!(display_name(AiTool::LinkedIn), "Other AI Tools");
        assert_eq!(color_for("Unheard Of"), NEUTRAL_COLOR);
    }

    #[test]
    fn test_empty_input() {
        let data = aggregate(&[], &[]);
        assert_eq!(data, AnalyticsData::empty());
        assert_eq!(data.total_sessions, 0);
    }

    #[test]
    fn test_total_sessions_matches_rows() {
        let rows = sample_rows();
        let data = aggregate(&rows, &[]);
        let expected: u64 = rows.iter().map(|r| r.session_count).sum();
        assert_eq!(data.total_sessions, expected);
    }

    #[test]
    fn test_daily_totals_per_date() {
        let rows = sample_rows();
        let data = aggregate(&rows, &[]);

        for daily in &data.daily_data {
            let expected: u64 = rows
                .iter()
                .filter(|r| r.date == daily.date)
                .map(|r| r.session_count)
                .sum();
            assert_eq!(daily.total(), expected, "date {}", daily.date);
        }

        let march_first = &data.daily_data[0];
        assert_eq!(march_first.chatgpt, 4);
        assert_eq!(march_first.perplexity, 3);
        assert_eq!(march_first.other, 1);
    }

    #[test]
    fn test_daily_data_sorted_ascending() {
        let data = aggregate(&sample_rows(), &[]);
        let dates: Vec<NaiveDate> = data.daily_data.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![day(2024, 3, 1), day(2024, 3, 2), day(2024, 3, 3)]);
    }

    #[test]
    fn test_breakdown_sums_to_total() {
        let data = aggregate(&sample_rows(), &[]);
        let breakdown_total: u64 = data.source_breakdown.iter().map(|b| b.value).sum();
        let daily_total: u64 = data.daily_data.iter().map(|d| d.total()).sum();
        assert_eq!(breakdown_total, data.total_sessions);
        assert_eq!(daily_total, data.total_sessions);
    }

    #[test]
    fn test_breakdown_first_encounter_order() {
        let data = aggregate(&sample_rows(), &[]);
        let names: Vec<&str> = data.source_breakdown.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["ChatGPT", "Perplexity", "Claude", "Other AI Tools"]);

        let chatgpt = &data.source_breakdown[0];
        assert_eq!(chatgpt.value, 9);
        assert_eq!(chatgpt.color, "#10B981");

        // example.org (1) and www.google.com (6) share the Other bucket.
        let other = &data.source_breakdown[3];
        assert_eq!(other.value, 7);
        assert_eq!(other.color, "#6B7280");
    }

    #[test]
    fn test_google_counted_in_daily_series() {
        let data = aggregate(&sample_rows(), &[]);
        let march_third = data.daily_data.last().unwrap();
        assert_eq!(march_third.google, 6);
        assert_eq!(march_third.other, 0);
    }

    #[test]
    fn test_top_pages_preserve_order() {
        let pages = vec![
            PageRow::new("/guide", 30, 0.25),
            PageRow::new("/", 12, 0.6),
            PageRow::new("/pricing", 40, 0.1),
        ];
        let data = aggregate(&[], &pages);
        assert_eq!(data.top_pages.len(), 3);
        for (out, input) in data.top_pages.iter().zip(&pages) {
            assert_eq!(out.page, input.page_path);
            assert_eq!(out.sessions, input.session_count);
            assert_eq!(out.bounce_rate, input.bounce_rate);
        }
        assert_eq!(data.total_sessions, 0);
    }

    #[test]
    fn test_raw_sources_dedup_in_order() {
        let rows = vec![
            session("claude.ai", day(2024, 1, 1), 1),
            session("you.com", day(2024, 1, 1), 1),
            session("claude.ai", day(2024, 1, 2), 1),
        ];
        let data = aggregate(&rows, &[]);
        assert_eq!(data.raw_sources, vec!["claude.ai", "you.com"]);
    }

    #[test]
    fn test_output_field_names() {
        let rows = vec![session("chat.openai.com", day(2024, 5, 9), 2)];
        let pages = vec![PageRow::new("/a", 2, 0.5)];
        let json = serde_json::to_value(aggregate(&rows, &pages)).unwrap();

        assert_eq!(json["totalSessions"], 2);
        assert_eq!(json["dailyData"][0]["date"], "2024-05-09");
        assert_eq!(json["dailyData"][0]["chatgpt"], 2);
        for field in ["perplexity", "bard", "claude", "copilot", "you", "other"] {
            assert_eq!(json["dailyData"][0][field], 0, "field {}", field);
        }
        assert_eq!(json["sourceBreakdown"][0]["name"], "ChatGPT");
        assert_eq!(json["sourceBreakdown"][0]["value"], 2);
        assert_eq!(json["sourceBreakdown"][0]["color"], "#10B981");
        assert_eq!(json["topPages"][0]["page"], "/a");
        assert_eq!(json["topPages"][0]["sessions"], 2);
        assert_eq!(json["topPages"][0]["bounceRate"], 0.5);
    }

    #[test]
    fn test_incremental_engine_matches_aggregate() {
        let rows = sample_rows();
        let mut engine = ReferralAggregator::new();
        for row in &rows {
            engine.process_session_row(row);
        }
        assert_eq!(engine.active_days(), 3);
        assert_eq!(engine.total_sessions(), 21);
        assert_eq!(engine.finish(), aggregate(&rows, &[]));
    }
}
