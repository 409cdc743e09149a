use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReferrerError, Result};

/// Canonical label for an AI assistant (or other tracked referrer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiTool {
    ChatGpt,
    Perplexity,
    Bard,
    Claude,
    Copilot,
    You,
    Google,
    LinkedIn,
    Other,
}

impl AiTool {
    pub const ALL: [AiTool; 9] = [
        AiTool::ChatGpt,
        AiTool::Perplexity,
        AiTool::Bard,
        AiTool::Claude,
        AiTool::Copilot,
        AiTool::You,
        AiTool::Google,
        AiTool::LinkedIn,
        AiTool::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiTool::ChatGpt => "chatgpt",
            AiTool::Perplexity => "perplexity",
            AiTool::Bard => "bard",
            AiTool::Claude => "claude",
            AiTool::Copilot => "copilot",
            AiTool::You => "you",
            AiTool::Google => "google",
            AiTool::LinkedIn => "linkedin",
            AiTool::Other => "other",
        }
    }
}

impl std::fmt::Display for AiTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `sessionSource x date` row from the referral report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub source_domain: String,
    pub date: NaiveDate,
    pub session_count: u64,
}

impl SessionRow {
    pub fn new(source_domain: impl Into<String>, date: NaiveDate, session_count: u64) -> Self {
        Self {
            source_domain: source_domain.into(),
            date,
            session_count,
        }
    }

    /// Build a row from GA4's string cells (`date` as `YYYYMMDD`).
    pub fn parse(source_domain: &str, date: &str, session_count: &str) -> Result<Self> {
        let parsed_date = NaiveDate::parse_from_str(date, "%Y%m%d")
            .map_err(|e| ReferrerError::Decode(format!("invalid date '{}': {}", date, e)))?;
        let count = session_count.trim().parse::<u64>().map_err(|e| {
            ReferrerError::Decode(format!("invalid session count '{}': {}", session_count, e))
        })?;
        Ok(Self::new(source_domain, parsed_date, count))
    }
}

/// One `pagePath` row from the top pages report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRow {
    pub page_path: String,
    pub session_count: u64,
    /// Fraction in 0.0..=1.0.
    pub bounce_rate: f64,
}

impl PageRow {
    pub fn new(page_path: impl Into<String>, session_count: u64, bounce_rate: f64) -> Self {
        Self {
            page_path: page_path.into(),
            session_count,
            bounce_rate,
        }
    }

    pub fn parse(page_path: &str, session_count: &str, bounce_rate: &str) -> Result<Self> {
        let count = session_count.trim().parse::<u64>().map_err(|e| {
            ReferrerError::Decode(format!("invalid session count '{}': {}", session_count, e))
        })?;
        let rate = bounce_rate.trim().parse::<f64>().map_err(|e| {
            ReferrerError::Decode(format!("invalid bounce rate '{}': {}", bounce_rate, e))
        })?;
        Ok(Self::new(page_path, count, rate))
    }
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Sessions per tool for a single calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub chatgpt: u64,
    pub perplexity: u64,
    pub bard: u64,
    pub claude: u64,
    pub copilot: u64,
    pub you: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub google: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub linkedin: u64,
    pub other: u64,
}

impl DailyAggregate {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            chatgpt: 0,
            perplexity: 0,
            bard: 0,
            claude: 0,
            copilot: 0,
            you: 0,
            google: 0,
            linkedin: 0,
            other: 0,
        }
    }

    pub fn add(&mut self, tool: AiTool, sessions: u64) {
        *self.slot_mut(tool) += sessions;
    }

    pub fn get(&self, tool: AiTool) -> u64 {
        match tool {
            AiTool::ChatGpt => self.chatgpt,
            AiTool::Perplexity => self.perplexity,
            AiTool::Bard => self.bard,
            AiTool::Claude => self.claude,
            AiTool::Copilot => self.copilot,
            AiTool::You => self.you,
            AiTool::Google => self.google,
            AiTool::LinkedIn => self.linkedin,
            AiTool::Other => self.other,
        }
    }

    /// Sum across every tool counter.
    pub fn total(&self) -> u64 {
        AiTool::ALL.iter().map(|t| self.get(*t)).sum()
    }

    fn slot_mut(&mut self, tool: AiTool) -> &mut u64 {
        match tool {
            AiTool::ChatGpt => &mut self.chatgpt,
            AiTool::Perplexity => &mut self.perplexity,
            AiTool::Bard => &mut self.bard,
            AiTool::Claude => &mut self.claude,
            AiTool::Copilot => &mut self.copilot,
            AiTool::You => &mut self.you,
            AiTool::Google => &mut self.google,
            AiTool::LinkedIn => &mut self.linkedin,
            AiTool::Other => &mut self.other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub name: String,
    pub value: u64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPage {
    pub page: String,
    pub sessions: u64,
    pub bounce_rate: f64,
}

/// Normalized AI referral summary returned to dashboard clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_sessions: u64,
    pub daily_data: Vec<DailyAggregate>,
    pub source_breakdown: Vec<SourceBreakdown>,
    pub top_pages: Vec<TopPage>,
    /// Distinct raw `sessionSource` values, in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_sources: Vec<String>,
}

impl AnalyticsData {
    /// The all-zero result served when the upstream query fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_sessions == 0
            && self.daily_data.is_empty()
            && self.source_breakdown.is_empty()
            && self.top_pages.is_empty()
    }
}

/// OAuth tokens handed to the browser after the Google consent flow.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

// Tokens must never end up in logs.
impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

impl AuthTokens {
    /// Tokens without an expiry never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date {
            Some(expiry) => now.timestamp_millis() >= expiry,
            None => false,
        }
    }

    /// Base64-encoded JSON, as carried in the dashboard redirect.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ReferrerError::Decode(format!("invalid token encoding: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
