pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::ReferrerError;
pub use types::{
    AiTool, AnalyticsData, AuthTokens, DailyAggregate, PageRow, SessionRow, SourceBreakdown, TopPage,
};
