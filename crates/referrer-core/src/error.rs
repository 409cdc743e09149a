use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferrerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Google API error ({status}): {message}")]
    GoogleApi { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ReferrerError {
    /// True when Google rejected a refresh or authorization grant.
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            ReferrerError::OAuth(msg) => msg.contains("invalid_grant"),
            ReferrerError::GoogleApi { message, .. } => message.contains("invalid_grant"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReferrerError>;
