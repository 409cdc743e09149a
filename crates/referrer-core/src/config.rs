use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/ai-referrer/config.toml),
    /// falling back to defaults if the file doesn't exist. Environment
    /// overrides are applied on top either way.
    pub fn load() -> anyhow::Result<Self> {
        Self::resolve(None)
    }

    /// Load from `path` (or the default location when `None`) and apply
    /// environment overrides on top.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::resolve_with(path, |key| std::env::var(key).ok())
    }

    fn resolve_with<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides_from(lookup);
        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ai-referrer")
            .join("config.toml")
    }

    /// Pull deployment secrets and URLs from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_CLIENT_ID") {
            self.google.client_id = v;
        }
        if let Some(v) = lookup("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_REDIRECT_URI") {
            self.google.redirect_uri = v;
        }
        if let Some(v) = lookup("FRONTEND_URL") {
            self.server.frontend_url = v;
        }
        if let Some(v) = lookup("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", v),
            }
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Dashboard origin; OAuth callbacks redirect here.
    pub frontend_url: String,
    /// Enable CORS.
    pub cors: bool,
    /// Origins allowed in addition to `frontend_url`. A `*` matches any
    /// subdomain, e.g. `https://*.vercel.app`.
    pub extra_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Include internal error messages in 500 responses.
    pub expose_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            frontend_url: "http://localhost:3000".into(),
            cors: true,
            extra_origins: vec![
                "http://localhost:3000".into(),
                "https://*.vercel.app".into(),
                "https://*.onrender.com".into(),
            ],
            rate_limit: RateLimitConfig::default(),
            expose_errors: false,
        }
    }
}

impl ServerConfig {
    /// Every origin CORS should accept, deduplicated, frontend first.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.trim_end_matches('/').to_string()];
        for origin in &self.extra_origins {
            let origin = origin.trim_end_matches('/').to_string();
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        origins
    }
}

/// Fixed-window, per-client request limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
    /// Key clients on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only enable behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 15 * 60,
            trust_proxy: false,
        }
    }
}

/// Google OAuth client and Analytics Data API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    /// Never written back out; set it in the file by hand or via
    /// `GOOGLE_CLIENT_SECRET`.
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// OAuth consent screen endpoint.
    pub auth_base: String,
    /// OAuth token exchange endpoint.
    pub token_url: String,
    /// Base URL of the Analytics Data API (v1beta).
    pub data_api_base: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Row limit for the top pages report.
    pub top_pages_limit: u32,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: "http://localhost:3001/api/auth/google/callback".into(),
            auth_base: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            data_api_base: "https://analyticsdata.googleapis.com/v1beta".into(),
            timeout_secs: 30,
            top_pages_limit: 10,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a processed report stays fresh.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("analyticsdata.googleapis.com"));
        assert!(toml_str.contains("localhost"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.cache.ttl_secs, 300);
        assert_eq!(parsed.server.rate_limit.max_requests, 100);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8088\n\n[cache]\nttl_secs = 60\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.google.top_pages_limit, 10);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_save_to_creates_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        AppConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GOOGLE_CLIENT_ID", "client-123"),
            ("GOOGLE_CLIENT_SECRET", "shh"),
            ("FRONTEND_URL", "https://dash.example.com"),
            ("PORT", "5000"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.google.client_id, "client-123");
        assert_eq!(config.google.client_secret.as_deref(), Some("shh"));
        assert_eq!(config.server.frontend_url, "https://dash.example.com");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_explicit_path_still_gets_env_overrides() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8088\n\n[google]\nclient_id = \"from-file\"\n")
            .unwrap();

        let config = AppConfig::resolve_with(Some(&path), |k| match k {
            "GOOGLE_CLIENT_SECRET" => Some("from-env".to_string()),
            "FRONTEND_URL" => Some("https://dash.example.com".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.google.client_id, "from-file");
        assert_eq!(config.google.client_secret.as_deref(), Some("from-env"));
        assert_eq!(config.server.frontend_url, "https://dash.example.com");
    }

    #[test]
    fn test_client_secret_not_serialized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let mut config = AppConfig::default();
        config.google.client_secret = Some("GOCSPX-very-secret".into());

        let shown = toml::to_string_pretty(&config).unwrap();
        assert!(!shown.contains("GOCSPX-very-secret"));

        config.save_to(&path).unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("client_secret"));

        // A hand-written secret is still read.
        std::fs::write(&path, "[google]\nclient_secret = \"manual\"\n").unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.google.client_secret.as_deref(), Some("manual"));
    }

    #[test]
    fn test_trust_proxy_off_by_default() {
        assert!(!AppConfig::default().server.rate_limit.trust_proxy);
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn test_allowed_origins_dedup() {
        let mut server = ServerConfig::default();
        server.frontend_url = "http://localhost:3000/".into();
        server.extra_origins.push("https://app.example.com".into());
        assert_eq!(
            server.allowed_origins(),
            vec![
                "http://localhost:3000",
                "https://*.vercel.app",
                "https://*.onrender.com",
                "https://app.example.com",
            ]
        );
    }
}
