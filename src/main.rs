use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use referrer_analytics::{aggregate, EmbedKind, ExportFormat, ReportGenerator};
use referrer_core::config::AppConfig;
use referrer_core::types::AnalyticsData;
use referrer_google::RunReportResponse;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ai-referrer",
    about = "Track website traffic referred by AI assistants via Google Analytics 4",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/ai-referrer/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server (default)
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Summarize saved GA4 report responses
    Report {
        /// JSON file with `referrals` and optional `topPages` responses
        #[arg(short, long)]
        input: PathBuf,
        /// Print the aggregated JSON instead of markdown
        #[arg(long)]
        json: bool,
    },

    /// Export saved GA4 report responses as CSV or JSON
    Export {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,
        /// Output file (default: ai-referrals-<today>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an embeddable widget or tracking script
    Embed {
        /// GA4 measurement ID, e.g. G-XXXXXXX
        #[arg(long)]
        measurement_id: String,
        #[arg(long, value_enum, default_value_t = KindArg::Widget)]
        kind: KindArg,
        /// Dashboard origin serving the widget (default: configured frontend URL)
        #[arg(long)]
        origin: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Widget,
    Script,
}

impl From<KindArg> for EmbedKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Widget => EmbedKind::Widget,
            KindArg::Script => EmbedKind::Script,
        }
    }
}

/// Raw `runReport` responses saved from the Data API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedReports {
    referrals: RunReportResponse,
    #[serde(default)]
    top_pages: RunReportResponse,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "ai_referrer=info,warn".into()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config; environment overrides apply with or without --config.
    let mut config = AppConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            referrer_server::serve(config).await?;
        }
        None => {
            referrer_server::serve(config).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config)?;
        }
        Some(Commands::Report { input, json }) => {
            let data = load_saved_reports(&input)?;
            if json {
                println!("{}", ReportGenerator::to_json(&data)?);
            } else {
                print!("{}", ReportGenerator::markdown_summary(&data));
            }
        }
        Some(Commands::Export { input, format, output }) => {
            let data = load_saved_reports(&input)?;
            let format = ExportFormat::from(format);
            let path = output.unwrap_or_else(|| {
                PathBuf::from(ReportGenerator::default_filename(
                    format,
                    chrono::Local::now().date_naive(),
                ))
            });
            let rendered = ReportGenerator::export(&data, format)?;
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} days to {}", data.daily_data.len(), path.display());
        }
        Some(Commands::Embed {
            measurement_id,
            kind,
            origin,
        }) => {
            let origin = origin.unwrap_or_else(|| config.server.frontend_url.clone());
            println!(
                "{}",
                ReportGenerator::embed_snippet(kind.into(), &origin, &measurement_id)
            );
        }
    }

    Ok(())
}

/// Decode and aggregate a saved-reports file.
fn load_saved_reports(path: &Path) -> Result<AnalyticsData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let saved: SavedReports = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let sessions = saved.referrals.session_rows()?;
    let pages = saved.top_pages.page_rows()?;
    tracing::info!(
        "Loaded {} referral rows and {} page rows from {}",
        sessions.len(),
        pages.len(),
        path.display()
    );
    Ok(aggregate(&sessions, &pages))
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            if config.google.client_secret.is_some() {
                println!("# google.client_secret is set (hidden)");
            }
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}
