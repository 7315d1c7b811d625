//! homeval CLI: terminal front end for the house-price prediction demo.
//!
//! Collects the prediction form from flags or prompts, keeps the persisted
//! history, and renders analytics as terminal charts.

mod commands;
mod render;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// homeval: house-price predictions with history and analytics
#[derive(Parser, Debug)]
#[command(name = "homeval", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Predict a price and add it to the history. Missing fields are prompted for.
    Predict(PredictArgs),
    /// Inspect or manage the prediction history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show price trend, feature correlation and location charts
    Analytics,
    /// Export a single prediction as JSON or CSV
    Export {
        /// History index to export (most recent if omitted)
        #[arg(short, long)]
        index: Option<usize>,
        /// Output format: json or csv
        #[arg(short, long, default_value = "json")]
        format: homeval_core::ExportFormat,
        /// Output directory (defaults to export.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct PredictArgs {
    /// Number of bedrooms
    #[arg(long)]
    bedrooms: Option<String>,
    /// Number of bathrooms (decimals allowed)
    #[arg(long)]
    bathrooms: Option<String>,
    /// Living area in square feet
    #[arg(long)]
    sqft: Option<String>,
    /// Location code: 0 = Rural, 1 = Suburban, 2 = Urban
    #[arg(long)]
    location: Option<String>,
    /// Age of the property in years
    #[arg(long)]
    age: Option<String>,
    /// Model identifier (e.g. random_forest)
    #[arg(short, long)]
    model: Option<String>,
    /// Never prompt; missing fields fail validation
    #[arg(long)]
    no_input: bool,
}

#[derive(clap::Subcommand, Debug)]
enum HistoryAction {
    /// List predictions, most recent first
    List,
    /// Show one prediction and its feature impact
    Show {
        /// History index, as printed by `history list`
        index: usize,
    },
    /// Delete all predictions
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Export the whole history as CSV
    Export {
        /// Output directory (defaults to export.output_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "homeval", "homeval")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "homeval.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref(), cli.quiet).await
}
