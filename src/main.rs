use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config_review::lifecycle::{EventKind, ReviewState, Verdict};
use config_review::review_config::ReviewConfig;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "config-review")]
#[command(version, about = "Auto-approval of generated privacy configuration changes")]
pub struct Cli {
    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to review.toml. Defaults to <project-dir>/.config-review/review.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two generated config trees and print the classification report
    Compare {
        /// Config tree before the change
        old: PathBuf,
        /// Config tree after the change
        new: PathBuf,

        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Epoch directory to treat as current (e.g. v4)
        #[arg(long)]
        epoch: Option<String>,
    },
    /// Submit or dismiss the automatic approval on a pull request
    Review {
        /// opened, amended or verification-completed
        #[arg(long)]
        event: EventKind,

        /// Markdown report produced by `compare`
        #[arg(long)]
        report: PathBuf,

        /// Pull request number
        #[arg(long)]
        pr: u64,

        /// Repository as owner/repo (overrides GITHUB_REPOSITORY and review.toml)
        #[arg(long)]
        repo: Option<String>,
    },
    /// Print the lifecycle action for a review state, event and verdict
    Decide {
        /// none, active or dismissed
        #[arg(long)]
        state: ReviewState,

        /// opened, amended or verification-completed
        #[arg(long)]
        event: EventKind,

        /// approvable or not-approvable
        #[arg(long)]
        verdict: Verdict,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default review.toml file
    Init,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Decide {
            state,
            event,
            verdict,
        } => cmd::cmd_decide(*state, *event, *verdict),
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.clone(), command.clone())?;
        }
        Commands::Compare {
            old,
            new,
            format,
            output,
            epoch,
        } => {
            let config = ReviewConfig::with_cli_args(project_dir, cli.config.clone())?;
            cmd::cmd_compare(&config, old, new, *format, output.as_deref(), epoch.as_deref())?;
        }
        Commands::Review {
            event,
            report,
            pr,
            repo,
        } => {
            let config = ReviewConfig::with_cli_args(project_dir, cli.config.clone())?
                .with_repository(repo.clone());
            cmd::cmd_review(&config, *event, report, *pr).await?;
        }
    }

    Ok(())
}
