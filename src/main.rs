use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use brain::cli::{self, parse_date};
use brain::config::BrainConfig;

#[derive(Parser)]
#[command(
    name = "brain",
    version,
    about = "Journaling with AI-generated prompts, memory links and daily plans"
)]
struct Cli {
    /// Config file (default: ~/.brain/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable info logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reflection entries
    Diary {
        #[command(subcommand)]
        action: DiaryAction,
    },
    /// Daily plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// LLM usage and cost
    Cost {
        #[command(subcommand)]
        action: CostAction,
    },
    /// Search the notes index
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
    /// Check configuration, directories, LLM connectivity and the cost database
    Doctor,
}

#[derive(Subcommand)]
enum DiaryAction {
    /// Create an entry with generated reflection prompts
    Create {
        /// today, yesterday, tomorrow or YYYY-MM-DD
        #[arg(default_value = "today", value_parser = parse_date)]
        date: NaiveDate,
    },
    /// Generate memory links for one entry
    Link {
        #[arg(default_value = "today", value_parser = parse_date)]
        date: NaiveDate,
    },
    /// Regenerate memory links for recent entries
    Refresh {
        #[arg(default_value_t = 30)]
        days: u32,
        /// Include entries below the minimum length
        #[arg(short, long)]
        all: bool,
        /// Show skipped entries
        #[arg(short, long)]
        verbose: bool,
    },
    /// Report recurring themes and connections
    Report {
        #[arg(default_value_t = 30)]
        days: u32,
    },
    /// Rank recurring tags
    Patterns {
        #[arg(default_value_t = 7)]
        days: u32,
    },
    /// List recent entries
    List {
        #[arg(default_value_t = 7)]
        days: u32,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// Create a plan from yesterday's open tasks and reflection
    Create {
        #[arg(default_value = "today", value_parser = parse_date)]
        date: NaiveDate,
    },
}

#[derive(Subcommand)]
enum CostAction {
    /// Totals by operation and day
    Summary {
        #[arg(short, long)]
        days: Option<u32>,
        /// YYYY-MM, overrides --days
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Daily cost over time
    Trends {
        #[arg(short, long, default_value_t = 14)]
        days: u32,
    },
    /// Project monthly cost from recent usage
    Estimate {
        #[arg(short, long, default_value_t = 7)]
        sample_days: u32,
    },
    /// Share of cost per operation
    Breakdown {
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
    /// Write usage rows as JSON
    Export {
        output: PathBuf,
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Show configured prices
    Pricing {
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
enum NotesAction {
    /// Full-text or semantic search
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        top: usize,
        #[arg(short, long)]
        semantic: bool,
        #[arg(short, long)]
        detailed: bool,
    },
    /// Check the search service connection
    Status,
}

fn init_logging(cli: &Cli, config: &BrainConfig) -> Result<()> {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        config.logging.log_level.as_str()
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries command output only
    match &config.logging.log_file {
        Some(path) => {
            let path = brain::config::expand_tilde(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BrainConfig::load(cli.config.as_deref())?;
    init_logging(&cli, &config)?;

    match cli.command {
        Command::Diary { action } => match action {
            DiaryAction::Create { date } => cli::diary::create(&config, date).await?,
            DiaryAction::Link { date } => cli::diary::link(&config, date).await?,
            DiaryAction::Refresh { days, all, verbose } => {
                cli::diary::refresh(&config, days, all, verbose).await?
            }
            DiaryAction::Report { days } => cli::diary::report(&config, days).await?,
            DiaryAction::Patterns { days } => cli::diary::patterns(&config, days).await?,
            DiaryAction::List { days } => cli::diary::list(&config, days)?,
        },
        Command::Plan { action } => match action {
            PlanAction::Create { date } => cli::plan::create(&config, date).await?,
        },
        Command::Cost { action } => match action {
            CostAction::Summary { days, month } => {
                cli::cost::summary(&config, days, month.as_deref())?
            }
            CostAction::Trends { days } => cli::cost::trends(&config, days)?,
            CostAction::Estimate { sample_days } => cli::cost::estimate(&config, sample_days)?,
            CostAction::Breakdown { days } => cli::cost::breakdown(&config, days)?,
            CostAction::Export {
                output,
                days,
                month,
            } => cli::cost::export(&config, &output, days, month.as_deref())?,
            CostAction::Pricing { model } => cli::cost::pricing(&config, model.as_deref())?,
        },
        Command::Notes { action } => match action {
            NotesAction::Search {
                query,
                top,
                semantic,
                detailed,
            } => cli::notes::search(&config, &query, top, semantic, detailed).await?,
            NotesAction::Status => cli::notes::status(&config).await?,
        },
        Command::Doctor => cli::doctor::doctor(&config, cli.config.as_deref()).await?,
    }

    Ok(())
}
