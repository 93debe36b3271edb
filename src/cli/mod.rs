//! Command handlers. Argument parsing lives in `main.rs`; everything here prints
//! to stdout and leaves diagnostics to `tracing` on stderr.

pub mod cost;
pub mod diary;
pub mod doctor;
pub mod notes;
pub mod plan;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::warn;

use crate::config::BrainConfig;
use crate::cost::{CostTracker, Pricing};
use crate::llm::{create_gateway, LlmGateway};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `today`, `yesterday`, `tomorrow` or `YYYY-MM-DD`, relative to `today`.
pub fn resolve_date(arg: &str, today: NaiveDate) -> Result<NaiveDate> {
    match arg.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        "tomorrow" => Ok(today + Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").with_context(|| {
            format!("invalid date {arg:?}, expected today, yesterday, tomorrow or YYYY-MM-DD")
        }),
    }
}

/// Clap value parser for date arguments.
pub fn parse_date(arg: &str) -> std::result::Result<NaiveDate, String> {
    resolve_date(arg, today()).map_err(|e| e.to_string())
}

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub fn progress_bar(len: usize, message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {msg} {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );
    pb.set_message(message.into());
    pb
}

/// Open the cost log when enabled. A log that cannot be opened only disables tracking.
pub fn open_cost_tracker(config: &BrainConfig) -> Option<Arc<CostTracker>> {
    if !config.cost.enabled {
        return None;
    }
    let path = config.resolved_cost_db_path();
    match CostTracker::open(&path, Pricing::new(config.cost.pricing.clone())) {
        Ok(tracker) => Some(Arc::new(tracker)),
        Err(e) => {
            warn!(path = %path.display(), "cost tracking disabled: {e:#}");
            None
        }
    }
}

/// Build the configured gateway and make sure it answers.
pub async fn connect(config: &BrainConfig) -> Result<Box<dyn LlmGateway>> {
    let gateway = create_gateway(config, open_cost_tracker(config))?;
    let pb = spinner(format!("Connecting to {}...", gateway.model()));
    let checked = gateway.check_connection().await;
    pb.finish_and_clear();
    if let Err(e) = checked {
        bail!("cannot reach the LLM provider ({e}); check LLM_PROVIDER and its settings");
    }
    Ok(gateway)
}

/// First `max` characters on a single line, with `...` when cut.
pub fn one_line(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        format!("{}...", crate::entry::truncate_chars(&flat, max))
    } else {
        flat
    }
}
