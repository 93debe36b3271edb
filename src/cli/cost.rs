//! `brain cost ...` commands over the usage log.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use super::today;
use crate::config::BrainConfig;
use crate::cost::{CostSummary, CostTracker, DateRange, Pricing, Totals};

const TREND_BAR_WIDTH: f64 = 20.0;
const DEFAULT_EXPORT_DAYS: u32 = 90;

fn open_tracker(config: &BrainConfig) -> Result<CostTracker> {
    let path = config.resolved_cost_db_path();
    if !path.exists() {
        bail!(
            "no cost database at {}; it is created by the first tracked LLM call",
            path.display()
        );
    }
    CostTracker::open(&path, Pricing::new(config.cost.pricing.clone()))
}

/// Range and label for `--days` / `--month`, with `--month` taking precedence.
pub fn resolve_range(
    days: Option<u32>,
    month: Option<&str>,
    default_days: u32,
    today: NaiveDate,
) -> Result<(DateRange, String)> {
    match month {
        Some(month) => Ok((DateRange::parse_month(month)?, month.to_string())),
        None => {
            let days = days.unwrap_or(default_days);
            Ok((DateRange::last_days(days, today), format!("last {days} days")))
        }
    }
}

fn title(operation: &str) -> String {
    operation
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn by_cost(summary: &CostSummary) -> Vec<(&String, &Totals)> {
    let mut ops: Vec<(&String, &Totals)> = summary.by_operation.iter().collect();
    ops.sort_by(|a, b| b.1.cost.total_cmp(&a.1.cost));
    ops
}

pub fn summary(config: &BrainConfig, days: Option<u32>, month: Option<&str>) -> Result<()> {
    let tracker = open_tracker(config)?;
    let (range, label) = resolve_range(days, month, 30, today())?;
    let summary = tracker.summary(range)?;
    if summary.total.requests == 0 {
        println!("No usage data found for {label}");
        return Ok(());
    }

    println!("Cost Summary ({label})");
    println!("{}", "=".repeat(40));
    println!("Total cost:        ${:.2}", summary.total.cost);
    println!("Total tokens:      {}", summary.total.tokens);
    println!("Total requests:    {}", summary.total.requests);
    if !summary.by_day.is_empty() {
        let active_days = summary.by_day.len() as f64;
        println!("Average per day:   ${:.2}", summary.total.cost / active_days);
    }

    println!();
    println!("{:<24} {:>10} {:>10} {:>9} {:>12}", "Operation", "Cost", "Tokens", "Requests", "Avg/request");
    for (operation, totals) in by_cost(&summary) {
        let avg = if totals.requests > 0 {
            totals.cost / totals.requests as f64
        } else {
            0.0
        };
        println!(
            "{:<24} {:>10} {:>10} {:>9} {:>12}",
            title(operation),
            format!("${:.2}", totals.cost),
            totals.tokens,
            totals.requests,
            format!("${avg:.4}")
        );
    }

    println!();
    println!("Recent daily activity:");
    for (day, totals) in summary.by_day.iter().rev().take(7) {
        println!(
            "  {day}  ${:>8.2}  {:>8} tokens  {:>4} requests",
            totals.cost, totals.tokens, totals.requests
        );
    }
    Ok(())
}

pub fn trends(config: &BrainConfig, days: u32) -> Result<()> {
    let tracker = open_tracker(config)?;
    let trend = tracker.trends(days, today())?;
    let max = trend.iter().map(|(_, c)| *c).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        println!("No usage data found for the last {days} days");
        return Ok(());
    }

    println!("Daily Cost Trends (last {days} days)");
    let mut previous: Option<f64> = None;
    for (day, cost) in &trend {
        let arrow = match previous {
            Some(p) if *cost > p => "up  ",
            Some(p) if *cost < p => "down",
            Some(_) => "same",
            None => "    ",
        };
        let bar = "#".repeat((cost / max * TREND_BAR_WIDTH) as usize);
        println!("  {day}  ${cost:>7.2}  {arrow}  {bar}");
        previous = Some(*cost);
    }
    Ok(())
}

pub fn estimate(config: &BrainConfig, sample_days: u32) -> Result<()> {
    let tracker = open_tracker(config)?;
    let today = today();
    let recent = tracker.summary(DateRange::last_days(sample_days, today))?;
    if recent.total.requests == 0 || sample_days == 0 {
        println!("No usage data found for the last {sample_days} days");
        return Ok(());
    }
    let monthly = tracker.estimate_monthly(sample_days, today)?;
    let confidence = match recent.total.requests {
        n if n >= 10 => "high",
        n if n >= 5 => "medium",
        _ => "low",
    };

    println!("Estimated monthly cost: ${monthly:.2}");
    println!("Based on the last {sample_days} days of usage");
    println!(
        "Recent daily average:   ${:.2}",
        recent.total.cost / f64::from(sample_days)
    );
    println!(
        "Confidence:             {confidence} ({} recent requests)",
        recent.total.requests
    );
    Ok(())
}

pub fn breakdown(config: &BrainConfig, days: u32) -> Result<()> {
    let tracker = open_tracker(config)?;
    let summary = tracker.summary(DateRange::last_days(days, today()))?;
    if summary.total.requests == 0 {
        println!("No usage data found for the last {days} days");
        return Ok(());
    }

    println!("Cost Breakdown (last {days} days)");
    for (operation, totals) in by_cost(&summary) {
        let share = |part: f64, whole: f64| if whole > 0.0 { part / whole * 100.0 } else { 0.0 };
        println!();
        println!("{}", title(operation));
        println!(
            "  Cost:      ${:.2} ({:.1}% of total)",
            totals.cost,
            share(totals.cost, summary.total.cost)
        );
        println!(
            "  Tokens:    {} ({:.1}% of total)",
            totals.tokens,
            share(totals.tokens as f64, summary.total.tokens as f64)
        );
        println!("  Requests:  {}", totals.requests);
        if totals.requests > 0 {
            println!("  Avg/req:   ${:.4}", totals.cost / totals.requests as f64);
        }
    }
    Ok(())
}

pub fn export(
    config: &BrainConfig,
    output: &Path,
    days: Option<u32>,
    month: Option<&str>,
) -> Result<()> {
    let tracker = open_tracker(config)?;
    let (range, label) = resolve_range(days, month, DEFAULT_EXPORT_DAYS, today())?;
    let rows = tracker.export(range)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&rows).context("failed to serialize usage rows")?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Exported {} records ({label}) to {}", rows.len(), output.display());
    Ok(())
}

/// Configured prices. Does not need the database.
pub fn pricing(config: &BrainConfig, model: Option<&str>) -> Result<()> {
    let pricing = Pricing::new(config.cost.pricing.clone());
    let rows: Vec<_> = match model {
        Some(model) => {
            let key = model.to_lowercase();
            let found: Vec<_> = pricing.entries().filter(|(name, _)| *name == key).collect();
            if found.is_empty() {
                bail!("model {model:?} not found in pricing table");
            }
            found
        }
        None => pricing.entries().collect(),
    };

    println!("{:<16} {:>14} {:>14}", "Model", "Input / 1K", "Output / 1K");
    for (name, price) in rows {
        println!(
            "{:<16} {:>14} {:>14}",
            name,
            format!("${:.5}", price.input),
            format!("${:.5}", price.output)
        );
    }
    println!();
    println!("Override with [cost.pricing] in the config file or AZURE_*_PRICE variables.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn month_wins_over_days() {
        let (range, label) = resolve_range(Some(7), Some("2025-02"), 30, date("2025-10-15")).unwrap();
        assert_eq!(range.start, date("2025-02-01"));
        assert_eq!(range.end, date("2025-02-28"));
        assert_eq!(label, "2025-02");
    }

    #[test]
    fn days_default_applies() {
        let (range, label) = resolve_range(None, None, 30, date("2025-10-15")).unwrap();
        assert_eq!(range.start, date("2025-09-15"));
        assert_eq!(label, "last 30 days");
        assert!(resolve_range(None, Some("2025"), 30, date("2025-10-15")).is_err());
    }

    #[test]
    fn operation_titles() {
        assert_eq!(title("semantic_backlinks"), "Semantic Backlinks");
        assert_eq!(title("daily_prompts"), "Daily Prompts");
    }
}
