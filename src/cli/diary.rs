//! `brain diary ...` commands.

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use tracing::info;

use super::{connect, one_line, progress_bar, spinner, today};
use crate::analysis::aggregate::{self, Report};
use crate::analysis::linker::{self, Confidence, LinkReport};
use crate::analysis::prompts::generate_prompts;
use crate::config::{AnalysisConfig, BrainConfig};
use crate::entry::store::EntryStore;
use crate::entry::{reflection_template, Entry, EntryKind};
use crate::llm::{create_gateway, LlmOutcome};

/// Rows shown by `diary patterns`.
const PATTERN_ROWS: usize = 15;
/// Preview width of `diary list`.
const LIST_PREVIEW_CHARS: usize = 60;
/// Skipped entries named by `refresh --verbose`.
const SKIPPED_SHOWN: usize = 5;

fn open_store(config: &BrainConfig) -> Result<EntryStore> {
    let paths = config.validate_paths()?;
    Ok(EntryStore::from_paths(&paths))
}

/// Write a new reflection entry with generated prompts.
pub async fn create(config: &BrainConfig, date: NaiveDate) -> Result<()> {
    let store = open_store(config)?;
    if store.exists(date, EntryKind::Reflection) {
        println!(
            "Entry for {date} already exists: {}",
            store.path_for(date, EntryKind::Reflection).display()
        );
        return Ok(());
    }

    let gateway = connect(config).await?;
    let window = linker::candidate_window(date, &config.analysis);
    let recent = store.entries_for_dates(&window, 1)?;

    let pb = spinner("Generating reflection prompts...");
    let prompts = generate_prompts(gateway.as_ref(), date, &recent, &config.analysis).await;
    pb.finish_and_clear();

    let entry = Entry::new(date, EntryKind::Reflection, &reflection_template(&prompts));
    let path = store.write(&entry)?;
    println!("Created entry {}", entry.filename());
    println!("Location: {}", path.display());
    for (i, prompt) in prompts.iter().enumerate() {
        println!("  {}. {prompt}", i + 1);
    }
    Ok(())
}

/// Regenerate the Memory Links section of one entry.
pub async fn link(config: &BrainConfig, date: NaiveDate) -> Result<()> {
    let store = open_store(config)?;
    let Some(entry) = store.read(date, EntryKind::Reflection)? else {
        println!("No entry found for {date}");
        return Ok(());
    };
    let min_chars = config.analysis.min_content_chars;
    if !entry.has_substantial_content(min_chars) {
        let chars = entry.brain_dump().chars().count();
        println!("Entry for {date} is too short to link ({chars} characters, need {min_chars}). Nothing to do.");
        return Ok(());
    }

    let gateway = connect(config).await?;
    let pb = spinner(format!("Linking {date}..."));
    let report = linker::link_entry(gateway.as_ref(), &store, date, &config.analysis).await;
    pb.finish_and_clear();

    match report? {
        LinkReport::Updated { path, links } => {
            let high = links
                .links
                .iter()
                .filter(|l| l.confidence == Confidence::High)
                .count();
            println!("Updated memory links for {date}");
            println!("  Temporal links: {}", links.temporal.len());
            println!("  Semantic links: {} ({high} high confidence)", links.links.len());
            println!("  Tags:           {}", links.topics.len());
            println!("Location: {}", path.display());
            Ok(())
        }
        LinkReport::Missing => {
            println!("No entry found for {date}");
            Ok(())
        }
        LinkReport::TooShort { chars } => {
            println!(
                "Entry for {date} is too short to link ({chars} characters, need {}). Nothing to do.",
                config.analysis.min_content_chars
            );
            Ok(())
        }
        LinkReport::Failed(e) => {
            bail!("linking {date} failed, entry left unchanged: {e}")
        }
    }
}

/// Relink every entry of the last `days` days, oldest first.
pub async fn refresh(config: &BrainConfig, days: u32, all: bool, verbose: bool) -> Result<()> {
    let store = open_store(config)?;
    let mut entries = store.list_entries(days, today())?;
    if entries.is_empty() {
        println!("No entries found in the past {days} days");
        return Ok(());
    }
    entries.reverse();

    let min_chars = config.analysis.min_content_chars;
    let settings = if all {
        AnalysisConfig {
            min_content_chars: 1,
            ..config.analysis.clone()
        }
    } else {
        config.analysis.clone()
    };

    let (selected, skipped): (Vec<&Entry>, Vec<&Entry>) = entries
        .iter()
        .partition(|e| e.has_substantial_content(settings.min_content_chars));

    if verbose && !skipped.is_empty() {
        println!("Skipping {} entries with fewer than {min_chars} characters:", skipped.len());
        for entry in skipped.iter().take(SKIPPED_SHOWN) {
            println!("  - {} ({} chars)", entry.date, entry.brain_dump().chars().count());
        }
        if skipped.len() > SKIPPED_SHOWN {
            println!("  ... and {} more", skipped.len() - SKIPPED_SHOWN);
        }
        println!();
    }

    if selected.is_empty() {
        println!("No entries to refresh");
        println!(
            "Found {} entries, all with fewer than {min_chars} characters. Use --all to include them.",
            entries.len()
        );
        return Ok(());
    }

    println!("Refreshing memory links for {} entries...", selected.len());
    if !all && !skipped.is_empty() {
        println!(
            "Skipping {} short entries (use --all to include)",
            skipped.len()
        );
    }

    let gateway = connect(config).await?;
    let pb = progress_bar(selected.len(), "Linking");
    let mut updated = 0usize;
    let mut failed = Vec::new();
    for entry in &selected {
        match linker::link_entry(gateway.as_ref(), &store, entry.date, &settings).await? {
            LinkReport::Updated { .. } => updated += 1,
            LinkReport::Failed(e) => failed.push((entry.date, e)),
            LinkReport::Missing | LinkReport::TooShort { .. } => {}
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(updated, failed = failed.len(), "refresh complete");
    println!("Refreshed {updated} entries");
    if failed.is_empty() {
        return Ok(());
    }
    for (date, e) in &failed {
        println!("  failed: {date}: {e}");
    }
    bail!("{} entries could not be linked and were left unchanged", failed.len())
}

/// Markdown report of recurring themes and connections.
pub async fn report(config: &BrainConfig, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let end = today();
    let entries = store.list_entries(days, end)?;
    if entries.is_empty() {
        println!("No entries found in the past {days} days");
        return Ok(());
    }

    let gateway = create_gateway(config, super::open_cost_tracker(config))?;
    let pb = spinner(format!("Analyzing {} entries...", entries.len()));
    let extractions =
        aggregate::collect_extractions(gateway.as_ref(), &entries, &config.analysis).await;
    let table = aggregate::rank(&extractions);
    let period = format!("the past {days} days");
    pb.set_message("Writing summary...");
    let summary = match aggregate::narrate(gateway.as_ref(), &table, &period).await {
        LlmOutcome::Parsed(text) => Some(text),
        LlmOutcome::Skipped(_) => None,
        LlmOutcome::Failed(e) => {
            pb.suspend(|| eprintln!("Summary unavailable: {e}"));
            None
        }
    };
    pb.finish_and_clear();

    let report = Report {
        start: Some(end - Duration::days(i64::from(days))),
        end: Some(end),
        days,
        entry_count: entries.len(),
        table,
        connections: aggregate::connection_counts(&entries),
        summary,
    };
    println!("{}", aggregate::render_report(&report));
    Ok(())
}

/// Ranked tags of the last `days` days.
pub async fn patterns(config: &BrainConfig, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.list_entries(days, today())?;
    if entries.is_empty() {
        println!("No entries found in the past {days} days");
        return Ok(());
    }

    let gateway = connect(config).await?;
    let pb = spinner("Analyzing patterns...");
    let extractions =
        aggregate::collect_extractions(gateway.as_ref(), &entries, &config.analysis).await;
    pb.finish_and_clear();

    let table = aggregate::rank(&extractions);
    if table.tags.is_empty() {
        println!("No patterns identified in the past {days} days");
        return Ok(());
    }

    println!("Patterns (past {days} days, {} entries)", entries.len());
    println!("{}", "=".repeat(40));
    for (rank, (tag, count)) in table.tags.iter().take(PATTERN_ROWS).enumerate() {
        println!("  {:>2}. #{:<24} {}", rank + 1, tag, "*".repeat(*count));
    }
    if !table.people.is_empty() {
        println!();
        let people: Vec<String> = table
            .people
            .iter()
            .take(5)
            .map(|(name, n)| format!("{name} ({n})"))
            .collect();
        println!("People: {}", people.join(", "));
    }
    Ok(())
}

/// Recent entries with a one-line preview.
pub fn list(config: &BrainConfig, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.list_entries(days, today())?;
    if entries.is_empty() {
        println!("No entries found in the past {days} days");
        return Ok(());
    }

    println!("Recent entries (past {days} days)");
    println!("{:<12} {:>7}  Preview", "Date", "Length");
    for entry in &entries {
        let body = entry.brain_dump();
        println!(
            "{:<12} {:>7}  {}",
            entry.date.to_string(),
            body.chars().count(),
            one_line(&body, LIST_PREVIEW_CHARS)
        );
    }
    Ok(())
}
