//! Report and pattern aggregation over a window of entries.
//!
//! Ranking is a pure reduction over extraction results. Only the optional
//! narrative asks the model for anything, and its failure leaves the table intact.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::extract::{self, Extraction};
use crate::config::AnalysisConfig;
use crate::entry::Entry;
use crate::llm::{LlmGateway, LlmOutcome, LlmRequest};

const SUMMARY_PROMPT: &str = "You summarize patterns in a person's diary. Write two or three short, \
warm paragraphs in the second person about the recurring themes, the people involved and how \
things seem to be developing. Do not invent events that are not implied by the data. Plain text only.";

/// Ranked occurrence counts, highest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    pub tags: Vec<(String, usize)>,
    pub people: Vec<(String, usize)>,
    pub places: Vec<(String, usize)>,
    pub projects: Vec<(String, usize)>,
}

impl FrequencyTable {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.people.is_empty()
            && self.places.is_empty()
            && self.projects.is_empty()
    }
}

/// Count every tag and entity across `extractions`.
pub fn rank(extractions: &[Extraction]) -> FrequencyTable {
    FrequencyTable {
        tags: count(extractions.iter().flat_map(|e| e.tags.iter())),
        people: count(extractions.iter().flat_map(|e| e.people.iter())),
        places: count(extractions.iter().flat_map(|e| e.places.iter())),
        projects: count(extractions.iter().flat_map(|e| e.projects.iter())),
    }
}

/// Case-insensitive counts, shown with the first spelling seen.
fn count<'a>(items: impl Iterator<Item = &'a String>) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        counts
            .entry(item.to_lowercase())
            .or_insert_with(|| (item.to_string(), 0))
            .1 += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_values().collect();
    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
    });
    ranked
}

/// Links per entry, counting semantic links both out of and into each date.
///
/// Only links between entries of the window are counted.
pub fn connection_counts(entries: &[Entry]) -> Vec<(NaiveDate, usize)> {
    let in_window: Vec<NaiveDate> = entries.iter().map(|e| e.date).collect();
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for entry in entries {
        let Some(links) = entry.memory_links() else {
            continue;
        };
        for link in &links.links {
            if !in_window.contains(&link.target) {
                continue;
            }
            *counts.entry(entry.date).or_default() += 1;
            *counts.entry(link.target).or_default() += 1;
        }
    }
    let mut ranked: Vec<(NaiveDate, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    ranked
}

/// One extraction per entry, preferring what is already written in the file.
///
/// Entries the model fails on are left out with a warning.
pub async fn collect_extractions(
    gateway: &dyn LlmGateway,
    entries: &[Entry],
    settings: &AnalysisConfig,
) -> Vec<Extraction> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(links) = entry.memory_links() {
            let stored = links.as_extraction();
            if !stored.is_empty() {
                out.push(stored);
                continue;
            }
        }
        match extract::extract(gateway, entry, settings).await {
            LlmOutcome::Parsed(extraction) => out.push(extraction),
            LlmOutcome::Skipped(reason) => debug!(date = %entry.date, %reason, "entry skipped"),
            LlmOutcome::Failed(e) => warn!(date = %entry.date, "skipping entry in report: {e}"),
        }
    }
    out
}

/// Short prose summary of the ranked table.
pub async fn narrate(
    gateway: &dyn LlmGateway,
    table: &FrequencyTable,
    period: &str,
) -> LlmOutcome<String> {
    if table.is_empty() {
        return LlmOutcome::Skipped("nothing to summarize".into());
    }

    let mut user = format!("Diary patterns for {period}.\n");
    for (label, items) in [
        ("Recurring themes", &table.tags),
        ("People", &table.people),
        ("Projects", &table.projects),
        ("Places", &table.places),
    ] {
        if !items.is_empty() {
            let shown: Vec<String> = items
                .iter()
                .take(10)
                .map(|(name, n)| format!("{name} ({n})"))
                .collect();
            user.push_str(&format!("{label}: {}\n", shown.join(", ")));
        }
    }
    user.push_str("\nWrite the summary:");

    let request = LlmRequest::new("pattern_summary", SUMMARY_PROMPT, user)
        .temperature(0.7)
        .max_tokens(400);
    match gateway.generate(&request).await {
        Ok(completion) => {
            let text = completion.text.trim().to_string();
            if text.is_empty() {
                LlmOutcome::Skipped("empty summary".into())
            } else {
                LlmOutcome::Parsed(text)
            }
        }
        Err(e) => {
            warn!("pattern summary failed: {e}");
            LlmOutcome::Failed(e.into())
        }
    }
}

/// Inputs of a rendered report.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub days: u32,
    pub entry_count: usize,
    pub table: FrequencyTable,
    pub connections: Vec<(NaiveDate, usize)>,
    pub summary: Option<String>,
}

/// Markdown report of a window.
pub fn render_report(report: &Report) -> String {
    let mut out = String::from("# Memory Trace Analysis\n\n");
    match (report.start, report.end) {
        (Some(start), Some(end)) => out.push_str(&format!(
            "**Period:** {start} to {end} ({} days)\n",
            report.days
        )),
        _ => out.push_str(&format!("**Period:** last {} days\n", report.days)),
    }
    out.push_str(&format!("**Entries analyzed:** {}\n", report.entry_count));

    if !report.table.tags.is_empty() {
        out.push_str("\n## Recurring Themes\n");
        for (tag, n) in report.table.tags.iter().take(10) {
            out.push_str(&format!("- #{tag} ({n} {})\n", plural(*n, "entry", "entries")));
        }
    }

    for (title, items) in [
        ("People", &report.table.people),
        ("Projects", &report.table.projects),
        ("Places", &report.table.places),
    ] {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {title}\n"));
        for (name, n) in items.iter().take(10) {
            out.push_str(&format!("- {name} ({n})\n"));
        }
    }

    if !report.connections.is_empty() {
        out.push_str("\n## Most Connected Entries\n");
        for (date, n) in report.connections.iter().take(5) {
            out.push_str(&format!("- [[{date}]] ({n} {})\n", plural(*n, "link", "links")));
        }
    }

    if let Some(summary) = &report.summary {
        out.push_str("\n## Summary\n");
        out.push_str(summary.trim());
        out.push('\n');
    }
    out
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
