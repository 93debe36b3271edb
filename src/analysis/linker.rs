//! Semantic linker: which earlier entries does this entry relate to?
//!
//! One LLM call per target entry scores the target against its candidate window.
//! Candidates are the prior calendar days, not the prior existing entries, so a
//! missing day simply drops out. Output is validated here before it reaches a
//! file: every link points strictly backwards, at a candidate, at most once.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::extract::{self, dedup_entities, normalize_tag, Extraction};
use crate::config::AnalysisConfig;
use crate::entry::store::{past_calendar_days, EntryStore};
use crate::entry::{truncate_chars, Entry, EntryKind, MEMORY_LINKS};
use crate::llm::{ask_json, LlmFailure, LlmGateway, LlmOutcome, LlmRequest};

static DATE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(\d{4}-\d{2}-\d{2})\]\]").expect("valid regex"));

static SEMANTIC_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \[\[(\d{4}-\d{2}-\d{2})\]\] (high|medium|low):(.*)$").expect("valid regex")
});

const SYSTEM_PROMPT: &str = r#"You find semantic connections between diary entries. Consider:
- shared people, places, or projects
- recurring emotional or thematic patterns
- cause and effect between events
- continuations of an idea or situation

Shared words alone are not a connection; judge meaning.

For each related candidate return:
1. "date": the candidate's date, YYYY-MM-DD
2. "confidence": "high" (clear), "medium" (probable) or "low" (weak)
3. "reason": a brief explanation, 5-10 words
4. "entities": the people, places, projects or themes that connect them

Return ONLY a JSON array, for example:
[{"date": "2025-10-14", "confidence": "high", "reason": "same project deadline stress", "entities": ["website", "stress"]}]
Return [] when nothing is related."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Case-insensitive; anything unrecognised is `Medium`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "low" => Confidence::Low,
            _ => Confidence::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backwards link from one entry to an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticLink {
    pub target: NaiveDate,
    pub confidence: Confidence,
    pub reason: String,
    pub shared: Vec<String>,
}

/// Contents of an entry's `## Memory Links` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLinks {
    pub temporal: Vec<NaiveDate>,
    pub links: Vec<SemanticLink>,
    pub topics: Vec<String>,
    pub people: Vec<String>,
    pub places: Vec<String>,
    pub projects: Vec<String>,
}

impl MemoryLinks {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.temporal.is_empty() {
            let links: Vec<String> = self.temporal.iter().map(|d| format!("[[{d}]]")).collect();
            lines.push(format!("**Temporal:** {}", links.join(" • ")));
        }
        if !self.links.is_empty() {
            lines.push("**Semantic:**".to_string());
            for link in &self.links {
                let mut line = format!("- [[{}]] {}:", link.target, link.confidence);
                if !link.reason.is_empty() {
                    line.push(' ');
                    line.push_str(&link.reason);
                }
                if !link.shared.is_empty() {
                    line.push_str(&format!(" (shared: {})", join_list(&link.shared)));
                }
                lines.push(line);
            }
        }
        if !self.topics.is_empty() {
            let tags: Vec<String> = self.topics.iter().map(|t| format!("#{t}")).collect();
            lines.push(format!("**Topics:** {}", tags.join(" ")));
        }
        for (label, items) in [
            ("People", &self.people),
            ("Places", &self.places),
            ("Projects", &self.projects),
        ] {
            if !items.is_empty() {
                lines.push(format!("**{label}:** {}", join_list(items)));
            }
        }
        lines.join("\n")
    }

    /// Parse a rendered section body. Unknown lines are ignored.
    pub fn parse(body: &str) -> Self {
        let mut out = MemoryLinks::default();
        for line in body.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("**Temporal:**") {
                out.temporal.extend(dates_in(rest));
            } else if let Some(rest) = line.strip_prefix("**Topics:**") {
                out.topics.extend(
                    rest.split_whitespace()
                        .filter_map(|t| t.strip_prefix('#'))
                        .map(str::to_string),
                );
            } else if let Some(rest) = line.strip_prefix("**People:**") {
                out.people = split_list(rest);
            } else if let Some(rest) = line.strip_prefix("**Places:**") {
                out.places = split_list(rest);
            } else if let Some(rest) = line.strip_prefix("**Projects:**") {
                out.projects = split_list(rest);
            } else if let Some(link) = parse_semantic_line(line) {
                out.links.push(link);
            } else if line.starts_with("- [[") {
                // older layout: one temporal link per bullet
                out.temporal.extend(dates_in(line).into_iter().take(1));
            }
        }
        out
    }

    /// Every date this section points at, temporal first.
    pub fn linked_dates(&self) -> Vec<NaiveDate> {
        let mut dates = self.temporal.clone();
        for link in &self.links {
            if !dates.contains(&link.target) {
                dates.push(link.target);
            }
        }
        dates
    }

    /// The extraction results stored in this section.
    pub fn as_extraction(&self) -> Extraction {
        Extraction {
            tags: self.topics.clone(),
            people: self.people.clone(),
            places: self.places.clone(),
            projects: self.projects.clone(),
            themes: Vec::new(),
        }
    }
}

fn dates_in(text: &str) -> Vec<NaiveDate> {
    DATE_LINK_RE
        .captures_iter(text)
        .filter_map(|c| NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok())
        .collect()
}

/// Comma-separated list; commas inside an item become spaces so the line parses back.
fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.replace(',', " ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_semantic_line(line: &str) -> Option<SemanticLink> {
    let caps = SEMANTIC_LINE_RE.captures(line)?;
    let target = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    let rest = caps[3].trim();
    let (reason, shared) = match (rest.rfind("(shared: "), rest.strip_suffix(')')) {
        (Some(idx), Some(_)) => {
            let inner = &rest[idx + "(shared: ".len()..rest.len() - 1];
            (rest[..idx].trim(), split_list(inner))
        }
        _ => (rest, Vec::new()),
    };
    Some(SemanticLink {
        target,
        confidence: Confidence::parse(&caps[2]),
        reason: reason.to_string(),
        shared,
    })
}

/// True when `date` falls on the configured weekly review day.
pub fn is_weekly_day(date: NaiveDate, settings: &AnalysisConfig) -> bool {
    settings
        .weekly_weekday()
        .map(|day| date.weekday() == day)
        .unwrap_or(false)
}

/// Prior calendar days to consider for `date`, newest first.
pub fn candidate_window(date: NaiveDate, settings: &AnalysisConfig) -> Vec<NaiveDate> {
    let days = if is_weekly_day(date, settings) {
        settings.weekly_window_days
    } else {
        settings.daily_window_days
    };
    past_calendar_days(date, days)
}

pub fn max_links_for(date: NaiveDate, settings: &AnalysisConfig) -> usize {
    if is_weekly_day(date, settings) {
        settings.weekly_max_links
    } else {
        settings.daily_max_links
    }
}

/// Score `target` against `candidates` with one LLM call.
///
/// Returns `Skipped` without calling the gateway when no candidate precedes the target.
pub async fn link(
    gateway: &dyn LlmGateway,
    target: &Entry,
    target_extraction: &Extraction,
    candidates: &[Entry],
    max_links: usize,
    settings: &AnalysisConfig,
) -> LlmOutcome<Vec<SemanticLink>> {
    let candidates: Vec<&Entry> = candidates.iter().filter(|c| c.date < target.date).collect();
    if candidates.is_empty() || max_links == 0 {
        debug!(date = %target.date, "no candidates to link against");
        return LlmOutcome::Skipped("no earlier entries in the window".into());
    }

    let candidate_text: Vec<String> = candidates
        .iter()
        .map(|c| candidate_summary(c, settings.preview_chars))
        .collect();
    let context = target_extraction.summary_line();
    let context = if context.is_empty() {
        String::new()
    } else {
        format!("\n[{context}]")
    };
    let user = format!(
        "Target entry [[{}]]:{context}\n{}\n\n---\n\nCandidate entries:\n{}\n\n---\n\n\
         Which candidates are semantically related? Return up to {max_links} links as a JSON array only:",
        target.date,
        target.preview(settings.target_preview_chars),
        candidate_text.join("\n\n"),
    );
    let request = LlmRequest::new("semantic_backlinks", SYSTEM_PROMPT, user)
        .temperature(0.3)
        .max_tokens(400)
        .entry_date(target.date);

    let reply: Value = match ask_json(gateway, &request).await {
        Ok(v) => v,
        Err(e) => {
            warn!(date = %target.date, "semantic linking failed: {e}");
            return LlmOutcome::Failed(e);
        }
    };

    let items = match reply {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("links") {
            Some(Value::Array(items)) => items,
            _ => {
                warn!(date = %target.date, "semantic linking reply had no link array");
                return LlmOutcome::Failed(LlmFailure::Malformed(
                    "expected a JSON array of links".into(),
                ));
            }
        },
        _ => {
            return LlmOutcome::Failed(LlmFailure::Malformed(
                "expected a JSON array of links".into(),
            ))
        }
    };

    let candidate_dates: Vec<NaiveDate> = candidates.iter().map(|c| c.date).collect();
    let links = validate_links(items, target.date, &candidate_dates, max_links);
    info!(
        date = %target.date,
        links = links.len(),
        candidates = candidate_dates.len(),
        "semantic links generated"
    );
    LlmOutcome::Parsed(links)
}

fn candidate_summary(entry: &Entry, preview_chars: usize) -> String {
    let mut out = format!("[[{}]]: {}", entry.date, entry.preview(preview_chars));
    if let Some(links) = entry.memory_links() {
        if !links.topics.is_empty() {
            out.push_str(&format!("\n[Topics: {}]", links.topics.join(", ")));
        }
    }
    out
}

/// Keep well-formed links to known earlier candidates, strongest and most recent first.
pub fn validate_links(
    items: Vec<Value>,
    target_date: NaiveDate,
    candidate_dates: &[NaiveDate],
    max_links: usize,
) -> Vec<SemanticLink> {
    let mut links: Vec<SemanticLink> = items
        .into_iter()
        .filter_map(|item| {
            let date = item.get("date")?.as_str()?;
            let target = NaiveDate::parse_from_str(date.trim().trim_matches(['[', ']']), "%Y-%m-%d").ok()?;
            if target >= target_date || !candidate_dates.contains(&target) {
                return None;
            }
            let confidence = item
                .get("confidence")
                .and_then(Value::as_str)
                .map(Confidence::parse)
                .unwrap_or(Confidence::Medium);
            let reason = item
                .get("reason")
                .and_then(Value::as_str)
                .map(|r| r.split_whitespace().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            let shared = item
                .get("entities")
                .and_then(Value::as_array)
                .map(|a| {
                    dedup_entities(
                        a.iter()
                            .filter_map(Value::as_str)
                            .map(|s| s.replace(['(', ')'], ""))
                            .collect(),
                    )
                })
                .unwrap_or_default();
            Some(SemanticLink {
                target,
                confidence,
                reason: truncate_chars(&reason, 120),
                shared,
            })
        })
        .collect();

    links.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| b.target.cmp(&a.target))
    });
    let mut seen = Vec::new();
    links.retain(|l| {
        if seen.contains(&l.target) {
            false
        } else {
            seen.push(l.target);
            true
        }
    });
    links.truncate(max_links);
    links
}

/// What `link_entry` did to one entry.
#[derive(Debug)]
pub enum LinkReport {
    Updated {
        path: PathBuf,
        links: MemoryLinks,
    },
    Missing,
    TooShort {
        chars: usize,
    },
    /// Semantic scoring failed; the file was left untouched.
    Failed(LlmFailure),
}

/// Link one reflection entry and rewrite its Memory Links section.
pub async fn link_entry(
    gateway: &dyn LlmGateway,
    store: &EntryStore,
    date: NaiveDate,
    settings: &AnalysisConfig,
) -> anyhow::Result<LinkReport> {
    let Some(mut entry) = store.read(date, EntryKind::Reflection)? else {
        return Ok(LinkReport::Missing);
    };
    if !entry.has_substantial_content(settings.min_content_chars) {
        return Ok(LinkReport::TooShort {
            chars: entry.brain_dump().chars().count(),
        });
    }

    let window = candidate_window(date, settings);
    let candidates = store.entries_for_dates(&window, settings.min_content_chars)?;

    // topics are optional; scoring still runs without them
    let extraction = extract::extract(gateway, &entry, settings).await.into_value();
    let max_links = max_links_for(date, settings);
    let links = match link(gateway, &entry, &extraction, &candidates, max_links, settings).await {
        LlmOutcome::Failed(e) => return Ok(LinkReport::Failed(e)),
        other => other.into_value(),
    };

    let mut temporal: Vec<NaiveDate> = window
        .iter()
        .copied()
        .filter(|d| store.exists(*d, EntryKind::Reflection))
        .collect();
    for link in &links {
        if !temporal.contains(&link.target) {
            temporal.push(link.target);
        }
    }

    let memory = MemoryLinks {
        temporal,
        links,
        topics: extraction
            .tags
            .iter()
            .filter_map(|t| normalize_tag(t))
            .collect(),
        people: extraction.people,
        places: extraction.places,
        projects: extraction.projects,
    };

    entry.document.set_section(MEMORY_LINKS, &memory.render());
    let path = store.write(&entry)?;
    info!(%date, temporal = memory.temporal.len(), semantic = memory.links.len(), "memory links updated");
    Ok(LinkReport::Updated { path, links: memory })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn confidence_orders_high_first_and_defaults_medium() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert_eq!(Confidence::parse("HIGH"), Confidence::High);
        assert_eq!(Confidence::parse("certain"), Confidence::Medium);
    }

    #[test]
    fn memory_links_render_and_parse_back() {
        let links = MemoryLinks {
            temporal: vec![date("2025-10-14"), date("2025-10-12")],
            links: vec![SemanticLink {
                target: date("2025-10-12"),
                confidence: Confidence::High,
                reason: "same deadline pressure".into(),
                shared: vec!["website".into(), "stress".into()],
            }],
            topics: vec!["overwhelm".into(), "self-doubt".into()],
            people: vec!["Sarah".into(), "Dr. Kim".into()],
            places: vec![],
            projects: vec!["website".into()],
        };
        let text = links.render();
        assert_eq!(
            text,
            "**Temporal:** [[2025-10-14]] • [[2025-10-12]]\n\
             **Semantic:**\n\
             - [[2025-10-12]] high: same deadline pressure (shared: website, stress)\n\
             **Topics:** #overwhelm #self-doubt\n\
             **People:** Sarah, Dr. Kim\n\
             **Projects:** website"
        );
        assert_eq!(MemoryLinks::parse(&text), links);
    }

    #[test]
    fn commas_inside_entities_do_not_split_them() {
        let links = MemoryLinks {
            links: vec![SemanticLink {
                target: date("2025-10-12"),
                confidence: Confidence::Medium,
                reason: "same trip".into(),
                shared: vec!["Portland, OR".into()],
            }],
            people: vec!["Smith, John".into(), "Sarah".into()],
            ..Default::default()
        };
        let text = links.render();
        assert!(text.contains("(shared: Portland OR)"));
        assert!(text.contains("**People:** Smith John, Sarah"));

        let parsed = MemoryLinks::parse(&text);
        assert_eq!(parsed.people, vec!["Smith John", "Sarah"]);
        assert_eq!(parsed.links[0].shared, vec!["Portland OR"]);
        assert_eq!(parsed.render(), text);
    }

    #[test]
    fn parse_reads_legacy_layout() {
        let parsed = MemoryLinks::parse("**Temporal:** [[2025-10-14]] • [[2025-10-13]]\n**Topics:** #grief #hope");
        assert_eq!(parsed.temporal, vec![date("2025-10-14"), date("2025-10-13")]);
        assert_eq!(parsed.topics, vec!["grief", "hope"]);
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn semantic_line_without_reason_or_shared() {
        let link = parse_semantic_line("- [[2025-10-14]] low:").unwrap();
        assert_eq!(link.reason, "");
        assert!(link.shared.is_empty());
        assert_eq!(link.confidence, Confidence::Low);
    }

    #[test]
    fn weekly_day_widens_window() {
        let settings = AnalysisConfig::default();
        // 2025-10-15 is a Wednesday
        assert_eq!(
            candidate_window(date("2025-10-15"), &settings),
            vec![date("2025-10-14"), date("2025-10-13"), date("2025-10-12")]
        );
        assert_eq!(max_links_for(date("2025-10-15"), &settings), 3);
        // 2025-10-19 is a Sunday
        let window = candidate_window(date("2025-10-19"), &settings);
        assert_eq!(window.len(), 7);
        assert_eq!(window[6], date("2025-10-12"));
        assert_eq!(max_links_for(date("2025-10-19"), &settings), 5);
    }

    #[test]
    fn validate_drops_forward_unknown_and_duplicate_links() {
        let target = date("2025-10-15");
        let candidates = [date("2025-10-14"), date("2025-10-13"), date("2025-10-12")];
        let items = vec![
            json!({"date": "2025-10-13", "confidence": "low", "reason": "a"}),
            json!({"date": "2025-10-15", "confidence": "high", "reason": "self"}),
            json!({"date": "2025-10-16", "confidence": "high", "reason": "future"}),
            json!({"date": "2025-10-01", "confidence": "high", "reason": "outside window"}),
            json!({"date": "2025-10-12", "confidence": "high", "reason": "b", "entities": ["Sarah", "sarah"]}),
            json!({"date": "2025-10-14", "confidence": "high", "reason": "c"}),
            json!({"date": "2025-10-13", "confidence": "medium", "reason": "dup"}),
            json!({"date": "not a date"}),
            json!("garbage"),
        ];
        let links = validate_links(items, target, &candidates, 3);
        let dates: Vec<_> = links.iter().map(|l| (l.target, l.confidence)).collect();
        assert_eq!(
            dates,
            vec![
                (date("2025-10-14"), Confidence::High),
                (date("2025-10-12"), Confidence::High),
                (date("2025-10-13"), Confidence::Medium),
            ]
        );
        assert_eq!(links[1].shared, vec!["Sarah"]);
        assert!(links.iter().all(|l| l.target < target));
    }

    #[test]
    fn validate_truncates_to_max_links() {
        let candidates = [date("2025-10-14"), date("2025-10-13")];
        let items = vec![
            json!({"date": "2025-10-14", "confidence": "medium"}),
            json!({"date": "2025-10-13", "confidence": "high"}),
        ];
        let links = validate_links(items, date("2025-10-15"), &candidates, 1);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, date("2025-10-13"));
    }
}
