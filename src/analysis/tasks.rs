//! Task extraction for the daily plan.
//!
//! Tomorrow's action items come from two places: unchecked boxes carried over from
//! the previous plan, and tasks the model finds in the previous reflection. The
//! merge of the two is deterministic and independent of the model.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::similarity::is_near_duplicate;
use crate::config::AnalysisConfig;
use crate::entry::tasks::{Provenance, Task};
use crate::entry::{truncate_chars, Entry};
use crate::llm::{ask_json, LlmFailure, LlmGateway, LlmOutcome, LlmRequest};

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").expect("valid regex"));

/// Shortest description kept from the model.
const MIN_TASK_CHARS: usize = 6;

/// Leading words that mark a finished activity rather than a task.
const COMPLETION_WORDS: &[&str] = &[
    "finished", "completed", "done", "did", "sent", "submitted", "wrote", "went", "attended",
    "had", "met", "fixed", "shipped", "delivered", "wrapped",
];

const SYSTEM_PROMPT: &str = r#"You extract actionable tasks for today from yesterday's diary entry.

Include:
- tasks mentioned as incomplete, pending, or still needed
- concrete intentions for the near future ("I need to call the bank")
- follow-ups from meetings or conversations
- blockers that require an action

Exclude:
- completed activities, anything described in the past tense as done
- vague intentions with no clear action ("should exercise more someday")
- purely emotional statements or reflections
- past social activities with no next step

Write each task as a short imperative phrase (e.g. "Review Sarah's PR").
Return ONLY JSON: {"tasks": ["task one", "task two"]}
Return {"tasks": []} when there is nothing actionable."#;

/// Result of planning one day.
#[derive(Debug, Default)]
pub struct TaskPlan {
    /// Final deduplicated list, carried tasks first.
    pub tasks: Vec<Task>,
    pub carried: usize,
    pub extracted: usize,
    /// Set when extraction failed and only carried tasks are present.
    pub failure: Option<LlmFailure>,
}

impl TaskPlan {
    /// Plan made of carried-forward tasks alone, when nothing was asked of the model.
    pub fn carried_only(carried: Vec<Task>) -> Self {
        Self {
            carried: carried.len(),
            tasks: carried,
            extracted: 0,
            failure: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTasks {
    tasks: Vec<Value>,
}

/// Build today's task list from yesterday's reflection and carried-forward tasks.
///
/// Extraction failure never loses carried tasks.
pub async fn extract_tasks(
    gateway: &dyn LlmGateway,
    reflection: Option<&Entry>,
    carried: Vec<Task>,
    settings: &AnalysisConfig,
) -> TaskPlan {
    let outcome = match reflection {
        Some(entry) => extract_from_reflection(gateway, entry, settings).await,
        None => LlmOutcome::Skipped("no reflection entry".into()),
    };

    let carried_count = carried.len();
    let (extracted, failure) = match outcome {
        LlmOutcome::Parsed(tasks) => (tasks, None),
        LlmOutcome::Skipped(reason) => {
            debug!(%reason, "task extraction skipped");
            (Vec::new(), None)
        }
        LlmOutcome::Failed(e) => (Vec::new(), Some(e)),
    };

    let merged = merge_tasks(carried, extracted, settings.dedup_threshold);
    let extracted_kept = merged.len().saturating_sub(carried_count);
    TaskPlan {
        tasks: merged,
        carried: carried_count,
        extracted: extracted_kept,
        failure,
    }
}

/// Ask the model for tasks in `entry` and apply the exclusion post-filter.
pub async fn extract_from_reflection(
    gateway: &dyn LlmGateway,
    entry: &Entry,
    settings: &AnalysisConfig,
) -> LlmOutcome<Vec<Task>> {
    let body = entry.brain_dump();
    if body.chars().count() < settings.min_content_chars {
        return LlmOutcome::Skipped("reflection too short for task extraction".into());
    }

    let user = format!(
        "Diary entry from [[{}]]:\n\n{}\n\nExtract specific, actionable tasks for today. Return JSON only:",
        entry.date,
        truncate_chars(&body, 2000)
    );
    let request = LlmRequest::new("task_extraction", SYSTEM_PROMPT, user)
        .temperature(0.4)
        .max_tokens(300)
        .entry_date(entry.date);

    let raw: RawTasks = match ask_json(gateway, &request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(date = %entry.date, "task extraction failed: {e}");
            return LlmOutcome::Failed(e);
        }
    };

    let provenance = Provenance::of(entry);
    let tasks: Vec<Task> = raw
        .tasks
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Object(map) => map
                .get("task")
                .or_else(|| map.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .map(|s| clean_description(&s))
        .filter(|s| keep_task(s))
        .map(|s| Task::new(s, provenance))
        .collect();
    debug!(date = %entry.date, count = tasks.len(), "tasks extracted");
    LlmOutcome::Parsed(tasks)
}

/// Strip list markers, checkboxes and trailing periods.
fn clean_description(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(m) = LIST_MARKER_RE.find(s) {
        s = &s[m.end()..];
    }
    for marker in ["[ ]", "[x]", "[X]"] {
        if let Some(rest) = s.strip_prefix(marker) {
            s = rest.trim_start();
        }
    }
    s.trim_end_matches('.').trim().to_string()
}

/// Post-filter for the exclusion policy: no finished activities, nothing trivially short.
pub fn keep_task(description: &str) -> bool {
    if description.chars().count() < MIN_TASK_CHARS {
        return false;
    }
    let first = description
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    !COMPLETION_WORDS.contains(&first.as_str())
}

/// Merge carried and extracted tasks, dropping near-duplicate extractions.
///
/// Carried tasks are kept as they are, in their original order; only a human
/// checking them off removes them. An extracted task that matches one already
/// accepted is folded into it, and the accepted task keeps whichever
/// provenance is earliest.
pub fn merge_tasks(carried: Vec<Task>, extracted: Vec<Task>, threshold: f64) -> Vec<Task> {
    let mut merged = carried;
    for task in extracted {
        match merged
            .iter_mut()
            .find(|kept| is_near_duplicate(&kept.description, &task.description, threshold))
        {
            Some(kept) => {
                if task.provenance < kept.provenance {
                    kept.provenance = task.provenance;
                }
            }
            None => merged.push(task),
        }
    }
    merged
}
