//! Theme and entity extraction for a single entry.
//!
//! Tags are meant to be emotional or thematic labels ("overwhelm", "boundaries")
//! rather than surface keywords. That is asked of the model in the prompt and is
//! best-effort only; the code guarantees shape (normalized, deduplicated, capped),
//! not meaning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::entry::{truncate_chars, Entry};
use crate::llm::{ask_json, LlmGateway, LlmOutcome, LlmRequest};

pub const MIN_TAG_CHARS: usize = 3;
pub const MAX_TAG_CHARS: usize = 24;

const SYSTEM_PROMPT: &str = r#"You analyze personal diary entries.

Return ONLY a JSON object with these keys, each an array of short strings:
- "tags": thematic and emotional labels that capture the underlying patterns of the entry
  (e.g. "overwhelm", "self-doubt", "boundaries", "gratitude"). Avoid generic activity words
  like "work" or "meeting" and obvious nouns from the text. Lowercase, single words or
  hyphenated phrases, no emojis.
- "people": names or roles (e.g. "Sarah", "manager")
- "places": locations (e.g. "office", "Portland")
- "projects": work or personal initiatives (e.g. "website redesign")
- "themes": broader concepts (e.g. "stress", "growth")

Keep each item to 1-3 words. Use empty arrays when nothing applies.
Example: {"tags": ["overwhelm"], "people": ["Sarah"], "places": ["office"], "projects": ["website"], "themes": ["stress"]}"#;

/// Tags and named entities of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub tags: Vec<String>,
    pub people: Vec<String>,
    pub places: Vec<String>,
    pub projects: Vec<String>,
    pub themes: Vec<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
            && self.people.is_empty()
            && self.places.is_empty()
            && self.projects.is_empty()
            && self.themes.is_empty()
    }

    /// Compact one-line context for other prompts, e.g. `People: Sarah; Themes: stress`.
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        for (label, items) in [
            ("People", &self.people),
            ("Places", &self.places),
            ("Projects", &self.projects),
            ("Themes", &self.themes),
            ("Tags", &self.tags),
        ] {
            if !items.is_empty() {
                let shown: Vec<&str> = items.iter().take(3).map(String::as_str).collect();
                parts.push(format!("{label}: {}", shown.join(", ")));
            }
        }
        parts.join("; ")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawExtraction {
    tags: Vec<Value>,
    people: Vec<Value>,
    places: Vec<Value>,
    projects: Vec<Value>,
    themes: Vec<Value>,
}

/// Extract tags and entities from the entry's Brain Dump.
///
/// Entries below `min_content_chars` are skipped without a gateway call.
pub async fn extract(
    gateway: &dyn LlmGateway,
    entry: &Entry,
    settings: &AnalysisConfig,
) -> LlmOutcome<Extraction> {
    let body = entry.brain_dump();
    let chars = body.chars().count();
    if chars < settings.min_content_chars {
        debug!(date = %entry.date, chars, "entry too short for extraction");
        return LlmOutcome::Skipped(format!(
            "Brain Dump has {chars} characters, fewer than {}",
            settings.min_content_chars
        ));
    }

    let user = format!(
        "Extract tags and entities from this diary entry:\n\n{}\n\nReturn JSON only (no explanations):",
        truncate_chars(&body, settings.target_preview_chars)
    );
    let request = LlmRequest::new("entity_extraction", SYSTEM_PROMPT, user)
        .temperature(0.2)
        .max_tokens(250)
        .entry_date(entry.date);

    match ask_json::<RawExtraction>(gateway, &request).await {
        Ok(raw) => {
            let extraction = normalize(raw, settings.max_tags);
            debug!(
                date = %entry.date,
                tags = extraction.tags.len(),
                people = extraction.people.len(),
                "extraction complete"
            );
            LlmOutcome::Parsed(extraction)
        }
        Err(e) => {
            warn!(date = %entry.date, "entity extraction failed: {e}");
            LlmOutcome::Failed(e)
        }
    }
}

fn normalize(raw: RawExtraction, max_tags: usize) -> Extraction {
    let mut tags = Vec::new();
    for tag in strings(raw.tags).iter().filter_map(|t| normalize_tag(t)) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.truncate(max_tags);

    Extraction {
        tags,
        people: dedup_entities(strings(raw.people)),
        places: dedup_entities(strings(raw.places)),
        projects: dedup_entities(strings(raw.projects)),
        themes: dedup_entities(strings(raw.themes)),
    }
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Lowercase, strip `#`, join words with `-`, keep `[a-z0-9-_]`, and bound the length.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let lower = raw.trim().trim_start_matches('#').to_lowercase();
    let joined = lower.split_whitespace().collect::<Vec<_>>().join("-");
    let tag: String = joined
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let len = tag.chars().count();
    (MIN_TAG_CHARS..=MAX_TAG_CHARS).contains(&len).then_some(tag)
}

/// Trim, drop empties and commas, and dedupe case-insensitively keeping the first spelling.
pub fn dedup_entities(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let cleaned = item.replace(',', " ");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            out.push(cleaned);
        }
    }
    out
}
