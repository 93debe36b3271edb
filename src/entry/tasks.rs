//! Checkbox tasks with provenance backlinks.

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use super::{Entry, EntryKind};

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s+\[([ xX])\]\s?(.*)$").expect("valid regex"));

static PROVENANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\(from \[\[(\d{4}-\d{2}-\d{2})(-plan)?\]\]\)\s*$").expect("valid regex")
});

/// Where a task came from.
///
/// Orders by date, and a plan before the reflection of the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Provenance {
    pub date: NaiveDate,
    pub kind: EntryKind,
}

impl Provenance {
    pub fn new(date: NaiveDate, kind: EntryKind) -> Self {
        Self { date, kind }
    }

    pub fn of(entry: &Entry) -> Self {
        Self::new(entry.date, entry.kind)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(from [[{}]])", self.kind.link_target(self.date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub description: String,
    pub provenance: Provenance,
    pub checked: bool,
}

impl Task {
    pub fn new(description: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            description: description.into(),
            provenance,
            checked: false,
        }
    }

    /// Parse a `- [ ] text (from [[date]])` line.
    ///
    /// Lines without a provenance suffix get `default` as their provenance.
    /// Returns `None` for non-checkbox lines and empty descriptions.
    pub fn parse_line(line: &str, default: Provenance) -> Option<Task> {
        let caps = CHECKBOX_RE.captures(line)?;
        let checked = !caps[1].trim().is_empty();
        let rest = caps[2].trim_end();

        let (description, provenance) = match PROVENANCE_RE.captures(rest) {
            Some(p) => {
                let date = NaiveDate::parse_from_str(&p[1], "%Y-%m-%d").ok()?;
                let kind = if p.get(2).is_some() {
                    EntryKind::Plan
                } else {
                    EntryKind::Reflection
                };
                let start = p.get(0).map_or(rest.len(), |m| m.start());
                (&rest[..start], Provenance::new(date, kind))
            }
            None => (rest, default),
        };

        let description = description.trim();
        if description.is_empty() {
            return None;
        }
        Some(Task {
            description: description.to_string(),
            provenance,
            checked,
        })
    }

    pub fn render(&self) -> String {
        let mark = if self.checked { 'x' } else { ' ' };
        format!("- [{mark}] {} {}", self.description, self.provenance)
    }
}

/// Unchecked tasks of a plan entry, the candidates for carry-forward.
pub fn unchecked_tasks(entry: &Entry) -> Vec<Task> {
    let default = Provenance::of(entry);
    entry
        .text()
        .lines()
        .filter_map(|line| Task::parse_line(line, default))
        .filter(|task| !task.checked)
        .collect()
}
