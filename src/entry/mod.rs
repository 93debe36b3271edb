//! Diary and plan entries: the markdown section model, file naming, and templates.
//!
//! A [`Document`] keeps the exact bytes of every section so that a rewrite of one
//! section never disturbs the text of another.

pub mod store;
pub mod tasks;

use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::analysis::linker::MemoryLinks;

pub const BRAIN_DUMP: &str = "Brain Dump";
pub const MEMORY_LINKS: &str = "Memory Links";
pub const REFLECTION_PROMPTS: &str = "Reflection Prompts";
pub const ACTION_ITEMS: &str = "Action Items";

static BACKLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid regex"));

/// The two kinds of dated entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    /// Ordered so that a plan sorts before the reflection of the same day.
    Plan,
    Reflection,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Plan => "plan",
            EntryKind::Reflection => "reflection",
        }
    }

    /// File name for an entry of this kind on `date`.
    pub fn filename(&self, date: NaiveDate) -> String {
        match self {
            EntryKind::Reflection => format!("{}.md", date.format("%Y-%m-%d")),
            EntryKind::Plan => format!("{}-plan.md", date.format("%Y-%m-%d")),
        }
    }

    /// Wiki-link target for an entry of this kind on `date` (`2025-10-14` or `2025-10-14-plan`).
    pub fn link_target(&self, date: NaiveDate) -> String {
        match self {
            EntryKind::Reflection => date.format("%Y-%m-%d").to_string(),
            EntryKind::Plan => format!("{}-plan", date.format("%Y-%m-%d")),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Section {
    /// The heading line exactly as written, including its newline when present.
    heading: String,
    title: String,
    body: String,
}

/// A markdown file split on level-2 headings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    preamble: String,
    sections: Vec<Section>,
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut doc = Document::default();
        for line in text.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);
            if let Some(title) = bare.strip_prefix("## ") {
                doc.sections.push(Section {
                    heading: line.to_string(),
                    title: title.trim().to_string(),
                    body: String::new(),
                });
                continue;
            }
            match doc.sections.last_mut() {
                Some(section) => section.body.push_str(line),
                None => doc.preamble.push_str(line),
            }
        }
        doc
    }

    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        for section in &self.sections {
            out.push_str(&section.heading);
            out.push_str(&section.body);
        }
        out
    }

    pub fn section_titles(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.title.as_str()).collect()
    }

    pub fn has_section(&self, title: &str) -> bool {
        self.find(title).is_some()
    }

    /// Body of the named section, trimmed and without trailing `---` separators.
    pub fn section_text(&self, title: &str) -> Option<String> {
        let section = &self.sections[self.find(title)?];
        Some(strip_separators(&section.body).to_string())
    }

    /// Replace the body of `title`, or append it as a new trailing section.
    ///
    /// An existing section keeps the separator lines (`---` and blanks) that followed it.
    pub fn set_section(&mut self, title: &str, body: &str) {
        let body = body.trim_end();
        if let Some(idx) = self.find(title) {
            let section = &mut self.sections[idx];
            let tail = separator_tail(&section.body).to_string();
            section.body = format!("{body}\n{tail}");
            return;
        }

        let rendered = self.render();
        let padding = if rendered.is_empty() || rendered.ends_with("\n\n") {
            ""
        } else if rendered.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        match self.sections.last_mut() {
            Some(last) => last.body.push_str(padding),
            None => self.preamble.push_str(padding),
        }
        self.sections.push(Section {
            heading: format!("## {title}\n"),
            title: title.to_string(),
            body: format!("{body}\n"),
        });
    }

    /// Full text with the named sections left out, trimmed.
    fn text_without(&self, excluded: &[&str]) -> String {
        let mut out = self.preamble.clone();
        for section in &self.sections {
            if excluded.iter().any(|t| t.eq_ignore_ascii_case(&section.title)) {
                continue;
            }
            out.push_str(&section.heading);
            out.push_str(&section.body);
        }
        strip_separators(&out).to_string()
    }

    fn find(&self, title: &str) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.title.eq_ignore_ascii_case(title))
    }
}

fn is_separator_line(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t == "---"
}

/// The trailing run of blank and `---` lines of a section body.
fn separator_tail(body: &str) -> &str {
    let mut cut = body.len();
    for line in body.split_inclusive('\n').rev() {
        if !is_separator_line(line) {
            break;
        }
        cut -= line.len();
    }
    let tail = &body[cut..];
    if tail.contains("---") {
        tail
    } else {
        ""
    }
}

fn strip_separators(text: &str) -> &str {
    let mut s = text.trim();
    while let Some(rest) = s.strip_suffix("---") {
        s = rest.trim_end();
    }
    s
}

/// One dated entry with its parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub document: Document,
}

impl Entry {
    pub fn new(date: NaiveDate, kind: EntryKind, text: &str) -> Self {
        Self {
            date,
            kind,
            document: Document::parse(text),
        }
    }

    pub fn filename(&self) -> String {
        self.kind.filename(self.date)
    }

    pub fn text(&self) -> String {
        self.document.render()
    }

    /// The user-authored free text of the entry.
    ///
    /// Falls back to everything outside the generated sections when the file has
    /// no `## Brain Dump` heading.
    pub fn brain_dump(&self) -> String {
        match self.document.section_text(BRAIN_DUMP) {
            Some(text) => text,
            None => self
                .document
                .text_without(&[REFLECTION_PROMPTS, MEMORY_LINKS, ACTION_ITEMS]),
        }
    }

    pub fn has_substantial_content(&self, min_chars: usize) -> bool {
        self.brain_dump().chars().count() >= min_chars
    }

    /// Every `[[...]]` target in the entry, in document order.
    pub fn backlinks(&self) -> Vec<String> {
        BACKLINK_RE
            .captures_iter(&self.text())
            .map(|c| c[1].to_string())
            .collect()
    }

    /// The parsed Memory Links section, if the entry has one.
    pub fn memory_links(&self) -> Option<MemoryLinks> {
        self.document
            .section_text(MEMORY_LINKS)
            .map(|body| MemoryLinks::parse(&body))
    }

    /// First `max_chars` characters of the Brain Dump.
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.brain_dump(), max_chars)
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// New reflection entry: numbered prompts, a separator, and an empty Brain Dump.
pub fn reflection_template(prompts: &[String]) -> String {
    let mut out = format!("## {REFLECTION_PROMPTS}\n");
    for (i, prompt) in prompts.iter().enumerate() {
        out.push_str(&format!("**{}. {}**\n\n", i + 1, prompt));
    }
    out.push_str(&format!("---\n\n## {BRAIN_DUMP}\n"));
    out
}

/// New plan entry with one checkbox per task, or a single empty checkbox.
pub fn plan_template(tasks: &[tasks::Task]) -> String {
    let mut out = format!("## {ACTION_ITEMS}\n");
    if tasks.is_empty() {
        out.push_str("- [ ] \n");
    }
    for task in tasks {
        out.push_str(&task.render());
        out.push('\n');
    }
    out
}
