//! Date-keyed markdown file store.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Entry, EntryKind};
use crate::config::ResolvedPaths;

/// Reads and writes entries under the diary and planner directories.
#[derive(Debug, Clone)]
pub struct EntryStore {
    diary_dir: PathBuf,
    planner_dir: PathBuf,
}

impl EntryStore {
    pub fn new(diary_dir: impl Into<PathBuf>, planner_dir: impl Into<PathBuf>) -> Self {
        Self {
            diary_dir: diary_dir.into(),
            planner_dir: planner_dir.into(),
        }
    }

    pub fn from_paths(paths: &ResolvedPaths) -> Self {
        Self::new(&paths.diary, &paths.planner)
    }

    pub fn dir_for(&self, kind: EntryKind) -> &Path {
        match kind {
            EntryKind::Reflection => &self.diary_dir,
            EntryKind::Plan => &self.planner_dir,
        }
    }

    pub fn path_for(&self, date: NaiveDate, kind: EntryKind) -> PathBuf {
        self.dir_for(kind).join(kind.filename(date))
    }

    pub fn exists(&self, date: NaiveDate, kind: EntryKind) -> bool {
        self.path_for(date, kind).is_file()
    }

    /// Read one entry. A missing file is `Ok(None)`, not an error.
    pub fn read(&self, date: NaiveDate, kind: EntryKind) -> Result<Option<Entry>> {
        let path = self.path_for(date, kind);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read entry {}", path.display()))?;
        Ok(Some(Entry::new(date, kind, &text)))
    }

    /// Rewrite the whole file through a temp file and a rename.
    pub fn write(&self, entry: &Entry) -> Result<PathBuf> {
        let dir = self.dir_for(entry.kind);
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        let path = self.path_for(entry.date, entry.kind);
        let tmp_path = dir.join(format!(".{}.tmp", entry.filename()));
        std::fs::write(&tmp_path, entry.text())
            .with_context(|| format!("failed to write temp file {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to move entry into place at {}", path.display()))?;

        debug!(path = %path.display(), kind = %entry.kind, "entry written");
        Ok(path)
    }

    /// Reflection entries dated within `[today - days, today]`, newest first.
    ///
    /// Files whose names are not `YYYY-MM-DD.md` are ignored.
    pub fn list_entries(&self, days: u32, today: NaiveDate) -> Result<Vec<Entry>> {
        if !self.diary_dir.is_dir() {
            return Ok(Vec::new());
        }
        let cutoff = today - Duration::days(i64::from(days));

        let read_dir = std::fs::read_dir(&self.diary_dir).with_context(|| {
            format!("failed to list diary directory {}", self.diary_dir.display())
        })?;

        let mut dates = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.context("failed to read directory entry")?;
            let name = dir_entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".md")) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if date >= cutoff && date <= today {
                dates.push(date);
            }
        }
        dates.sort_unstable_by(|a, b| b.cmp(a));

        let mut entries = Vec::with_capacity(dates.len());
        for date in dates {
            match self.read(date, EntryKind::Reflection) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!(%date, "skipping unreadable entry: {e:#}"),
            }
        }
        Ok(entries)
    }

    /// Existing reflection entries for `dates` with at least `min_chars` of Brain Dump.
    ///
    /// Missing and near-empty days are silently absent; order follows `dates`.
    pub fn entries_for_dates(&self, dates: &[NaiveDate], min_chars: usize) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for &date in dates {
            if let Some(entry) = self.read(date, EntryKind::Reflection)? {
                if entry.has_substantial_content(min_chars) {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }
}

/// The `n` calendar days before `from`, newest first.
pub fn past_calendar_days(from: NaiveDate, n: u32) -> Vec<NaiveDate> {
    (1..=i64::from(n))
        .map(|i| from - Duration::days(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store(tmp: &TempDir) -> EntryStore {
        EntryStore::new(tmp.path().join("diary"), tmp.path().join("plans"))
    }

    #[test]
    fn missing_entry_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.read(date("2025-10-15"), EntryKind::Reflection).unwrap().is_none());
        assert!(!store.exists(date("2025-10-15"), EntryKind::Reflection));
    }

    #[test]
    fn write_then_read_uses_kind_directory() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let plan = Entry::new(date("2025-10-15"), EntryKind::Plan, "## Action Items\n- [ ] x\n");
        let path = store.write(&plan).unwrap();

        assert_eq!(path, tmp.path().join("plans").join("2025-10-15-plan.md"));
        let back = store.read(date("2025-10-15"), EntryKind::Plan).unwrap().unwrap();
        assert_eq!(back.text(), plan.text());
        assert!(!store.exists(date("2025-10-15"), EntryKind::Reflection));
        // no temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("plans")).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn list_entries_filters_by_window_and_name() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let dir = tmp.path().join("diary");
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["2025-10-15.md", "2025-10-13.md", "2025-09-01.md", "2025-10-16.md", "notes.md", "2025-10-14-plan.md"] {
            std::fs::write(dir.join(name), "## Brain Dump\nhello\n").unwrap();
        }

        let entries = store.list_entries(7, date("2025-10-15")).unwrap();
        let dates: Vec<_> = entries.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![date("2025-10-15"), date("2025-10-13")]);
    }

    #[test]
    fn past_calendar_days_newest_first() {
        assert_eq!(
            past_calendar_days(date("2025-10-15"), 3),
            vec![date("2025-10-14"), date("2025-10-13"), date("2025-10-12")]
        );
        assert!(past_calendar_days(date("2025-10-15"), 0).is_empty());
    }

    #[test]
    fn entries_for_dates_skips_gaps_and_short_entries() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let long = "## Brain Dump\nA long enough entry about the garden and the tomatoes.\n";
        store.write(&Entry::new(date("2025-10-14"), EntryKind::Reflection, long)).unwrap();
        store.write(&Entry::new(date("2025-10-12"), EntryKind::Reflection, "## Brain Dump\nhi\n")).unwrap();

        let dates = past_calendar_days(date("2025-10-15"), 3);
        let entries = store.entries_for_dates(&dates, 20).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, date("2025-10-14"));
    }
}
