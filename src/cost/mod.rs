//! Append-only log of LLM calls with cost summaries.

pub mod pricing;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

pub use pricing::Pricing;

/// Average days per month, for monthly projections.
const DAYS_PER_MONTH: f64 = 30.44;

/// One LLM call, as handed to [`CostTracker::record`].
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub operation: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub elapsed_seconds: f64,
    pub entry_date: Option<NaiveDate>,
    pub metadata: serde_json::Value,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `[today - days, today]`.
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("invalid month: {year}-{month:02}"))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| anyhow!("invalid month: {year}-{month:02}"))?;
        Ok(Self {
            start,
            end: next - Duration::days(1),
        })
    }

    /// Parse `YYYY-MM`.
    pub fn parse_month(text: &str) -> Result<Self> {
        let Some((y, m)) = text.split_once('-') else {
            bail!("invalid month {text:?}, expected YYYY-MM");
        };
        let year: i32 = y.parse().with_context(|| format!("invalid year in {text:?}"))?;
        let month: u32 = m.parse().with_context(|| format!("invalid month in {text:?}"))?;
        Self::month(year, month)
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub cost: f64,
    pub tokens: i64,
    pub requests: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub total: Totals,
    pub by_operation: BTreeMap<String, Totals>,
    pub by_day: BTreeMap<NaiveDate, Totals>,
}

/// A stored row, for export.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRow {
    pub timestamp: String,
    pub operation: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub elapsed_seconds: f64,
    pub estimated_cost: f64,
    pub entry_date: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Records LLM usage in SQLite and answers cost questions.
pub struct CostTracker {
    conn: Mutex<Connection>,
    pricing: Pricing,
}

impl CostTracker {
    pub fn open(path: impl AsRef<Path>, pricing: Pricing) -> Result<Self> {
        let conn = crate::db::open_database(path)?;
        Ok(Self::with_connection(conn, pricing))
    }

    pub fn in_memory(pricing: Pricing) -> Result<Self> {
        let conn = crate::db::open_memory_database()?;
        Ok(Self::with_connection(conn, pricing))
    }

    fn with_connection(conn: Connection, pricing: Pricing) -> Self {
        Self {
            conn: Mutex::new(conn),
            pricing,
        }
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("cost database lock poisoned"))
    }

    /// Record a call made now. Returns the estimated cost in USD.
    pub fn record(&self, record: &UsageRecord) -> Result<f64> {
        self.record_at(record, Local::now().naive_local())
    }

    pub fn record_at(&self, record: &UsageRecord, timestamp: NaiveDateTime) -> Result<f64> {
        let cost = self.pricing.calculate_cost(
            &record.model,
            record.prompt_tokens,
            record.completion_tokens,
        );
        let total = i64::from(record.prompt_tokens) + i64::from(record.completion_tokens);
        let metadata = if record.metadata.is_null() {
            None
        } else {
            Some(record.metadata.to_string())
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO llm_usage (
                timestamp, operation, model, prompt_tokens, completion_tokens,
                total_tokens, elapsed_seconds, estimated_cost, entry_date, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
                record.operation,
                record.model,
                record.prompt_tokens,
                record.completion_tokens,
                total,
                record.elapsed_seconds,
                cost,
                record.entry_date.map(|d| d.format("%Y-%m-%d").to_string()),
                metadata,
            ],
        )
        .context("failed to insert usage record")?;

        tracing::debug!(operation = %record.operation, cost_usd = cost, "usage recorded");
        Ok(cost)
    }

    pub fn summary(&self, range: DateRange) -> Result<CostSummary> {
        let conn = self.lock()?;
        let start = range.start.to_string();
        let end = range.end.to_string();

        let total = conn.query_row(
            "SELECT COALESCE(SUM(estimated_cost), 0.0), COALESCE(SUM(total_tokens), 0), COUNT(*)
             FROM llm_usage WHERE date(timestamp) BETWEEN ?1 AND ?2",
            params![start, end],
            |row| {
                Ok(Totals {
                    cost: row.get(0)?,
                    tokens: row.get(1)?,
                    requests: row.get(2)?,
                })
            },
        )?;

        let mut by_operation = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT operation, SUM(estimated_cost), SUM(total_tokens), COUNT(*)
             FROM llm_usage WHERE date(timestamp) BETWEEN ?1 AND ?2
             GROUP BY operation",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Totals {
                    cost: row.get(1)?,
                    tokens: row.get(2)?,
                    requests: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (op, totals) = row?;
            by_operation.insert(op, totals);
        }

        let mut by_day = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT date(timestamp), SUM(estimated_cost), SUM(total_tokens), COUNT(*)
             FROM llm_usage WHERE date(timestamp) BETWEEN ?1 AND ?2
             GROUP BY date(timestamp)",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Totals {
                    cost: row.get(1)?,
                    tokens: row.get(2)?,
                    requests: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (day, totals) = row?;
            if let Ok(day) = NaiveDate::parse_from_str(&day, "%Y-%m-%d") {
                by_day.insert(day, totals);
            }
        }

        Ok(CostSummary {
            total,
            by_operation,
            by_day,
        })
    }

    /// Cost per day over `[today - days, today]`, zero-filled.
    pub fn trends(&self, days: u32, today: NaiveDate) -> Result<Vec<(NaiveDate, f64)>> {
        let range = DateRange::last_days(days, today);
        let summary = self.summary(range)?;
        Ok(range
            .start
            .iter_days()
            .take_while(|d| *d <= range.end)
            .map(|d| (d, summary.by_day.get(&d).map_or(0.0, |t| t.cost)))
            .collect())
    }

    /// Daily average over the last `sample_days` days, scaled to a month.
    pub fn estimate_monthly(&self, sample_days: u32, today: NaiveDate) -> Result<f64> {
        if sample_days == 0 {
            return Ok(0.0);
        }
        let summary = self.summary(DateRange::last_days(sample_days, today))?;
        if summary.total.requests == 0 {
            return Ok(0.0);
        }
        Ok(summary.total.cost / f64::from(sample_days) * DAYS_PER_MONTH)
    }

    pub fn export(&self, range: DateRange) -> Result<Vec<UsageRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, operation, model, prompt_tokens, completion_tokens, total_tokens,
                    elapsed_seconds, estimated_cost, entry_date, metadata
             FROM llm_usage WHERE date(timestamp) BETWEEN ?1 AND ?2
             ORDER BY timestamp",
        )?;
        let rows = stmt
            .query_map(params![range.start.to_string(), range.end.to_string()], |row| {
                let metadata: Option<String> = row.get(9)?;
                Ok(UsageRow {
                    timestamp: row.get(0)?,
                    operation: row.get(1)?,
                    model: row.get(2)?,
                    prompt_tokens: row.get(3)?,
                    completion_tokens: row.get(4)?,
                    total_tokens: row.get(5)?,
                    elapsed_seconds: row.get(6)?,
                    estimated_cost: row.get(7)?,
                    entry_date: row.get(8)?,
                    metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Current month as a [`DateRange`].
pub fn current_month(today: NaiveDate) -> Result<DateRange> {
    DateRange::month(today.year(), today.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn usage(operation: &str, prompt: u32, completion: u32) -> UsageRecord {
        UsageRecord {
            operation: operation.into(),
            model: "gpt-4o".into(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            elapsed_seconds: 1.5,
            entry_date: Some(date("2025-10-14")),
            metadata: serde_json::json!({ "temperature": 0.3 }),
        }
    }

    #[test]
    fn record_returns_estimated_cost() {
        let tracker = CostTracker::in_memory(Pricing::default()).unwrap();
        let cost = tracker
            .record_at(&usage("semantic_backlinks", 1000, 1000), at("2025-10-15T08:00:00"))
            .unwrap();
        assert!((cost - 0.09).abs() < 1e-9);
    }

    #[test]
    fn summary_groups_by_operation_and_day() {
        let tracker = CostTracker::in_memory(Pricing::default()).unwrap();
        tracker.record_at(&usage("semantic_backlinks", 1000, 0), at("2025-10-14T08:00:00")).unwrap();
        tracker.record_at(&usage("semantic_backlinks", 1000, 0), at("2025-10-15T08:00:00")).unwrap();
        tracker.record_at(&usage("task_extraction", 0, 1000), at("2025-10-15T09:00:00")).unwrap();
        tracker.record_at(&usage("task_extraction", 0, 1000), at("2025-09-01T09:00:00")).unwrap();

        let summary = tracker
            .summary(DateRange::last_days(7, date("2025-10-15")))
            .unwrap();
        assert_eq!(summary.total.requests, 3);
        assert_eq!(summary.total.tokens, 3000);
        assert_eq!(summary.by_operation["semantic_backlinks"].requests, 2);
        assert_eq!(summary.by_day[&date("2025-10-15")].requests, 2);
        assert!((summary.total.cost - (0.03 + 0.03 + 0.06)).abs() < 1e-9);
    }

    #[test]
    fn trends_are_zero_filled() {
        let tracker = CostTracker::in_memory(Pricing::default()).unwrap();
        tracker.record_at(&usage("daily_prompts", 1000, 0), at("2025-10-13T08:00:00")).unwrap();

        let trends = tracker.trends(3, date("2025-10-15")).unwrap();
        assert_eq!(trends.len(), 4);
        assert_eq!(trends[0], (date("2025-10-12"), 0.0));
        assert!((trends[1].1 - 0.03).abs() < 1e-9);
        assert_eq!(trends[3].0, date("2025-10-15"));
    }

    #[test]
    fn monthly_estimate_scales_daily_average() {
        let tracker = CostTracker::in_memory(Pricing::default()).unwrap();
        assert_eq!(tracker.estimate_monthly(7, date("2025-10-15")).unwrap(), 0.0);

        tracker.record_at(&usage("daily_prompts", 7000, 0), at("2025-10-15T08:00:00")).unwrap();
        let estimate = tracker.estimate_monthly(7, date("2025-10-15")).unwrap();
        assert!((estimate - 0.03 * DAYS_PER_MONTH).abs() < 1e-9);
    }

    #[test]
    fn export_keeps_metadata_json() {
        let tracker = CostTracker::in_memory(Pricing::default()).unwrap();
        tracker.record_at(&usage("entity_extraction", 10, 5), at("2025-10-15T08:00:00")).unwrap();
        let rows = tracker
            .export(DateRange::last_days(1, date("2025-10-15")))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_tokens, 15);
        assert_eq!(rows[0].entry_date.as_deref(), Some("2025-10-14"));
        assert_eq!(rows[0].metadata.as_ref().unwrap()["temperature"], 0.3);
    }

    #[test]
    fn month_range_handles_december_and_leap_years() {
        let dec = DateRange::parse_month("2024-12").unwrap();
        assert_eq!(dec.end, date("2024-12-31"));
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.days(), 29);
        assert!(DateRange::parse_month("2024-13").is_err());
        assert!(DateRange::parse_month("October").is_err());
    }
}
