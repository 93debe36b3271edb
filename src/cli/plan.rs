//! `brain plan create`.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use tracing::warn;

use super::{open_cost_tracker, spinner};
use crate::analysis::tasks::{extract_tasks, TaskPlan};
use crate::config::BrainConfig;
use crate::entry::store::EntryStore;
use crate::entry::tasks::unchecked_tasks;
use crate::entry::{plan_template, Entry, EntryKind};
use crate::llm::create_gateway;

/// Write the plan for `date` from the previous day's plan and reflection.
///
/// An unreachable or unconfigured model only costs the extracted tasks; carried
/// tasks are always written. The model is not contacted without a substantial reflection.
pub async fn create(config: &BrainConfig, date: NaiveDate) -> Result<()> {
    let paths = config.validate_paths()?;
    let store = EntryStore::from_paths(&paths);
    if store.exists(date, EntryKind::Plan) {
        println!(
            "Plan for {date} already exists: {}",
            store.path_for(date, EntryKind::Plan).display()
        );
        return Ok(());
    }

    let yesterday = date - Duration::days(1);
    let carried = store
        .read(yesterday, EntryKind::Plan)?
        .map(|plan| unchecked_tasks(&plan))
        .unwrap_or_default();
    let reflection = store
        .read(yesterday, EntryKind::Reflection)?
        .filter(|r| r.has_substantial_content(config.analysis.min_content_chars));

    let plan = match reflection {
        None => TaskPlan::carried_only(carried),
        Some(reflection) => match create_gateway(config, open_cost_tracker(config)) {
            Ok(gateway) => {
                let pb = spinner(format!("Extracting tasks from {yesterday}..."));
                let plan = extract_tasks(
                    gateway.as_ref(),
                    Some(&reflection),
                    carried,
                    &config.analysis,
                )
                .await;
                pb.finish_and_clear();
                plan
            }
            Err(e) => {
                warn!(error = %e, "no LLM gateway for task extraction");
                eprintln!("Task extraction unavailable ({e}); keeping carried-forward tasks only");
                TaskPlan::carried_only(carried)
            }
        },
    };

    if let Some(e) = &plan.failure {
        eprintln!("Task extraction failed ({e}); keeping carried-forward tasks only");
    }

    let entry = Entry::new(date, EntryKind::Plan, &plan_template(&plan.tasks));
    let path = store.write(&entry)?;
    println!("Created plan {}", entry.filename());
    println!("Location: {}", path.display());
    println!(
        "  {} pending from plan, {} extracted from diary",
        plan.carried, plan.extracted
    );
    for task in &plan.tasks {
        println!("  {}", task.render());
    }
    Ok(())
}
