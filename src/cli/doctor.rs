//! CLI `doctor` command: check configuration, directories, the LLM provider and the cost log.

use anyhow::Result;

use crate::config::{default_config_path, BrainConfig};
use crate::db;
use crate::llm::create_gateway;

/// Print a health report. Problems are reported, not returned as errors.
pub async fn doctor(config: &BrainConfig, config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Brain Health Report");
    println!("===================");
    println!();

    let config_file = config_path
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let present = if config_file.exists() { "" } else { " (not found, using defaults)" };
    println!("Config file:       {}{present}", config_file.display());

    println!();
    println!("Directories:");
    match config.validate_paths() {
        Ok(paths) => {
            println!("  Diary:           {}", paths.diary.display());
            println!("  Planner:         {}", paths.planner.display());
        }
        Err(e) => println!("  ERROR: {e}"),
    }

    println!();
    println!("LLM provider:      {}", config.llm.provider);
    match create_gateway(config, None) {
        Ok(gateway) => {
            println!("  Model:           {}", gateway.model());
            match gateway.check_connection().await {
                Ok(()) => println!("  Connection:      OK"),
                Err(e) => println!("  Connection:      FAILED ({e})"),
            }
        }
        Err(e) => println!("  ERROR: {e:#}"),
    }

    println!();
    let db_path = config.resolved_cost_db_path();
    if !config.cost.enabled {
        println!("Cost tracking:     disabled");
    } else if !db_path.exists() {
        println!("Cost database:     not created yet ({})", db_path.display());
    } else {
        let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
        println!("Cost database:     {}", db_path.display());
        println!("File size:         {}", format_bytes(file_size));
        match db::open_database(&db_path).and_then(|conn| db::check_database_health(&conn)) {
            Ok(report) => {
                println!("Schema version:    {}", report.schema_version);
                println!("Usage rows:        {}", report.usage_rows);
                if let (Some(first), Some(last)) = (&report.first_recorded, &report.last_recorded) {
                    println!("Recorded:          {first} to {last}");
                }
                if report.integrity_ok {
                    println!("Integrity check:   PASSED");
                } else {
                    println!("Integrity check:   FAILED ({})", report.integrity_details);
                    println!("  The cost log is optional; move the file aside to start a new one.");
                }
            }
            Err(e) => println!("  ERROR: failed to open (may be corrupt): {e:#}"),
        }
    }

    println!();
    match config.search_settings() {
        Ok(settings) => println!("Notes search:      {} / {}", settings.endpoint, settings.index_name),
        Err(_) => println!("Notes search:      not configured"),
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
