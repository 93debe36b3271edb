//! `brain notes ...` commands against the hosted notes index.

use anyhow::{bail, Result};
use std::time::Duration;

use super::{one_line, spinner};
use crate::config::BrainConfig;
use crate::search::NotesSearchClient;

const PREVIEW_CHARS: usize = 80;

fn client(config: &BrainConfig) -> Result<NotesSearchClient> {
    let settings = config.search_settings()?;
    NotesSearchClient::new(settings, Duration::from_secs(config.llm.timeout_secs))
}

pub async fn search(
    config: &BrainConfig,
    query: &str,
    top: usize,
    semantic: bool,
    detailed: bool,
) -> Result<()> {
    let client = client(config)?;
    let pb = spinner(format!("Searching for '{query}'..."));
    let result = client.search(query, top, semantic).await;
    pb.finish_and_clear();
    let hits = result?;

    if hits.is_empty() {
        println!("No results found for '{query}'");
        return Ok(());
    }

    let kind = if semantic { "Semantic" } else { "Text" };
    println!("{kind} search results for '{query}' ({} found)", hits.len());
    println!();

    if detailed {
        for (i, hit) in hits.iter().enumerate() {
            println!("{}. Note from {}", i + 1, hit.title);
            println!("   Category: {}  Source: {}", hit.category, hit.source);
            println!("   Score: {:.2}  Words: {}", hit.score, hit.word_count);
            if !hit.file_path.is_empty() {
                println!("   File: {}", hit.file_path);
            }
            println!("   ---");
            for line in hit.content.lines() {
                println!("   {line}");
            }
            println!();
        }
        return Ok(());
    }

    println!("{:>3}  {:<30} {:<12} {:>6} {:>6}  Preview", "#", "Book", "Category", "Words", "Score");
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>3}  {:<30} {:<12} {:>6} {:>6.2}  {}",
            i + 1,
            one_line(&hit.title, 30),
            one_line(&hit.category, 12),
            hit.word_count,
            hit.score,
            one_line(&hit.content, PREVIEW_CHARS)
        );
    }
    println!();
    println!("Use --detailed to see full content");
    Ok(())
}

pub async fn status(config: &BrainConfig) -> Result<()> {
    let client = client(config)?;
    println!("Notes search configuration");
    println!("  Endpoint: {}", client.endpoint());
    println!("  Index:    {}", client.index_name());

    let pb = spinner("Testing connection...");
    let checked = client.check_connection().await;
    pb.finish_and_clear();
    match checked {
        Ok(()) => {
            println!("Connection successful");
            Ok(())
        }
        Err(e) => bail!("connection failed: {e:#}"),
    }
}
