//! Reflection prompts for a new diary entry.
//!
//! Weekly-review days get more prompts over a longer look-back. Every failure
//! path ends in a usable list so that `diary create` can always write a template.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::linker::is_weekly_day;
use crate::config::AnalysisConfig;
use crate::entry::Entry;
use crate::llm::{LlmGateway, LlmRequest};

const DAILY_SYSTEM: &str = "You are a thoughtful journaling assistant. Generate reflective questions \
based on the user's recent diary entries.

Each question must:
- reference at least one specific entry using [[YYYY-MM-DD]] format
- build on a theme, question or situation from the referenced entry
- be personal and specific, not generic
- use plain text, no emojis

Each question must address a DIFFERENT topic from the entries (work, relationships, health, \
habits, hobbies, personal growth). Never ask two questions about the same event.

Put each question on its own line, numbered. Be concise.";

const WEEKLY_SYSTEM: &str = "You are a thoughtful journaling assistant. Generate weekly review \
questions based on the user's past week of diary entries.

Each question must:
- reference at least one specific entry using [[YYYY-MM-DD]] format
- help identify patterns across the week or reflect on progress and direction
- be personal and specific, not generic
- use plain text, no emojis

Cover a different area of life with every question; maximize diversity.

Put each question on its own line, numbered. Be concise.";

const DAILY_NO_CONTEXT: [&str; 3] = [
    "What are you thinking about today?",
    "What's on your mind?",
    "How are you feeling?",
];

const WEEKLY_NO_CONTEXT: [&str; 5] = [
    "What were the highlights of your week?",
    "What challenged you this week?",
    "What did you learn?",
    "What are you grateful for?",
    "What do you want to focus on next week?",
];

const DAILY_FALLBACK: [&str; 3] = [
    "What stood out to you recently?",
    "What are you thinking about?",
    "How are you feeling about things?",
];

const WEEKLY_FALLBACK: [&str; 5] = [
    "What were the key themes this week?",
    "What did you accomplish?",
    "What challenged you?",
    "What are you grateful for?",
    "What's ahead for next week?",
];

const DAILY_PAD: &str = "What else is on your mind?";
const WEEKLY_PAD: &str = "What else comes to mind?";

/// Prompts for the entry of `date`, given the entries of its look-back window.
pub async fn generate_prompts(
    gateway: &dyn LlmGateway,
    date: NaiveDate,
    recent: &[Entry],
    settings: &AnalysisConfig,
) -> Vec<String> {
    let weekly = is_weekly_day(date, settings);
    let (count, no_context, fallback, pad) = if weekly {
        (settings.weekly_prompt_count, &WEEKLY_NO_CONTEXT[..], &WEEKLY_FALLBACK[..], WEEKLY_PAD)
    } else {
        (settings.daily_prompt_count, &DAILY_NO_CONTEXT[..], &DAILY_FALLBACK[..], DAILY_PAD)
    };

    let context: Vec<String> = recent
        .iter()
        .filter(|e| e.date < date)
        .filter_map(|e| {
            let preview = e.preview(settings.preview_chars);
            (!preview.is_empty()).then(|| format!("[[{}]]: {preview}", e.date))
        })
        .collect();
    if context.is_empty() {
        debug!(%date, "no recent entries, using generic prompts");
        return fill(no_context, count, pad);
    }

    let (system, operation, temperature, max_tokens) = if weekly {
        (WEEKLY_SYSTEM, "weekly_prompts", 0.8, 500)
    } else {
        (DAILY_SYSTEM, "daily_prompts", 0.9, 300)
    };
    let user = format!(
        "Based on these diary entries, generate {count} reflection prompts, each on a different theme \
         and each with at least one [[YYYY-MM-DD]] backlink:\n\n{}",
        context.join("\n\n")
    );
    let request = LlmRequest::new(operation, system, user)
        .temperature(temperature)
        .max_tokens(max_tokens)
        .entry_date(date);

    match gateway.generate(&request).await {
        Ok(completion) => {
            let parsed = parse_prompts(&completion.text, count);
            if parsed.is_empty() {
                warn!(%date, "could not parse prompts from reply, using generic prompts");
                fill(fallback, count, pad)
            } else {
                debug!(%date, parsed = parsed.len(), weekly, "prompts generated");
                let mut prompts = parsed;
                prompts.resize(count, pad.to_string());
                prompts
            }
        }
        Err(e) => {
            warn!(%date, "prompt generation failed, using generic prompts: {e}");
            fill(fallback, count, pad)
        }
    }
}

/// `defaults` cut or padded to `count`.
fn fill(defaults: &[&str], count: usize, pad: &str) -> Vec<String> {
    let mut out: Vec<String> = defaults.iter().take(count).map(|s| s.to_string()).collect();
    out.resize(count, pad.to_string());
    out
}

/// Numbered or bulleted lines of a reply, without their markers, at most `max`.
pub fn parse_prompts(reply: &str, max: usize) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit() || c == '-'))
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | ' '))
                .trim()
                .trim_matches('*')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_and_bulleted_lines() {
        let reply = "Here are your prompts:\n1. How did [[2025-10-14]] go?\n2) What about Sam [[2025-10-13]]?\n- **Anything else from [[2025-10-12]]?**\n\nThanks!";
        assert_eq!(
            parse_prompts(reply, 5),
            vec![
                "How did [[2025-10-14]] go?",
                "What about Sam [[2025-10-13]]?",
                "Anything else from [[2025-10-12]]?",
            ]
        );
        assert_eq!(parse_prompts(reply, 1).len(), 1);
        assert!(parse_prompts("no list here", 3).is_empty());
    }

    #[test]
    fn fill_cuts_and_pads() {
        assert_eq!(fill(&DAILY_FALLBACK, 2, DAILY_PAD).len(), 2);
        let padded = fill(&DAILY_FALLBACK, 4, DAILY_PAD);
        assert_eq!(padded[3], DAILY_PAD);
    }
}
