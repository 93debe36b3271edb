mod helpers;

use brain::analysis::aggregate::{
    collect_extractions, connection_counts, narrate, rank, render_report, FrequencyTable, Report,
};
use brain::config::AnalysisConfig;
use brain::entry::{Entry, EntryKind};
use brain::llm::LlmOutcome;
use helpers::{date, StubGateway, EXTRACTION_JSON, LONG_BODY};

fn linked_entry(day: &str, links: &str) -> Entry {
    let text = format!("## Brain Dump\n{LONG_BODY}\n\n## Memory Links\n{links}\n");
    Entry::new(date(day), EntryKind::Reflection, &text)
}

fn window() -> Vec<Entry> {
    let unlinked = Entry::new(
        date("2025-10-12"),
        EntryKind::Reflection,
        &format!("## Brain Dump\n{LONG_BODY}\n"),
    );
    let fourteenth = linked_entry(
        "2025-10-14",
        "**Semantic:**\n- [[2025-10-12]] high: same deadline\n**Topics:** #overwhelm #gratitude\n**People:** Sarah",
    );
    let fifteenth = linked_entry(
        "2025-10-15",
        "**Semantic:**\n- [[2025-10-14]] medium: follow-up\n- [[2025-09-01]] low: old news\n**Topics:** #Overwhelm\n**People:** sarah",
    );
    vec![unlinked, fourteenth, fifteenth]
}

#[tokio::test]
async fn stored_links_are_reused_and_only_unlinked_entries_are_extracted() {
    let gateway = StubGateway::new().reply("entity_extraction", EXTRACTION_JSON);
    let extractions = collect_extractions(&gateway, &window(), &AnalysisConfig::default()).await;

    assert_eq!(extractions.len(), 3);
    assert_eq!(gateway.calls("entity_extraction"), 1);
    assert_eq!(gateway.requests()[0].entry_date, Some(date("2025-10-12")));

    let table = rank(&extractions);
    assert_eq!(
        table.tags,
        vec![
            ("overwhelm".to_string(), 3),
            ("gratitude".to_string(), 1),
            ("self-doubt".to_string(), 1),
        ]
    );
    assert_eq!(table.people, vec![("Sarah".to_string(), 3)]);
    assert_eq!(table.projects, vec![("website redesign".to_string(), 1)]);
    assert!(table.places.is_empty());
}

#[tokio::test]
async fn failed_extraction_drops_only_that_entry() {
    let gateway = StubGateway::offline();
    let extractions = collect_extractions(&gateway, &window(), &AnalysisConfig::default()).await;
    assert_eq!(extractions.len(), 2);
    assert_eq!(gateway.total_calls(), 1);
}

#[test]
fn connections_count_both_ends_inside_the_window() {
    let counts = connection_counts(&window());
    assert_eq!(
        counts,
        vec![
            (date("2025-10-14"), 2),
            (date("2025-10-15"), 1),
            (date("2025-10-12"), 1),
        ]
    );
}

#[tokio::test]
async fn narrative_failure_keeps_the_table() {
    let table = FrequencyTable {
        tags: vec![("overwhelm".into(), 3)],
        ..Default::default()
    };

    let offline = StubGateway::offline();
    let outcome = narrate(&offline, &table, "the last 30 days").await;
    assert!(matches!(outcome, LlmOutcome::Failed(_)));

    let report = Report {
        start: Some(date("2025-09-16")),
        end: Some(date("2025-10-15")),
        days: 30,
        entry_count: 3,
        table,
        connections: Vec::new(),
        summary: if outcome.is_parsed() {
            Some(outcome.into_value())
        } else {
            None
        },
    };
    let text = render_report(&report);
    assert!(text.contains("**Period:** 2025-09-16 to 2025-10-15 (30 days)"));
    assert!(text.contains("- #overwhelm (3 entries)"));
    assert!(!text.contains("## Summary"));
}

#[tokio::test]
async fn narrative_is_requested_only_for_a_non_empty_table() {
    let gateway = StubGateway::new().reply("pattern_summary", "  You keep coming back to work stress.  ");

    let empty = narrate(&gateway, &FrequencyTable::default(), "the last 7 days").await;
    assert!(matches!(empty, LlmOutcome::Skipped(_)));
    assert_eq!(gateway.total_calls(), 0);

    let table = FrequencyTable {
        tags: vec![("overwhelm".into(), 3)],
        people: vec![("Sarah".into(), 2)],
        ..Default::default()
    };
    let outcome = narrate(&gateway, &table, "the last 7 days").await;
    assert_eq!(outcome.into_value(), "You keep coming back to work stress.");

    let request = &gateway.requests()[0];
    assert_eq!(request.operation, "pattern_summary");
    assert!(request.user.contains("overwhelm (3)"));
    assert!(request.user.contains("Sarah (2)"));
}
