mod helpers;

use brain::analysis::prompts::generate_prompts;
use brain::config::AnalysisConfig;
use brain::entry::{Entry, EntryKind};
use helpers::{date, temp_store, write_reflection, StubGateway, LONG_BODY};

fn recent() -> Vec<Entry> {
    vec![
        Entry::new(
            date("2025-10-14"),
            EntryKind::Reflection,
            &format!("## Brain Dump\n{LONG_BODY}\n"),
        ),
        Entry::new(
            date("2025-10-13"),
            EntryKind::Reflection,
            "## Brain Dump\nLong run by the river, legs felt heavy but my head was clear.\n",
        ),
    ]
}

#[tokio::test]
async fn daily_prompts_reference_recent_entries() {
    let gateway = StubGateway::new().reply(
        "daily_prompts",
        "1. How did the layout discussion with Sarah end after [[2025-10-14]]?\n\
         2. What made your head clear on the run in [[2025-10-13]]?\n\
         3. **What would make tomorrow lighter?**",
    );
    // 2025-10-15 is a Wednesday
    let prompts = generate_prompts(&gateway, date("2025-10-15"), &recent(), &AnalysisConfig::default()).await;

    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].starts_with("How did the layout"));
    assert_eq!(prompts[2], "What would make tomorrow lighter?");

    let request = &gateway.requests()[0];
    assert_eq!(request.operation, "daily_prompts");
    assert_eq!(request.temperature, 0.9);
    assert_eq!(request.entry_date, Some(date("2025-10-15")));
    assert!(request.user.contains("[[2025-10-14]]: Spent the afternoon"));
    assert!(request.user.contains("[[2025-10-13]]: Long run"));
}

#[tokio::test]
async fn offline_model_gives_generic_daily_prompts() {
    let gateway = StubGateway::offline();
    let prompts = generate_prompts(&gateway, date("2025-10-15"), &recent(), &AnalysisConfig::default()).await;
    assert_eq!(
        prompts,
        vec![
            "What stood out to you recently?",
            "What are you thinking about?",
            "How are you feeling about things?",
        ]
    );
    assert_eq!(gateway.total_calls(), 1);
}

#[tokio::test]
async fn unparseable_reply_gives_generic_prompts() {
    let gateway = StubGateway::new().reply("daily_prompts", "I'm not sure what to ask today.");
    let prompts = generate_prompts(&gateway, date("2025-10-15"), &recent(), &AnalysisConfig::default()).await;
    assert_eq!(prompts[0], "What stood out to you recently?");
    assert_eq!(prompts.len(), 3);
}

#[tokio::test]
async fn no_recent_entries_skips_the_model() {
    let gateway = StubGateway::new();
    let prompts = generate_prompts(&gateway, date("2025-10-15"), &[], &AnalysisConfig::default()).await;
    assert_eq!(prompts[0], "What are you thinking about today?");
    assert_eq!(prompts.len(), 3);
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn later_entries_are_not_context() {
    let gateway = StubGateway::new();
    let later = vec![Entry::new(
        date("2025-10-20"),
        EntryKind::Reflection,
        &format!("## Brain Dump\n{LONG_BODY}\n"),
    )];
    let prompts = generate_prompts(&gateway, date("2025-10-15"), &later, &AnalysisConfig::default()).await;
    assert_eq!(prompts[0], "What are you thinking about today?");
    assert_eq!(gateway.total_calls(), 0);
}

#[tokio::test]
async fn weekly_review_pads_a_short_reply() {
    let (_tmp, store) = temp_store();
    let entries = vec![
        write_reflection(&store, "2025-10-18", LONG_BODY),
        write_reflection(&store, "2025-10-13", "Long run by the river, legs felt heavy but my head was clear."),
    ];
    let gateway = StubGateway::new().reply(
        "weekly_prompts",
        "1. What pattern links [[2025-10-13]] and [[2025-10-18]]?\n- How has the website work changed since [[2025-10-13]]?",
    );
    // 2025-10-19 is a Sunday
    let prompts = generate_prompts(&gateway, date("2025-10-19"), &entries, &AnalysisConfig::default()).await;

    assert_eq!(prompts.len(), 5);
    assert_eq!(prompts[0], "What pattern links [[2025-10-13]] and [[2025-10-18]]?");
    assert_eq!(prompts[1], "How has the website work changed since [[2025-10-13]]?");
    assert!(prompts[2..].iter().all(|p| p == "What else comes to mind?"));

    let request = &gateway.requests()[0];
    assert_eq!(request.operation, "weekly_prompts");
    assert_eq!(request.temperature, 0.8);
    assert_eq!(request.max_tokens, 500);
}

#[tokio::test]
async fn weekly_review_without_context_uses_weekly_defaults() {
    let gateway = StubGateway::new();
    let prompts = generate_prompts(&gateway, date("2025-10-19"), &[], &AnalysisConfig::default()).await;
    assert_eq!(prompts.len(), 5);
    assert_eq!(prompts[0], "What were the highlights of your week?");
    assert_eq!(prompts[4], "What do you want to focus on next week?");
}
