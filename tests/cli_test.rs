mod helpers;

use brain::cli::{diary, plan};
use brain::config::BrainConfig;
use brain::entry::EntryKind;
use helpers::{date, read_text, temp_store, write_plan, write_reflection, LONG_BODY};
use std::path::Path;

/// Config over `root/diary` and `root/planner` with cost logging off.
fn config_for(root: &Path, provider: &str) -> BrainConfig {
    let mut config = BrainConfig::default();
    config.paths.diary_path = Some(root.join("diary").display().to_string());
    config.paths.planner_path = Some(root.join("planner").display().to_string());
    config.cost.enabled = false;
    config.llm.provider = provider.into();
    config.llm.azure.api_key = None;
    // nothing listens on port 1
    config.llm.ollama.base_url = "http://127.0.0.1:1".into();
    config.llm.timeout_secs = 5;
    config
}

#[tokio::test]
async fn linking_a_short_entry_never_contacts_the_model() {
    let (tmp, store) = temp_store();
    write_reflection(&store, "2025-10-15", "Tired.");
    let before = read_text(&store, "2025-10-15", EntryKind::Reflection);

    let config = config_for(tmp.path(), "ollama");
    diary::link(&config, date("2025-10-15")).await.unwrap();

    assert_eq!(read_text(&store, "2025-10-15", EntryKind::Reflection), before);
}

#[tokio::test]
async fn linking_a_substantial_entry_needs_a_reachable_model() {
    let (tmp, store) = temp_store();
    write_reflection(&store, "2025-10-15", LONG_BODY);
    let before = read_text(&store, "2025-10-15", EntryKind::Reflection);

    let config = config_for(tmp.path(), "ollama");
    let err = diary::link(&config, date("2025-10-15")).await.unwrap_err();

    assert!(err.to_string().contains("cannot reach"), "{err}");
    assert_eq!(read_text(&store, "2025-10-15", EntryKind::Reflection), before);
}

#[tokio::test]
async fn plan_without_reflection_carries_tasks_without_credentials() {
    let (tmp, store) = temp_store();
    write_plan(&store, "2025-10-14", "## Action Items\n- [ ] Renew passport\n- [x] Buy milk\n");

    let config = config_for(tmp.path(), "azure");
    plan::create(&config, date("2025-10-15")).await.unwrap();

    let text = read_text(&store, "2025-10-15", EntryKind::Plan);
    assert!(text.contains("- [ ] Renew passport"), "{text}");
    assert!(!text.contains("Buy milk"));
}

#[tokio::test]
async fn plan_with_short_reflection_skips_the_model() {
    let (tmp, store) = temp_store();
    write_plan(&store, "2025-10-14", "## Action Items\n- [ ] Renew passport\n");
    write_reflection(&store, "2025-10-14", "Long day.");

    let config = config_for(tmp.path(), "azure");
    plan::create(&config, date("2025-10-15")).await.unwrap();

    let text = read_text(&store, "2025-10-15", EntryKind::Plan);
    assert!(text.contains("- [ ] Renew passport"), "{text}");
}

#[tokio::test]
async fn plan_keeps_carried_tasks_when_credentials_are_missing() {
    let (tmp, store) = temp_store();
    write_plan(&store, "2025-10-14", "## Action Items\n- [ ] Renew passport\n");
    write_reflection(&store, "2025-10-14", LONG_BODY);

    let config = config_for(tmp.path(), "azure");
    plan::create(&config, date("2025-10-15")).await.unwrap();

    let text = read_text(&store, "2025-10-15", EntryKind::Plan);
    assert!(text.contains("- [ ] Renew passport"), "{text}");
}
