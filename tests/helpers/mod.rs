#![allow(dead_code)]

use async_trait::async_trait;
use brain::entry::store::EntryStore;
use brain::entry::{reflection_template, Entry, EntryKind};
use brain::llm::{Completion, GatewayError, LlmGateway, LlmRequest};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

/// Deterministic gateway: one fixed reply per operation, every request recorded.
///
/// Operations without a scripted reply fail with `GatewayError::Unavailable`.
#[derive(Default)]
pub struct StubGateway {
    replies: HashMap<String, String>,
    offline: bool,
    requests: Mutex<Vec<LlmRequest>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call and connection check fails.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn reply(mut self, operation: &str, text: &str) -> Self {
        self.replies.insert(operation.to_string(), text.to_string());
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmGateway for StubGateway {
    async fn generate(&self, request: &LlmRequest) -> Result<Completion, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.offline {
            return Err(GatewayError::Transport {
                provider: "stub".into(),
                message: "connection refused".into(),
            });
        }
        match self.replies.get(&request.operation) {
            Some(text) => Ok(Completion {
                text: text.clone(),
                model: "stub-model".into(),
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
            None => Err(GatewayError::Unavailable(format!(
                "no scripted reply for {}",
                request.operation
            ))),
        }
    }

    async fn check_connection(&self) -> Result<(), GatewayError> {
        if self.offline {
            Err(GatewayError::Unavailable("stub offline".into()))
        } else {
            Ok(())
        }
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Store with separate diary and planner directories under a temp dir.
pub fn temp_store() -> (TempDir, EntryStore) {
    let tmp = TempDir::new().unwrap();
    let diary = tmp.path().join("diary");
    let planner = tmp.path().join("planner");
    std::fs::create_dir_all(&diary).unwrap();
    std::fs::create_dir_all(&planner).unwrap();
    let store = EntryStore::new(diary, planner);
    (tmp, store)
}

/// Write a reflection entry made from the usual template plus `body` as the Brain Dump.
pub fn write_reflection(store: &EntryStore, day: &str, body: &str) -> Entry {
    let mut text = reflection_template(&["How was your day?".to_string()]);
    text.push_str(body);
    text.push('\n');
    let entry = Entry::new(date(day), EntryKind::Reflection, &text);
    store.write(&entry).unwrap();
    entry
}

pub fn write_plan(store: &EntryStore, day: &str, text: &str) -> Entry {
    let entry = Entry::new(date(day), EntryKind::Plan, text);
    store.write(&entry).unwrap();
    entry
}

pub fn read_text(store: &EntryStore, day: &str, kind: EntryKind) -> String {
    std::fs::read_to_string(store.path_for(date(day), kind)).unwrap()
}

/// Brain Dump long enough to pass the default content gate.
pub const LONG_BODY: &str = "Spent the afternoon on the website redesign with Sarah. \
The deadline is stressing me out and I keep second-guessing the layout.";

pub const EXTRACTION_JSON: &str = r##"{"tags": ["Overwhelm", "#self doubt"], "people": ["Sarah"], "places": [], "projects": ["website redesign"], "themes": ["stress"]}"##;
