//! Azure AI Search client for the notes index.
//!
//! Uses the REST API directly: `POST {endpoint}/indexes/{index}/docs/search`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::SearchSettings;

/// One matching note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteHit {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub category: String,
    pub file_path: String,
    pub score: f64,
    pub word_count: usize,
}

impl NoteHit {
    /// Build a hit from one document of the response, filling absent fields.
    fn from_document(doc: &Map<String, Value>) -> Self {
        let text = |key: &str, default: &str| {
            doc.get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let content = text("content", "");
        let word_count = doc
            .get("word_count")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or_else(|| content.split_whitespace().count());
        Self {
            id: text("id", ""),
            title: text("title", "Untitled"),
            source: text("source", "Unknown"),
            category: text("category", ""),
            file_path: text("file_path", ""),
            score: doc
                .get("@search.score")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            word_count,
            content,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    search: &'a str,
    top: usize,
    search_mode: &'static str,
    count: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    semantic_configuration: Option<&'static str>,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

pub struct NotesSearchClient {
    client: reqwest::Client,
    endpoint: String,
    index_name: String,
    api_version: String,
    api_key: String,
}

impl NotesSearchClient {
    pub fn new(settings: SearchSettings, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            index_name: settings.index_name,
            api_version: settings.api_version,
            api_key: settings.api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    /// Full-text search; `semantic` switches to the index's `default` semantic configuration.
    pub async fn search(&self, query: &str, top: usize, semantic: bool) -> Result<Vec<NoteHit>> {
        let body = SearchRequest {
            search: query,
            top,
            search_mode: "any",
            count: true,
            query_type: semantic.then_some("semantic"),
            semantic_configuration: semantic.then_some("default"),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach search service at {}", self.endpoint))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to read search response")?;
        if !status.is_success() {
            bail!(
                "search service returned {status}: {}",
                text.chars().take(200).collect::<String>()
            );
        }

        let hits = parse_hits(&text)?;
        info!(
            query,
            semantic,
            hits = hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "notes search"
        );
        Ok(hits)
    }

    /// Run a `*` query with `top=1`.
    pub async fn check_connection(&self) -> Result<()> {
        self.search("*", 1, false).await.map(|hits| {
            debug!(hits = hits.len(), "search connection ok");
        })
    }
}

fn parse_hits(body: &str) -> Result<Vec<NoteHit>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("search response was not valid JSON")?;
    Ok(response.value.iter().map(NoteHit::from_document).collect())
}
