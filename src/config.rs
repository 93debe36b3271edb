use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration problems that must stop a command before any entry is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be set (in .env, the environment, or config.toml)")]
    MissingPath { key: &'static str },
    #[error("{key} does not exist: {}", path.display())]
    PathNotFound { key: &'static str, path: PathBuf },
    #[error("{key} must be set when LLM_PROVIDER={provider}")]
    MissingCredential {
        key: &'static str,
        provider: &'static str,
    },
    #[error("{key} must be one of [{allowed}], got: {value}")]
    InvalidChoice {
        key: &'static str,
        allowed: &'static str,
        value: String,
    },
    #[error("{key} must be set to use notes search")]
    MissingSearchSetting { key: &'static str },
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BrainConfig {
    pub paths: PathsConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub cost: CostConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PathsConfig {
    pub diary_path: Option<String>,
    pub planner_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub timeout_secs: u64,
    pub azure: AzureConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AzureConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// Knobs for the linking, extraction, and planning pipeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Brain Dump bodies shorter than this (in characters) are never sent to the LLM.
    pub min_content_chars: usize,
    pub daily_window_days: u32,
    pub weekly_window_days: u32,
    /// Day of week that widens the window, e.g. `"sunday"`.
    pub weekly_day: String,
    pub daily_max_links: usize,
    pub weekly_max_links: usize,
    pub daily_prompt_count: usize,
    pub weekly_prompt_count: usize,
    pub max_tags: usize,
    /// Word-set Jaccard cutoff above which two tasks are the same task.
    pub dedup_threshold: f64,
    pub preview_chars: usize,
    pub target_preview_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CostConfig {
    pub enabled: bool,
    pub db_path: String,
    pub pricing: BTreeMap<String, ModelPrice>,
}

/// USD per 1K tokens for one model family.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub index_name: String,
    pub api_version: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "azure".into(),
            timeout_secs: 300,
            azure: AzureConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            deployment: "gpt-4o".into(),
            api_version: "2024-02-15-preview".into(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.1".into(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            daily_window_days: 3,
            weekly_window_days: 7,
            weekly_day: "sunday".into(),
            daily_max_links: 3,
            weekly_max_links: 5,
            daily_prompt_count: 3,
            weekly_prompt_count: 5,
            max_tags: 5,
            dedup_threshold: 0.08,
            preview_chars: 400,
            target_preview_chars: 500,
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        let db_path = default_brain_dir()
            .join("costs.db")
            .to_string_lossy()
            .into_owned();
        Self {
            enabled: true,
            db_path,
            pricing: default_pricing(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            index_name: "notes".into(),
            api_version: "2023-11-01".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            log_file: None,
        }
    }
}

/// Built-in Azure OpenAI list prices (USD per 1K tokens).
pub fn default_pricing() -> BTreeMap<String, ModelPrice> {
    BTreeMap::from([
        ("gpt-4o".to_string(), ModelPrice { input: 0.03, output: 0.06 }),
        ("gpt-4o-mini".to_string(), ModelPrice { input: 0.0015, output: 0.006 }),
        ("gpt-4".to_string(), ModelPrice { input: 0.03, output: 0.06 }),
        ("gpt-35-turbo".to_string(), ModelPrice { input: 0.0015, output: 0.002 }),
    ])
}

/// Environment variables that override individual price entries.
const PRICE_OVERRIDES: &[(&str, &str, bool)] = &[
    ("AZURE_GPT4O_INPUT_PRICE", "gpt-4o", true),
    ("AZURE_GPT4O_OUTPUT_PRICE", "gpt-4o", false),
    ("AZURE_GPT4O_MINI_INPUT_PRICE", "gpt-4o-mini", true),
    ("AZURE_GPT4O_MINI_OUTPUT_PRICE", "gpt-4o-mini", false),
    ("AZURE_GPT4_INPUT_PRICE", "gpt-4", true),
    ("AZURE_GPT4_OUTPUT_PRICE", "gpt-4", false),
    ("AZURE_GPT35_TURBO_INPUT_PRICE", "gpt-35-turbo", true),
    ("AZURE_GPT35_TURBO_OUTPUT_PRICE", "gpt-35-turbo", false),
];

/// Validated entry directories.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaths {
    pub diary: PathBuf,
    pub planner: PathBuf,
}

/// Provider settings after credential checks.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmSettings {
    Azure {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

/// Validated Azure AI Search settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
    pub api_version: String,
}

/// Returns `~/.brain/`
pub fn default_brain_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".brain")
}

/// Returns the default config file path: `~/.brain/config.toml`
pub fn default_config_path() -> PathBuf {
    default_brain_dir().join("config.toml")
}

/// Load a `.env` file into the process environment without overriding variables
/// that are already set. Returns the file that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("BRAIN_ENV_FILE") {
        let path = expand_tilde(&explicit);
        if dotenvy::from_path(&path).is_ok() {
            return Some(path);
        }
    }

    let candidates = [
        std::env::current_dir().ok().map(|d| d.join(".env")),
        dirs::home_dir().map(|h| h.join(".config").join("brain").join(".env")),
    ];
    for candidate in candidates.into_iter().flatten() {
        if candidate.is_file() && dotenvy::from_path(&candidate).is_ok() {
            return Some(candidate);
        }
    }

    dotenvy::dotenv().ok()
}

impl BrainConfig {
    /// Load `.env`, then the TOML file (if it exists), then apply env var overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_file = load_dotenv();
        let config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load_from(default_config_path())?,
        };
        if let Some(file) = env_file {
            debug!(path = %file.display(), "loaded .env");
        }
        Ok(config)
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BrainConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Apply overrides from any key lookup (the process environment in production).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("DIARY_PATH") {
            self.paths.diary_path = Some(val);
        }
        if let Some(val) = lookup("PLANNER_PATH") {
            self.paths.planner_path = Some(val);
        }
        if let Some(val) = lookup("LLM_PROVIDER") {
            self.llm.provider = val;
        }
        if let Some(val) = lookup("AZURE_OPENAI_API_KEY") {
            self.llm.azure.api_key = Some(val);
        }
        if let Some(val) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.llm.azure.endpoint = Some(val);
        }
        if let Some(val) = lookup("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.azure.deployment = val;
        }
        if let Some(val) = lookup("AZURE_OPENAI_API_VERSION") {
            self.llm.azure.api_version = val;
        }
        if let Some(val) = lookup("OLLAMA_BASE_URL") {
            self.llm.ollama.base_url = val;
        }
        if let Some(val) = lookup("OLLAMA_MODEL") {
            self.llm.ollama.model = val;
        }
        if let Some(val) = lookup("BRAIN_COST_DB_PATH") {
            self.cost.db_path = val;
        }
        if let Some(val) = lookup("AZURE_SEARCH_ENDPOINT") {
            self.search.endpoint = Some(val);
        }
        if let Some(val) = lookup("AZURE_SEARCH_API_KEY") {
            self.search.api_key = Some(val);
        }
        if let Some(val) = lookup("AZURE_SEARCH_INDEX_NAME") {
            self.search.index_name = val;
        }
        if let Some(val) = lookup("BRAIN_LOG_LEVEL") {
            self.logging.log_level = val.to_lowercase();
        }
        if let Some(val) = lookup("BRAIN_LOG_FILE") {
            self.logging.log_file = Some(val);
        }

        for (key, model, is_input) in PRICE_OVERRIDES {
            let Some(price) = lookup(key).and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            let entry = self
                .cost
                .pricing
                .entry(model.to_string())
                .or_insert(ModelPrice { input: 0.0, output: 0.0 });
            if *is_input {
                entry.input = price;
            } else {
                entry.output = price;
            }
        }
    }

    /// Resolve and check the diary and planner directories.
    ///
    /// The planner directory defaults to the diary directory when unset.
    pub fn validate_paths(&self) -> Result<ResolvedPaths, ConfigError> {
        let diary = required_dir("DIARY_PATH", self.paths.diary_path.as_deref())?;
        let planner = match self.paths.planner_path.as_deref() {
            Some(p) => required_dir("PLANNER_PATH", Some(p))?,
            None => diary.clone(),
        };
        self.analysis.weekly_weekday()?;
        Ok(ResolvedPaths { diary, planner })
    }

    /// Provider settings, failing when the selected provider lacks credentials.
    pub fn llm_settings(&self) -> Result<LlmSettings, ConfigError> {
        match self.llm.provider.to_lowercase().as_str() {
            "azure" => {
                let api_key = self.llm.azure.api_key.clone().ok_or(
                    ConfigError::MissingCredential {
                        key: "AZURE_OPENAI_API_KEY",
                        provider: "azure",
                    },
                )?;
                let endpoint = self.llm.azure.endpoint.clone().ok_or(
                    ConfigError::MissingCredential {
                        key: "AZURE_OPENAI_ENDPOINT",
                        provider: "azure",
                    },
                )?;
                Ok(LlmSettings::Azure {
                    api_key,
                    endpoint,
                    deployment: self.llm.azure.deployment.clone(),
                    api_version: self.llm.azure.api_version.clone(),
                })
            }
            "ollama" => Ok(LlmSettings::Ollama {
                base_url: self.llm.ollama.base_url.clone(),
                model: self.llm.ollama.model.clone(),
            }),
            other => Err(ConfigError::InvalidChoice {
                key: "LLM_PROVIDER",
                allowed: "azure, ollama",
                value: other.to_string(),
            }),
        }
    }

    pub fn search_settings(&self) -> Result<SearchSettings, ConfigError> {
        let endpoint = self
            .search
            .endpoint
            .clone()
            .ok_or(ConfigError::MissingSearchSetting { key: "AZURE_SEARCH_ENDPOINT" })?;
        let api_key = self
            .search
            .api_key
            .clone()
            .ok_or(ConfigError::MissingSearchSetting { key: "AZURE_SEARCH_API_KEY" })?;
        Ok(SearchSettings {
            endpoint,
            api_key,
            index_name: self.search.index_name.clone(),
            api_version: self.search.api_version.clone(),
        })
    }

    /// Resolve the cost database path, expanding `~` if needed.
    pub fn resolved_cost_db_path(&self) -> PathBuf {
        expand_tilde(&self.cost.db_path)
    }
}

impl AnalysisConfig {
    /// The configured weekly review day.
    pub fn weekly_weekday(&self) -> Result<Weekday, ConfigError> {
        self.weekly_day
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidChoice {
                key: "analysis.weekly_day",
                allowed: "monday..sunday",
                value: self.weekly_day.clone(),
            })
    }
}

fn required_dir(key: &'static str, value: Option<&str>) -> Result<PathBuf, ConfigError> {
    let raw = value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingPath { key })?;
    let path = expand_tilde(raw);
    if !path.exists() {
        return Err(ConfigError::PathNotFound { key, path });
    }
    Ok(path)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
