//! brain: a journaling CLI over plain markdown files.
//!
//! Daily reflection entries get LLM-generated prompts and a generated
//! `## Memory Links` section that links them to earlier entries; daily plans
//! carry unfinished tasks forward and pick up new ones from the previous
//! reflection.
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, TOML, `.env`, environment)
//! - [`entry`]: the markdown section model, entry files and tasks
//! - [`llm`]: the gateway trait and the Azure OpenAI / Ollama client
//! - [`analysis`]: extraction, linking, task planning, prompts and reports
//! - [`cost`] and [`db`]: the SQLite log of LLM calls and their cost
//! - [`search`]: the hosted notes index client
//! - [`cli`]: command handlers used by the `brain` binary

pub mod analysis;
pub mod cli;
pub mod config;
pub mod cost;
pub mod db;
pub mod entry;
pub mod llm;
pub mod search;
