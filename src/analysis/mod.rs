//! LLM-assisted analysis of entries and the deterministic logic around it.

pub mod aggregate;
pub mod extract;
pub mod linker;
pub mod prompts;
pub mod similarity;
pub mod tasks;
