//! Generation backends for documentation content
//!
//! A backend accepts a prompt template plus named substitutions and
//! returns either generated text or a typed overflow signal. The rest
//! of the pipeline never looks at transport details; overflow detection
//! happens here, at the backend seam, not by substring-sniffing
//! upstream.

pub mod client;
pub mod parse;
pub mod prompts;
pub mod replay;

use crate::config::Config;
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Outcome of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    /// Raw text expected to contain one embedded JSON object.
    Content(String),
    /// The supplied input exceeded the backend's processing capacity;
    /// the orchestrator reacts by re-chunking, this is not an error.
    Overflow,
}

/// Classify raw backend text, honoring the legacy overflow marker
/// convention some backends embed in the body instead of signalling
/// through metadata.
pub(crate) fn reply_from_content(content: String) -> BackendReply {
    if content.contains("length") && content.contains("exceed") {
        return BackendReply::Overflow;
    }
    BackendReply::Content(content)
}

/// One of several interchangeable generation backends.
pub enum Backend {
    OpenRouter(client::OpenRouterClient),
    Replay(replay::ReplayBackend),
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend.as_str() {
            "openrouter" => Ok(Backend::OpenRouter(client::OpenRouterClient::new(config)?)),
            "replay" => Ok(Backend::Replay(replay::ReplayBackend::new(config))),
            other => bail!("unsupported backend '{other}' (expected 'openrouter' or 'replay')"),
        }
    }

    /// Send a formatted prompt to the backend.
    pub async fn ask(
        &self,
        template: &str,
        replacements: &HashMap<&str, String>,
    ) -> Result<BackendReply> {
        match self {
            Backend::OpenRouter(client) => {
                let prompt = prompts::format_prompt(template, replacements);
                client.ask(&prompt).await
            }
            Backend::Replay(replay) => replay.ask(replacements),
        }
    }

    /// Request documentation for one source fragment.
    pub async fn ask_for_docstrings(
        &self,
        source: &str,
        config: &Config,
        retry_count: u32,
    ) -> Result<BackendReply> {
        let mut replacements = HashMap::new();
        replacements.insert("source_code", source.to_string());
        replacements.insert("max_line_length", config.max_line_length.to_string());
        replacements.insert(
            "class_docstrings_verbosity_level",
            config.class_docstrings_verbosity_level.to_string(),
        );
        replacements.insert(
            "function_docstrings_verbosity_level",
            config.function_docstrings_verbosity_level.to_string(),
        );
        replacements.insert(
            "example_verbosity_level",
            config.example_verbosity_level.to_string(),
        );
        replacements.insert("retry_count", retry_count.to_string());
        self.ask(prompts::DOCSTRINGS, &replacements).await
    }

    /// Ask for a corrected response after a malformed one.
    pub async fn ask_retry(&self, last_error: &str, retry_count: u32) -> Result<BackendReply> {
        let mut replacements = HashMap::new();
        replacements.insert("last_error_message", last_error.to_string());
        replacements.insert("retry_count", retry_count.to_string());
        self.ask(prompts::RETRY, &replacements).await
    }

    /// Ask for corrected example snippets for the failed classes only.
    pub async fn ask_retry_examples(&self, class_names: &[String]) -> Result<BackendReply> {
        let mut replacements = HashMap::new();
        replacements.insert("class_names", class_names.join(", "));
        replacements.insert("example_retry", "True".to_string());
        self.ask(prompts::RETRY_EXAMPLES, &replacements).await
    }

    /// Secondary single-pass request scoped to undocumented names.
    pub async fn ask_missing_docstrings(&self, names: &[String]) -> Result<BackendReply> {
        let mut replacements = HashMap::new();
        replacements.insert(
            "function_names",
            serde_json::to_string(names).unwrap_or_default(),
        );
        replacements.insert("ask_missing", "True".to_string());
        replacements.insert("retry_count", "1".to_string());
        self.ask(prompts::MISSING_DOCSTRINGS, &replacements).await
    }
}
