//! OpenRouter-compatible chat completions client
//!
//! Non-streaming request/response with automatic retry and exponential
//! backoff for rate limits. Context overflow is reported as a typed
//! [`BackendReply::Overflow`], never as an error.

use super::{reply_from_content, BackendReply};
use crate::config::Config;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SYSTEM_PROMPT: &str =
    "You are a documentation generator. Follow the output format in the user message exactly.";

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 2000;
const BACKOFF_MULTIPLIER: u64 = 2;

/// Inactivity bound for a single request, measured at the socket.
const READ_TIMEOUT_SECS: u64 = 15;

const MAX_TOKENS: u32 = 4000;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    verbose: bool,
}

impl OpenRouterClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            anyhow!("No API key configured. Set OPENROUTER_API_KEY or add api_key to the config file.")
        })?;

        let http = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            verbose: config.verbose,
        })
    }

    pub async fn ask(&self, prompt: &str) -> Result<BackendReply> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let mut retry_count = 0;

        loop {
            let response = self
                .http
                .post(OPENROUTER_URL)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text)
                    .map_err(|e| anyhow!("failed to parse backend response: {e}\n{text}"))?;

                let choice = parsed
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("backend returned no choices"))?;

                // The model ran out of output budget mid-answer; treat
                // like context overflow so the orchestrator re-chunks.
                if choice.finish_reason.as_deref() == Some("length") {
                    return Ok(BackendReply::Overflow);
                }
                return Ok(reply_from_content(choice.message.content));
            }

            if is_context_overflow(&text) {
                return Ok(BackendReply::Overflow);
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let backoff_secs =
                    (INITIAL_BACKOFF_MS * BACKOFF_MULTIPLIER.pow(retry_count - 1)) / 1000;
                if self.verbose {
                    eprintln!(
                        "  Rate limited. Retrying in {}s (attempt {}/{})",
                        backoff_secs, retry_count, MAX_RETRIES
                    );
                }
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid API key. Check OPENROUTER_API_KEY.".to_string(),
                429 => format!(
                    "Rate limited after {} retries. Try again in a few minutes.",
                    retry_count
                ),
                500..=599 => format!(
                    "Backend server error ({status}). The service may be temporarily unavailable."
                ),
                _ => format!("API error {}: {}", status, crate::util::truncate(&text, 200)),
            };
            return Err(anyhow!("{error_msg}"));
        }
    }
}

/// Providers report context overflow as a 4xx error body rather than a
/// finish reason; recognize the common phrasings.
fn is_context_overflow(error_body: &str) -> bool {
    let lower = error_body.to_lowercase();
    lower.contains("context length") || (lower.contains("length") && lower.contains("exceed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_error_body_detected() {
        assert!(is_context_overflow(
            "{\"error\": \"This model's maximum context length is 8192 tokens\"}"
        ));
        assert!(is_context_overflow("input length would exceed the limit"));
        assert!(!is_context_overflow("{\"error\": \"invalid api key\"}"));
    }
}
