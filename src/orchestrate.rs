//! Chunk-escalation loop for oversized sources
//!
//! A whole file is sent as one request first. When the backend reports
//! context overflow, the file is re-split into twice as many
//! boundary-safe chunks and every chunk is sent again from scratch;
//! each chunk request is stateless. Escalation gives up when a chunk
//! can shrink no further.

use crate::chunk;
use crate::config::Config;
use crate::llm::{Backend, BackendReply};
use anyhow::{bail, Result};

/// Content generated for one chunk, paired with the text it covered.
#[derive(Debug, Clone)]
pub struct ChunkReply {
    pub content: String,
    pub source_chunk: String,
}

/// Request documentation for `source`, escalating chunk counts on
/// overflow: iteration `i` sends `2^i` chunks.
///
/// Overflow on any chunk abandons the whole iteration; hard backend
/// errors propagate immediately.
pub async fn send_in_parts(
    backend: &Backend,
    source: &str,
    config: &Config,
    retry_count: u32,
) -> Result<Vec<ChunkReply>> {
    let line_count = source.matches('\n').count().max(1);
    let mut iteration = 0u32;

    'escalate: loop {
        let num_parts = 1usize << iteration;
        if num_parts > line_count {
            bail!("source still exceeds backend capacity at {num_parts} chunks");
        }

        let chunks = chunk::split_source(source, num_parts);
        let mut replies = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            if chunk.line_count() == 0 {
                continue;
            }
            if config.verbose && num_parts > 1 {
                eprintln!(
                    "  Sending lines {}..{} ({} of {} chunks)",
                    chunk.start_line,
                    chunk.end_line,
                    replies.len() + 1,
                    num_parts
                );
            }
            match backend
                .ask_for_docstrings(&chunk.text, config, retry_count)
                .await?
            {
                BackendReply::Content(content) => replies.push(ChunkReply {
                    content,
                    source_chunk: chunk.text.clone(),
                }),
                BackendReply::Overflow => {
                    if config.verbose {
                        eprintln!("  Context overflow at {num_parts} chunk(s), re-splitting");
                    }
                    iteration += 1;
                    continue 'escalate;
                }
            }
        }

        return Ok(replies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn replay_config(dir: &std::path::Path) -> Config {
        Config {
            backend: "replay".to_string(),
            model: "canned".to_string(),
            responses_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_single_chunk_reply() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("canned.response.json"),
            r#"{"docstrings": {"global_functions": {"f": "doc"}}}"#,
        )
        .unwrap();
        let config = replay_config(dir.path());
        let backend = Backend::from_config(&config).unwrap();

        let replies = send_in_parts(&backend, "def f():\n    pass\n", &config, 1)
            .await
            .unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].source_chunk, "def f():\n    pass\n");
        assert!(replies[0].content.contains("docstrings"));
    }

    #[tokio::test]
    async fn test_persistent_overflow_exhausts_escalation() {
        // A backend that always overflows forces 1, 2, 4... chunks until
        // the split can shrink no further, then the loop gives up.
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("canned.response.json"),
            "input length would exceed the context window",
        )
        .unwrap();
        let config = replay_config(dir.path());
        let backend = Backend::from_config(&config).unwrap();

        let result = send_in_parts(&backend, "x = 1\ny = 2\nz = 3\nw = 4\n", &config, 1).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("capacity"));
    }

    #[tokio::test]
    async fn test_missing_replay_file_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = replay_config(dir.path());
        let backend = Backend::from_config(&config).unwrap();
        assert!(send_in_parts(&backend, "x = 1\n", &config, 1).await.is_err());
    }
}
