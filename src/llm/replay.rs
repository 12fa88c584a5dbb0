//! File playback backend
//!
//! Replays canned responses from a directory instead of reaching a
//! network service. The file chosen depends on the request context
//! carried in the substitutions: retry attempts, example corrections,
//! and missing-docstring requests each map to their own file name, so a
//! whole pipeline run can be replayed deterministically. Used by tests
//! and for offline debugging of response handling.

use super::{reply_from_content, BackendReply};
use crate::config::Config;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub struct ReplayBackend {
    dir: PathBuf,
    model: String,
}

impl ReplayBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.responses_dir.clone(),
            model: config.model.clone(),
        }
    }

    pub fn ask(&self, replacements: &HashMap<&str, String>) -> Result<BackendReply> {
        let path = self.dir.join(self.response_file_name(replacements));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("no replay response at {}", path.display()))?;
        Ok(reply_from_content(text))
    }

    fn response_file_name(&self, replacements: &HashMap<&str, String>) -> String {
        let flag = |key: &str| replacements.get(key).map(String::as_str) == Some("True");

        if flag("ask_missing") {
            return format!("{}.missing.json", self.model);
        }
        if flag("example_retry") {
            return format!("{}.example.json", self.model);
        }
        let retry_count = replacements
            .get("retry_count")
            .map(String::as_str)
            .unwrap_or("1");
        // The first attempt has no suffix; retries are numbered.
        let suffix = if retry_count == "1" { "" } else { retry_count };
        format!("{}.response{}.json", self.model, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with(dir: &std::path::Path) -> ReplayBackend {
        ReplayBackend {
            dir: dir.to_path_buf(),
            model: "canned".to_string(),
        }
    }

    #[test]
    fn test_file_name_routing() {
        let backend = backend_with(std::path::Path::new("."));

        let mut replacements: HashMap<&str, String> = HashMap::new();
        replacements.insert("retry_count", "1".to_string());
        assert_eq!(
            backend.response_file_name(&replacements),
            "canned.response.json"
        );

        replacements.insert("retry_count", "2".to_string());
        assert_eq!(
            backend.response_file_name(&replacements),
            "canned.response2.json"
        );

        replacements.insert("example_retry", "True".to_string());
        assert_eq!(
            backend.response_file_name(&replacements),
            "canned.example.json"
        );

        replacements.insert("ask_missing", "True".to_string());
        assert_eq!(
            backend.response_file_name(&replacements),
            "canned.missing.json"
        );
    }

    #[test]
    fn test_replay_reads_canned_response() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("canned.response.json"),
            "{\"docstrings\": {}}",
        )
        .unwrap();

        let backend = backend_with(dir.path());
        let reply = backend.ask(&HashMap::new()).unwrap();
        assert_eq!(
            reply,
            BackendReply::Content("{\"docstrings\": {}}".to_string())
        );
    }

    #[test]
    fn test_replay_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with(dir.path());
        assert!(backend.ask(&HashMap::new()).is_err());
    }
}
