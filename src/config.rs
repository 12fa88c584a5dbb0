//! Configuration management for docweave
//!
//! Settings live in ~/.config/docweave/config.json, with a
//! project-local docweave.json override and command-line flags on top.
//! The loaded `Config` is built once in `main` and passed by reference;
//! there is no global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File or directory to process.
    pub path: PathBuf,
    /// Recurse into subdirectories when `path` is a directory.
    pub include_subfolders: bool,
    /// File names (not paths) excluded from batch runs.
    pub ignore: Vec<String>,
    /// Which generation backend to use: "openrouter" or "replay".
    pub backend: String,
    /// Model identifier passed to the backend; also names output
    /// directories and replay response files.
    pub model: String,
    pub verbose: bool,
    /// Maximum characters per docstring line.
    pub max_line_length: usize,
    /// Verbosity levels are 0-5 and flow straight into the prompt.
    pub class_docstrings_verbosity_level: u8,
    pub function_docstrings_verbosity_level: u8,
    pub example_verbosity_level: u8,
    /// Report what would be written without writing anything.
    pub dry_run: bool,
    /// Skip the files_processed.log bookkeeping entirely.
    pub disable_processed_log: bool,
    /// Directory of canned responses for the replay backend.
    pub responses_dir: PathBuf,
    /// Plaintext key fallback; OPENROUTER_API_KEY takes precedence.
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            include_subfolders: false,
            ignore: Vec::new(),
            backend: "openrouter".to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            verbose: false,
            max_line_length: 79,
            class_docstrings_verbosity_level: 5,
            function_docstrings_verbosity_level: 2,
            example_verbosity_level: 3,
            dry_run: false,
            disable_processed_log: false,
            responses_dir: PathBuf::from("responses"),
            api_key: None,
        }
    }
}

const LOCAL_CONFIG_NAME: &str = "docweave.json";

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docweave"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return defaults.
    ///
    /// A project-local docweave.json in the current directory wins over
    /// the per-user file. A corrupted file is preserved as a `.corrupt`
    /// backup and defaults are loaded.
    pub fn load() -> Self {
        let local = PathBuf::from(LOCAL_CONFIG_NAME);
        if local.is_file() {
            if let Some(config) = Self::load_from(&local) {
                return config;
            }
        }
        if let Some(path) = Self::config_path() {
            if let Some(config) = Self::load_from(&path) {
                return config;
            }
        }
        Self::default()
    }

    fn load_from(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                preserve_corrupt_config(path, &content);
                eprintln!(
                    "  Warning: Config file {} was corrupted ({}). A backup was saved and defaults were loaded.",
                    path.display(),
                    err
                );
                None
            }
        }
    }

    /// Save config to the per-user location.
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Resolve the OpenRouter API key: environment first, config second.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone()
    }

    /// The config file location for display.
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/docweave/config.json".to_string())
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.backend, "openrouter");
        assert_eq!(config.max_line_length, 79);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let parsed: Config =
            serde_json::from_str(r#"{"backend": "replay", "model": "canned"}"#).unwrap();
        assert_eq!(parsed.backend, "replay");
        assert_eq!(parsed.model, "canned");
        assert_eq!(parsed.max_line_length, 79);
    }

    #[test]
    fn test_corrupt_config_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        assert!(Config::load_from(&path).is_none());
        assert!(dir.path().join("config.json.corrupt").exists());
    }
}
