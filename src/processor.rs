//! File processing pipeline
//!
//! Drives one source file through generation, validation, insertion,
//! example injection, and the completeness pass, then handles the
//! surrounding bookkeeping: the processed-file ledger, output placement,
//! and batch runs over directories.

use crate::config::Config;
use crate::docmap::{self, DocumentationMap, ValidationMode};
use crate::index::parser;
use crate::insert::{self, ExampleFailure};
use crate::llm::{Backend, BackendReply};
use crate::orchestrate;
use crate::spinner::Spinner;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// Append-only ledger of files already documented.
pub const FILES_PROCESSED_LOG: &str = "files_processed.log";

/// Total attempts for the generate-validate cycle and for example
/// correction.
const MAX_RETRY_LIMIT: u32 = 3;

/// Result of documenting one source text.
#[derive(Debug)]
pub struct ProcessedSource {
    pub text: String,
    pub example_failures: Vec<ExampleFailure>,
}

/// What happened to one file in a batch.
#[derive(Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Written(PathBuf),
    DryRun,
    Skipped,
}

/// Batch summary: counts plus per-file failures.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Run the full documentation pipeline over one source text.
pub async fn process_source(
    backend: &Backend,
    source: &str,
    config: &Config,
) -> Result<ProcessedSource> {
    let map = generate(backend, source, config).await?;

    let documented = insert::insert_docstrings(source, &map);
    let (documented, example_failures) =
        apply_examples(backend, &documented, &map, config).await;
    let documented = fill_missing(backend, &documented, config).await;

    Ok(ProcessedSource {
        text: documented,
        example_failures,
    })
}

/// Generate and validate a documentation map, retrying with the last
/// error message on malformed responses.
async fn generate(
    backend: &Backend,
    source: &str,
    config: &Config,
) -> Result<DocumentationMap> {
    let mut last_error = String::new();

    for attempt in 1..=MAX_RETRY_LIMIT {
        let contents: Vec<String> = if attempt == 1 {
            orchestrate::send_in_parts(backend, source, config, attempt)
                .await?
                .into_iter()
                .map(|reply| reply.content)
                .collect()
        } else {
            if config.verbose {
                eprintln!("  Response rejected ({last_error}), retry {attempt}/{MAX_RETRY_LIMIT}");
            }
            match backend.ask_retry(&last_error, attempt).await? {
                BackendReply::Content(content) => vec![content],
                BackendReply::Overflow => {
                    last_error = "retry response exceeded backend capacity".to_string();
                    continue;
                }
            }
        };

        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        match docmap::extract_docstrings(&refs, ValidationMode::Full, config.max_line_length) {
            Ok(map) => return Ok(map),
            Err(err) => last_error = err.to_string(),
        }
    }

    bail!("no usable response after {MAX_RETRY_LIMIT} attempts: {last_error}")
}

/// Inject class examples, asking the backend to correct snippets that
/// fail the syntax check. Successful injections are always kept;
/// exhausting the retries leaves the remaining failures in the report
/// rather than failing the file.
async fn apply_examples(
    backend: &Backend,
    source: &str,
    map: &DocumentationMap,
    config: &Config,
) -> (String, Vec<ExampleFailure>) {
    let mut examples = insert::collect_examples(map);
    let mut current = source.to_string();
    let mut failures = Vec::new();

    for attempt in 1..=MAX_RETRY_LIMIT {
        if examples.is_empty() {
            return (current, Vec::new());
        }

        let (updated, rejected) = insert::add_example_functions(&current, &examples);
        current = updated;
        failures = rejected;
        if failures.is_empty() || attempt == MAX_RETRY_LIMIT {
            break;
        }

        let failed_names: Vec<String> =
            failures.iter().map(|f| f.class_name.clone()).collect();
        if config.verbose {
            eprintln!(
                "  {} invalid example(s), asking for corrections ({}/{})",
                failed_names.len(),
                attempt,
                MAX_RETRY_LIMIT
            );
        }

        match corrected_examples(backend, &failed_names, config).await {
            Ok(corrected) => examples = corrected,
            Err(err) => {
                if config.verbose {
                    eprintln!("  Example correction failed: {err}");
                }
                break;
            }
        }
    }

    (current, failures)
}

async fn corrected_examples(
    backend: &Backend,
    failed_names: &[String],
    config: &Config,
) -> Result<Vec<(String, String)>> {
    let reply = backend.ask_retry_examples(failed_names).await?;
    let BackendReply::Content(content) = reply else {
        bail!("correction response exceeded backend capacity");
    };
    let map = docmap::extract_docstrings(
        &[content.as_str()],
        ValidationMode::ExamplesOnly,
        config.max_line_length,
    )?;
    let corrected: Vec<(String, String)> = insert::collect_examples(&map)
        .into_iter()
        .filter(|(name, _)| failed_names.contains(name))
        .collect();
    if corrected.is_empty() {
        bail!("correction response contained no examples for the failed classes");
    }
    Ok(corrected)
}

/// Completeness pass: list declarations still missing a docstring and
/// issue one follow-up request for them. Best-effort; any failure
/// returns the text unchanged.
async fn fill_missing(backend: &Backend, source: &str, config: &Config) -> String {
    let names = match parser::missing_docstrings(source) {
        Ok(names) if !names.is_empty() => names,
        Ok(_) => return source.to_string(),
        Err(err) => {
            if config.verbose {
                eprintln!("  Completeness scan skipped: {err}");
            }
            return source.to_string();
        }
    };

    if config.verbose {
        eprintln!("  {} declaration(s) still undocumented: {}", names.len(), names.join(", "));
    }

    let content = match backend.ask_missing_docstrings(&names).await {
        Ok(BackendReply::Content(content)) => content,
        Ok(BackendReply::Overflow) | Err(_) => return source.to_string(),
    };

    match docmap::extract_docstrings(
        &[content.as_str()],
        ValidationMode::MissingOnly,
        config.max_line_length,
    ) {
        Ok(map) => insert::insert_docstrings(source, &map),
        Err(err) => {
            if config.verbose {
                eprintln!("  Follow-up response rejected: {err}");
            }
            source.to_string()
        }
    }
}

/// Process one file on disk: ledger check, pipeline, output placement.
///
/// Output goes to a model-named sibling directory next to the input
/// file, leaving the original untouched.
pub async fn process_file(backend: &Backend, path: &Path, config: &Config) -> Result<FileOutcome> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid file name: {}", path.display()))?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    if !config.disable_processed_log && is_processed(parent, file_name)? {
        if config.verbose {
            eprintln!("  Skipping {file_name} (already processed)");
        }
        return Ok(FileOutcome::Skipped);
    }

    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let label = format!("Documenting {file_name}");
    let result = with_spinner(&label, !config.verbose, process_source(backend, &source, config))
        .await?;

    for failure in &result.example_failures {
        eprintln!(
            "  Warning: example for class '{}' dropped: {}",
            failure.class_name, failure.reason
        );
    }

    if config.dry_run {
        println!("--- {} (dry run) ---", path.display());
        println!("{}", result.text);
        return Ok(FileOutcome::DryRun);
    }

    let out_dir = parent.join(sanitize_model_name(&config.model));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let out_path = out_dir.join(file_name);
    fs::write(&out_path, &result.text)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    if !config.disable_processed_log {
        mark_processed(parent, file_name)?;
    }

    if !config.verbose {
        Spinner::new().finish_with_message(&format!("{} -> {}", file_name, out_path.display()));
    }

    Ok(FileOutcome::Written(out_path))
}

/// Process the configured path, whether a single file or a directory.
pub async fn process_path(backend: &Backend, config: &Config) -> Result<BatchReport> {
    let path = &config.path;
    let mut report = BatchReport::default();

    if path.is_file() {
        record_outcome(&mut report, path, process_file(backend, path, config).await);
        return Ok(report);
    }
    if !path.is_dir() {
        bail!("path does not exist: {}", path.display());
    }

    let max_depth = if config.include_subfolders {
        usize::MAX
    } else {
        1
    };

    for entry in WalkDir::new(path)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let entry_path = entry.path();
        if !entry.file_type().is_file() || !is_python_file(entry_path) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if config.ignore.iter().any(|ignored| ignored == name.as_ref()) {
            report.skipped += 1;
            continue;
        }
        record_outcome(
            &mut report,
            entry_path,
            process_file(backend, entry_path, config).await,
        );
    }

    Ok(report)
}

fn record_outcome(report: &mut BatchReport, path: &Path, outcome: Result<FileOutcome>) {
    match outcome {
        Ok(FileOutcome::Skipped) => report.skipped += 1,
        Ok(_) => report.processed += 1,
        Err(err) => report.failures.push((path.to_path_buf(), err.to_string())),
    }
}

fn is_python_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("py")
}

/// Model identifiers contain provider slashes; flatten them for use as
/// a directory name.
fn sanitize_model_name(model: &str) -> String {
    model.replace(['/', ':'], "_")
}

fn is_processed(dir: &Path, file_name: &str) -> Result<bool> {
    let log_path = dir.join(FILES_PROCESSED_LOG);
    if !log_path.is_file() {
        return Ok(false);
    }
    let content = fs::read_to_string(&log_path)
        .with_context(|| format!("failed to read {}", log_path.display()))?;
    Ok(content.lines().any(|line| line.trim() == file_name))
}

fn mark_processed(dir: &Path, file_name: &str) -> Result<()> {
    use std::io::Write;
    let log_path = dir.join(FILES_PROCESSED_LOG);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;
    writeln!(file, "{file_name}")?;
    Ok(())
}

/// Run `work` while a background task animates a spinner. The only
/// shared state is the completion flag.
async fn with_spinner<F, T>(message: &str, enabled: bool, work: F) -> T
where
    F: Future<Output = T>,
{
    if !enabled {
        return work.await;
    }

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let label = message.to_string();
    let handle = tokio::task::spawn_blocking(move || {
        let mut spinner = Spinner::new().with_message(&label);
        spinner.start();
        while !flag.load(Ordering::Relaxed) {
            spinner.tick();
            std::thread::sleep(Duration::from_millis(40));
        }
        spinner.stop();
    });

    let out = work.await;
    done.store(true, Ordering::Relaxed);
    let _ = handle.await;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replay_config(dir: &Path) -> Config {
        Config {
            backend: "replay".to_string(),
            model: "canned".to_string(),
            responses_dir: dir.to_path_buf(),
            verbose: true,
            ..Config::default()
        }
    }

    #[test]
    fn test_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_processed(dir.path(), "a.py").unwrap());
        mark_processed(dir.path(), "a.py").unwrap();
        mark_processed(dir.path(), "b.py").unwrap();
        assert!(is_processed(dir.path(), "a.py").unwrap());
        assert!(is_processed(dir.path(), "b.py").unwrap());
        assert!(!is_processed(dir.path(), "c.py").unwrap());
    }

    #[test]
    fn test_sanitize_model_name() {
        assert_eq!(
            sanitize_model_name("anthropic/claude-3.5-sonnet"),
            "anthropic_claude-3.5-sonnet"
        );
    }

    #[tokio::test]
    async fn test_process_source_end_to_end_with_replay() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("canned.response.json"),
            r#"{"docstrings": {
                "Greeter": {
                    "docstring": "Greets people.",
                    "example": "g = Greeter()\ng.hello()",
                    "methods": {"hello": "Says hello."}
                },
                "global_functions": {"standalone": "Stands alone."}
            }}"#,
        )
        .unwrap();
        // Everything is documented after insertion, so the
        // completeness pass never fires and needs no canned file.
        let config = replay_config(dir.path());
        let backend = Backend::from_config(&config).unwrap();

        let source =
            "class Greeter:\n    def hello(self):\n        pass\n\ndef standalone():\n    pass\n";
        let result = process_source(&backend, source, &config).await.unwrap();

        assert!(result.example_failures.is_empty());
        assert!(result.text.contains("\"\"\"Greets people.\"\"\""));
        assert!(result.text.contains("\"\"\"Says hello.\"\"\""));
        assert!(result.text.contains("\"\"\"Stands alone.\"\"\""));
        assert!(result.text.contains("def example_function_Greeter(self):"));
        assert!(crate::index::parser::syntax_ok(&result.text));
    }

    #[tokio::test]
    async fn test_process_file_writes_to_model_directory() {
        let responses = tempfile::tempdir().unwrap();
        fs::write(
            responses.path().join("canned.response.json"),
            r#"{"docstrings": {"global_functions": {"f": "Does f."}}}"#,
        )
        .unwrap();

        let work = tempfile::tempdir().unwrap();
        let input = work.path().join("mod.py");
        fs::write(&input, "def f():\n    pass\n").unwrap();

        let mut config = replay_config(responses.path());
        config.path = input.clone();
        let backend = Backend::from_config(&config).unwrap();

        let outcome = process_file(&backend, &input, &config).await.unwrap();
        let FileOutcome::Written(out_path) = outcome else {
            panic!("expected a written file");
        };
        assert_eq!(out_path, work.path().join("canned").join("mod.py"));
        let written = fs::read_to_string(&out_path).unwrap();
        assert!(written.contains("\"\"\"Does f.\"\"\""));

        // Second run is skipped by the ledger.
        let outcome = process_file(&backend, &input, &config).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_batch_collects_failures_and_continues() {
        let responses = tempfile::tempdir().unwrap();
        // No canned response: every file fails, none abort the batch.
        let work = tempfile::tempdir().unwrap();
        fs::write(work.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(work.path().join("b.py"), "def b():\n    pass\n").unwrap();
        fs::write(work.path().join("notes.txt"), "not python").unwrap();

        let mut config = replay_config(responses.path());
        config.path = work.path().to_path_buf();
        let backend = Backend::from_config(&config).unwrap();

        let report = process_path(&backend, &config).await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_honors_ignore_list() {
        let responses = tempfile::tempdir().unwrap();
        fs::write(
            responses.path().join("canned.response.json"),
            r#"{"docstrings": {"global_functions": {"a": "Doc."}}}"#,
        )
        .unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::write(work.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(work.path().join("skipme.py"), "def s():\n    pass\n").unwrap();

        let mut config = replay_config(responses.path());
        config.path = work.path().to_path_buf();
        config.ignore = vec!["skipme.py".to_string()];
        let backend = Backend::from_config(&config).unwrap();

        let report = process_path(&backend, &config).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.failures.is_empty());
    }
}
