use anyhow::Result;
use clap::Parser;
use docweave::config::Config;
use docweave::llm::Backend;
use docweave::processor;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docweave",
    about = "Generates and inserts docstrings into Python sources",
    version
)]
struct Args {
    /// File or directory to process (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Recurse into subdirectories
    #[arg(short = 'r', long)]
    subfolders: bool,

    /// File names to skip (repeatable)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Generation backend: openrouter or replay
    #[arg(short, long)]
    backend: Option<String>,

    /// Model identifier passed to the backend
    #[arg(short, long)]
    model: Option<String>,

    /// Directory of canned responses for the replay backend
    #[arg(long)]
    responses_dir: Option<PathBuf>,

    /// Print results without writing any files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Maximum characters per docstring line
    #[arg(long)]
    max_line_length: Option<usize>,

    /// Class docstring verbosity (0-5)
    #[arg(long)]
    class_verbosity: Option<u8>,

    /// Function docstring verbosity (0-5)
    #[arg(long)]
    function_verbosity: Option<u8>,

    /// Example snippet verbosity (0-5)
    #[arg(long)]
    example_verbosity: Option<u8>,

    /// Skip the processed-file ledger
    #[arg(long)]
    no_log: bool,

    /// Print progress details instead of a spinner
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Command-line flags override config-file values.
    fn apply_to(self, config: &mut Config) {
        config.path = self.path;
        config.include_subfolders |= self.subfolders;
        if !self.ignore.is_empty() {
            config.ignore = self.ignore;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(dir) = self.responses_dir {
            config.responses_dir = dir;
        }
        if let Some(len) = self.max_line_length {
            config.max_line_length = len;
        }
        if let Some(v) = self.class_verbosity {
            config.class_docstrings_verbosity_level = v;
        }
        if let Some(v) = self.function_verbosity {
            config.function_docstrings_verbosity_level = v;
        }
        if let Some(v) = self.example_verbosity {
            config.example_verbosity_level = v;
        }
        config.dry_run |= self.dry_run;
        config.disable_processed_log |= self.no_log;
        config.verbose |= self.verbose;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load();
    args.apply_to(&mut config);

    let backend = Backend::from_config(&config)?;
    let report = processor::process_path(&backend, &config).await?;

    if report.processed > 0 || report.skipped > 0 {
        eprintln!(
            "  Done: {} file(s) documented, {} skipped.",
            report.processed, report.skipped
        );
    }
    if !report.failures.is_empty() {
        eprintln!("  {} file(s) failed:", report.failures.len());
        for (path, reason) in &report.failures {
            eprintln!("    {}: {}", path.display(), reason);
        }
        std::process::exit(1);
    }
    Ok(())
}
