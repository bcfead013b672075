//! Disclaimer compliance CLI
//!
//! Reads a marketing PDF, runs the compliance pipeline and writes the
//! annotated copy next to a JSON list of comments.
//!
//! Classifier output can be replayed from a recording (`--findings`), or a
//! pre-aggregated findings bundle can be applied directly (`--bundle`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use compliance_engine::{
    ApprovedDisclaimer, ComplianceClassifier, ComplianceEngine, NullClassifier, RecordedClassifier,
    ScanConfig,
};
use shared_types::{Comment, FindingsBundle};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for the disclaimer checker
#[derive(Parser, Debug)]
#[command(name = "disclaimer-cli")]
#[command(about = "Annotate a marketing PDF with disclaimer compliance findings")]
struct Args {
    /// PDF to analyze
    input: PathBuf,

    /// Recorded classifier responses (JSON)
    #[arg(long, conflicts_with = "bundle")]
    findings: Option<PathBuf>,

    /// Aggregated findings bundle (JSON) to annotate without running detection
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Scan configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Approved disclaimer wordings (JSON array) to compare against
    #[arg(long)]
    approved: Option<PathBuf>,

    /// Annotated PDF path [default: <input>.annotated.pdf]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comments JSON path [default: <input>.comments.json]
    #[arg(long)]
    comments: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| sibling(&self.input, "annotated.pdf"))
    }

    fn comments_path(&self) -> PathBuf {
        self.comments
            .clone()
            .unwrap_or_else(|| sibling(&self.input, "comments.json"))
    }
}

/// `dir/report.pdf` -> `dir/report.<suffix>`
fn sibling(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}.{suffix}"))
}

fn read_json_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn run(args: &Args) -> Result<Vec<Comment>> {
    let config = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    let approved: Vec<ApprovedDisclaimer> = match &args.approved {
        Some(path) => serde_json::from_str(&read_json_file(path)?)
            .with_context(|| format!("Invalid approved disclaimers: {}", path.display()))?,
        None => Vec::new(),
    };
    let engine = ComplianceEngine::new(config).with_approved(approved);

    let bytes = fs::read(&args.input)
        .with_context(|| format!("Failed to read PDF: {}", args.input.display()))?;

    let (annotated, comments) = if let Some(path) = &args.bundle {
        let bundle: FindingsBundle = serde_json::from_str(&read_json_file(path)?)
            .with_context(|| format!("Invalid findings bundle: {}", path.display()))?;
        let output = engine
            .process(&bytes, &bundle)
            .with_context(|| format!("Failed to open PDF: {}", args.input.display()))?;
        (output.bytes, output.comments)
    } else {
        let classifier: Box<dyn ComplianceClassifier> = match &args.findings {
            Some(path) => Box::new(
                RecordedClassifier::from_json(&read_json_file(path)?)
                    .with_context(|| format!("Invalid findings recording: {}", path.display()))?,
            ),
            None => Box::new(NullClassifier),
        };
        let outcome = engine
            .analyze(&bytes, classifier.as_ref())
            .await
            .with_context(|| format!("Failed to open PDF: {}", args.input.display()))?;
        info!(
            risk = %outcome.summary.risk_level,
            approved = outcome.summary.approved,
            "{}",
            outcome.summary.explanation
        );
        if let Some(best) = outcome.comparisons.first() {
            info!(
                approved_id = %best.approved_id,
                similarity = best.similarity,
                missing = best.missing_phrases.len(),
                "Closest approved disclaimer"
            );
        }
        (outcome.annotated, outcome.comments)
    };

    let output = args.output_path();
    fs::write(&output, &annotated)
        .with_context(|| format!("Failed to write annotated PDF: {}", output.display()))?;

    let comments_path = args.comments_path();
    let json = serde_json::to_string_pretty(&comments)?;
    fs::write(&comments_path, json)
        .with_context(|| format!("Failed to write comments: {}", comments_path.display()))?;

    info!(
        "Wrote {} comment(s) to {} and annotated PDF to {}",
        comments.len(),
        comments_path.display(),
        output.display()
    );
    Ok(comments)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(&args).await?;
    Ok(())
}
