//! Analysis pipeline
//!
//! Runs every detection pass over one document, fans the classifier calls
//! out over a bounded pool, aggregates and annotates. Layouts are computed
//! once and dropped with the request.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use shared_pdf::{PdfDocument, PdfError};
use shared_types::{Comment, Finding, FindingsBundle};
use tracing::{info, instrument, warn};

use crate::aggregate::{aggregate, DetectionResults};
use crate::annotator::{AnnotatedDocument, Annotator};
use crate::classifier::{ComplianceClassifier, DetectedDisclaimer, PageChunk};
use crate::compare::{compare_with_approved, ApprovedDisclaimer, ComparisonResult};
use crate::config::ScanConfig;
use crate::footnotes::{check_references, extract_footnotes, marker_policy};
use crate::formatting::{scan_existing_highlights, scan_unusual_color};
use crate::locator::TextLocator;
use crate::patterns::high_risk_findings;
use crate::risk::{summarize, AnalysisSummary};

/// Result of a full analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    #[serde(skip)]
    pub annotated: Vec<u8>,
    pub comments: Vec<Comment>,
    pub findings: FindingsBundle,
    pub summary: AnalysisSummary,
    /// Closest approved wordings for the first detected disclaimer
    pub comparisons: Vec<ComparisonResult>,
}

enum ClassifierJob<'a> {
    Disclaimer(usize, &'a DetectedDisclaimer),
    Chunk(&'a PageChunk),
}

enum ClassifierOutput {
    Disclaimer(usize, Vec<Finding>),
    Chunk(usize, Vec<Finding>),
}

async fn run_job(classifier: &dyn ComplianceClassifier, job: ClassifierJob<'_>) -> ClassifierOutput {
    match job {
        ClassifierJob::Disclaimer(index, disclaimer) => {
            let findings = classifier.check_disclaimer(disclaimer).await.unwrap_or_else(|e| {
                warn!(disclaimer = index, error = %e, "Disclaimer check failed, treating as empty");
                Vec::new()
            });
            ClassifierOutput::Disclaimer(index, findings)
        }
        ClassifierJob::Chunk(chunk) => {
            let findings = classifier.scan_chunk(chunk).await.unwrap_or_else(|e| {
                warn!(chunk = chunk.index, error = %e, "Document scan failed, treating as empty");
                Vec::new()
            });
            ClassifierOutput::Chunk(chunk.index, findings)
        }
    }
}

/// Analyze and annotate one document.
///
/// Only an unreadable document is an error. Classifier failures count as
/// empty results, and a failed save returns the input unannotated.
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub async fn analyze(
    bytes: &[u8],
    classifier: &dyn ComplianceClassifier,
    config: &ScanConfig,
    approved: &[ApprovedDisclaimer],
) -> Result<AnalysisOutcome, PdfError> {
    let doc = PdfDocument::from_bytes(bytes)?;
    let layouts = doc.layouts();
    let locator = TextLocator::new(&layouts);
    info!(pages = doc.page_count(), "Document loaded");

    let phrase_findings = high_risk_findings(locator.pages(), config.dedup_key_len);

    let footnotes = extract_footnotes(&layouts);
    let policy = marker_policy(config.reference_markers);
    let footnote_issues = check_references(&layouts, &footnotes, policy.as_ref());

    let mut formatting_issues = scan_unusual_color(&layouts, &config.color_band);
    formatting_issues.extend(scan_existing_highlights(&doc, locator.pages()));

    let page_texts: Vec<String> = locator.pages().iter().map(|p| p.text()).collect();
    let disclaimers = classifier.detect_disclaimers(&page_texts).await.unwrap_or_else(|e| {
        warn!(error = %e, "Disclaimer detection failed, treating as empty");
        Vec::new()
    });

    // the regex pass already covers the document; skip the broad scan
    let chunks = if phrase_findings.is_empty() {
        PageChunk::split(&page_texts, config.document_chunk_pages)
    } else {
        info!(
            violations = phrase_findings.len(),
            "High-risk phrases found, skipping document-wide classifier scan"
        );
        Vec::new()
    };

    let jobs = disclaimers
        .iter()
        .enumerate()
        .map(|(i, d)| ClassifierJob::Disclaimer(i, d))
        .chain(chunks.iter().map(ClassifierJob::Chunk));
    let outputs: Vec<ClassifierOutput> = stream::iter(jobs)
        .map(|job| run_job(classifier, job))
        .buffer_unordered(config.classifier_pool_size.max(1))
        .collect()
        .await;

    let mut results = DetectionResults {
        phrase_findings,
        footnote_issues,
        formatting_issues,
        footnote_locations: footnotes.locations,
        ..Default::default()
    };
    for output in outputs {
        match output {
            ClassifierOutput::Disclaimer(index, findings) => {
                if let Some(disclaimer) = disclaimers.get(index) {
                    results.disclaimer_batches.push((index, disclaimer.clone(), findings));
                }
            }
            ClassifierOutput::Chunk(index, findings) => results.document_batches.push((index, findings)),
        }
    }

    let comparisons = disclaimers
        .first()
        .map(|primary| compare_with_approved(primary, approved))
        .unwrap_or_default();

    let findings = aggregate(results, config.dedup_key_len);
    let summary = summarize(&findings);
    let annotated = Annotator::new(&doc, &locator, config.highlight_opacity)
        .annotate(&findings)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Annotation failed, returning original document");
            AnnotatedDocument::unchanged(&doc)
        });

    info!(
        risk = %summary.risk_level,
        comments = annotated.comments.len(),
        "Analysis complete"
    );
    Ok(AnalysisOutcome {
        annotated: annotated.bytes,
        comments: annotated.comments,
        findings,
        summary,
        comparisons,
    })
}
