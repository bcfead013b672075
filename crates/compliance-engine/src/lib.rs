//! Disclaimer compliance engine
//!
//! Locates compliance findings in marketing PDFs and writes them back as
//! highlight and note annotations with a matching list of comments.
//!
//! `process` annotates a document for findings that were already gathered.
//! `ComplianceEngine::analyze` runs the whole pipeline: high-risk phrase
//! scan, footnote and formatting checks, classifier calls, aggregation and
//! annotation, plus an optional comparison with approved disclaimers.

pub mod aggregate;
pub mod annotator;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod error;
pub mod footnotes;
pub mod formatting;
pub mod jurisdiction;
pub mod locator;
pub mod patterns;
pub mod pipeline;
pub mod risk;

pub use annotator::{AnnotatedDocument, Annotator};
pub use classifier::{ComplianceClassifier, DetectedDisclaimer, NullClassifier, PageChunk, RecordedClassifier};
pub use compare::{compare_with_approved, ApprovedDisclaimer, ComparisonResult};
pub use config::{ColorBand, MarkerPolicyKind, ScanConfig};
pub use error::{AnnotateError, ClassifierError};
pub use locator::TextLocator;
pub use pipeline::AnalysisOutcome;
pub use risk::AnalysisSummary;

use shared_pdf::{PdfDocument, PdfError};
use shared_types::{Comment, FindingsBundle};
use tracing::warn;

/// Annotated document and its comments.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub bytes: Vec<u8>,
    pub comments: Vec<Comment>,
}

/// ComplianceEngine entry point
#[derive(Debug, Clone, Default)]
pub struct ComplianceEngine {
    config: ScanConfig,
    approved: Vec<ApprovedDisclaimer>,
}

impl ComplianceEngine {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config: config.sanitized(),
            approved: Vec::new(),
        }
    }

    /// Approved wordings the detected disclaimer is compared with.
    pub fn with_approved(mut self, approved: Vec<ApprovedDisclaimer>) -> Self {
        self.approved = approved;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Annotate `bytes` for an already aggregated bundle.
    ///
    /// Fails only for input that is not a readable PDF. If the annotated
    /// copy cannot be saved the original bytes come back with no comments.
    pub fn process(&self, bytes: &[u8], bundle: &FindingsBundle) -> Result<ProcessOutput, PdfError> {
        let doc = PdfDocument::from_bytes(bytes)?;
        let layouts = doc.layouts();
        let locator = TextLocator::new(&layouts);
        let annotated = Annotator::new(&doc, &locator, self.config.highlight_opacity)
            .annotate(bundle)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Annotation failed, returning original document");
                AnnotatedDocument::unchanged(&doc)
            });
        Ok(ProcessOutput {
            bytes: annotated.bytes,
            comments: annotated.comments,
        })
    }

    /// Run every detection pass and annotate the result.
    pub async fn analyze(
        &self,
        bytes: &[u8],
        classifier: &dyn ComplianceClassifier,
    ) -> Result<AnalysisOutcome, PdfError> {
        pipeline::analyze(bytes, classifier, &self.config, &self.approved).await
    }
}

/// `ComplianceEngine::process` with the default configuration.
pub fn process(bytes: &[u8], bundle: &FindingsBundle) -> Result<ProcessOutput, PdfError> {
    ComplianceEngine::default().process(bytes, bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_pdf::testing::{build_pdf, TestPage};
    use shared_types::Finding;

    #[test]
    fn test_process_rejects_non_pdf() {
        assert!(matches!(
            process(b"", &FindingsBundle::default()),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_engine_uses_configured_opacity() {
        let bytes = build_pdf(vec![TestPage::letter().text(72.0, 100.0, 10.0, "Guaranteed income for life")]);
        let bundle = FindingsBundle {
            document_wide: vec![Finding::violation("Guarantee", Some("Guaranteed income".into()))],
            ..Default::default()
        };
        let engine = ComplianceEngine::new(ScanConfig {
            highlight_opacity: 0.25,
            ..ScanConfig::default()
        });
        assert_eq!(engine.config().highlight_opacity, 0.25);
        let out = engine.process(&bytes, &bundle).unwrap();
        assert_eq!(out.comments.len(), 1);
        assert!(out.bytes.len() > bytes.len());
    }

    #[test]
    fn test_engine_clamps_direct_config() {
        let engine = ComplianceEngine::new(ScanConfig {
            dedup_key_len: 0,
            classifier_pool_size: 0,
            highlight_opacity: 3.0,
            ..ScanConfig::default()
        });
        assert_eq!(engine.config().dedup_key_len, 1);
        assert_eq!(engine.config().classifier_pool_size, 1);
        assert_eq!(engine.config().highlight_opacity, 1.0);
    }
}
