use shared_pdf::PdfError;
use thiserror::Error;

/// Failures while writing the annotated document.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("Could not save annotated document (incremental: {incremental}; full: {full})")]
    Save { incremental: String, full: String },
}

/// Failures reported by a compliance classifier.
///
/// None of these abort an analysis; the pipeline logs them and treats the
/// call as having returned nothing.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed classifier response: {0}")]
    Malformed(String),

    #[error("Classifier timed out after {0} seconds")]
    Timeout(u64),
}

impl From<serde_json::Error> for ClassifierError {
    fn from(e: serde_json::Error) -> Self {
        ClassifierError::Malformed(e.to_string())
    }
}
