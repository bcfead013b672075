use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Page index {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Content stream error: {0}")]
    Content(String),

    #[error("Annotation error: {0}")]
    Annotation(String),

    #[error("Save failed: {0}")]
    Save(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Content(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
