//! Shared PDF handling
//!
//! Opening documents, structured text layout (blocks, lines, spans with
//! box, size and colour), per-page text search, and writing highlight and
//! note annotations back with an incremental or full save.

pub mod annotations;
pub mod content;
pub mod coords;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod parser;
pub mod search;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use annotations::{
    to_hex_color, write_annotations, AnnotationKind, PendingAnnotation, SaveMode, WriteOutcome,
};
pub use coords::{bbox_to_user_rect, user_rect_to_bbox};
pub use error::PdfError;
pub use layout::{Block, Line, PageLayout, Span, Zone, FOOTNOTE_ZONE_RATIO};
pub use parser::{ExistingAnnotation, PdfDocument};
pub use search::{span_matches, PageText};
