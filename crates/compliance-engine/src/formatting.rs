//! Formatting scanner
//!
//! Flags red-dominant text (leftover tracked-change style edits) and
//! highlight annotations carried over from earlier review rounds.

use shared_pdf::{PageLayout, PageText, PdfDocument};
use shared_types::{FormattingIssue, FormattingIssueKind};
use tracing::warn;

use crate::config::ColorBand;

const MAX_ISSUE_TEXT: usize = 100;

pub const EXISTING_HIGHLIGHT_MESSAGE: &str =
    "Existing highlight found in document (review or remove before finalising).";

/// Spans whose fill colour falls inside `band`.
pub fn scan_unusual_color(layouts: &[PageLayout], band: &ColorBand) -> Vec<FormattingIssue> {
    let mut issues = Vec::new();
    for layout in layouts {
        for span in layout.spans() {
            let text = span.text.trim();
            if span.color == 0 || text.chars().count() < 2 {
                continue;
            }
            let (r, g, b) = span.rgb();
            if !band.contains((r, g, b)) {
                continue;
            }
            let text: String = text.chars().take(MAX_ISSUE_TEXT).collect();
            let color_hex = format!("#{r:02x}{g:02x}{b:02x}");
            issues.push(FormattingIssue {
                page: layout.page_number(),
                issue_type: FormattingIssueKind::UnusualColor,
                message: format!("Text in unusual colour {color_hex} (possible leftover edit): \"{text}\""),
                text: Some(text),
                color_hex: Some(color_hex),
                bbox: Some(span.bbox),
            });
        }
    }
    issues
}

/// Highlight annotations already present in the input file.
///
/// `pages` is used to read back the text under each highlight; a page whose
/// annotations cannot be read is skipped.
pub fn scan_existing_highlights(doc: &PdfDocument, pages: &[PageText]) -> Vec<FormattingIssue> {
    let mut issues = Vec::new();
    for index in 0..doc.page_count() {
        let annotations = match doc.existing_annotations(index) {
            Ok(annotations) => annotations,
            Err(e) => {
                warn!(page = index + 1, error = %e, "Could not read annotations, skipping page");
                continue;
            }
        };
        for annot in annotations.into_iter().filter(|a| a.is_highlight()) {
            let text: Option<String> = pages
                .get(index)
                .map(|p| p.text_in_rect(&annot.rect))
                .filter(|t| !t.is_empty())
                .map(|t| t.chars().take(MAX_ISSUE_TEXT).collect());
            issues.push(FormattingIssue {
                page: index as u32 + 1,
                issue_type: FormattingIssueKind::ExistingHighlight,
                message: EXISTING_HIGHLIGHT_MESSAGE.to_string(),
                text,
                color_hex: None,
                bbox: Some(annot.rect),
            });
        }
    }
    issues
}
