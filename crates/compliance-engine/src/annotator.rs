//! Annotator
//!
//! Paints a highlight and a note for every located region of every finding
//! and produces the comment list shown next to the document. Each finding
//! takes the next colour of a fixed palette, so its highlights and comments
//! share a colour.

use shared_pdf::{to_hex_color, write_annotations, PdfDocument, PendingAnnotation, SaveMode};
use shared_types::{BBox, Comment, Finding, FindingsBundle, Region, Severity};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::error::AnnotateError;
use crate::footnotes::find_ref_bbox;
use crate::locator::TextLocator;

/// Jurisdiction label of findings that apply to the whole document.
pub const DOCUMENT_WIDE_LABEL: &str = "Document-wide";

const MAX_HIGHLIGHTED_TEXT: usize = 200;

/// Rotating highlight colours, one slot per finding.
pub const PALETTE: [(&str, [f64; 3]); 10] = [
    ("red", [1.0, 0.0, 0.0]),
    ("orange", [1.0, 0.6, 0.0]),
    ("yellow", [1.0, 0.9, 0.0]),
    ("green", [0.0, 0.75, 0.0]),
    ("blue", [0.0, 0.4, 1.0]),
    ("purple", [0.6, 0.2, 0.8]),
    ("pink", [1.0, 0.4, 0.7]),
    ("cyan", [0.0, 0.8, 0.8]),
    ("brown", [0.6, 0.4, 0.2]),
    ("gray", [0.5, 0.5, 0.5]),
];

/// Annotated output of one request.
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub bytes: Vec<u8>,
    pub comments: Vec<Comment>,
    pub annotations_written: usize,
    pub annotations_skipped: usize,
}

impl AnnotatedDocument {
    /// The input returned untouched.
    pub fn unchanged(doc: &PdfDocument) -> Self {
        Self {
            bytes: doc.bytes().to_vec(),
            comments: Vec::new(),
            annotations_written: 0,
            annotations_skipped: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Pass {
    pending: Vec<PendingAnnotation>,
    comments: Vec<Comment>,
    color_slot: usize,
}

impl Pass {
    fn next_color(&mut self) -> [f64; 3] {
        let (_, rgb) = PALETTE[self.color_slot % PALETTE.len()];
        self.color_slot += 1;
        rgb
    }
}

/// What a comment says, independent of where it lands.
struct CommentTemplate<'f> {
    title: String,
    message: String,
    kind: &'static str,
    color: [f64; 3],
    fallback_text: &'f str,
    jurisdiction: Option<String>,
    search_text: Option<String>,
}

impl CommentTemplate<'_> {
    fn comment(&self, page: u32, highlighted_text: String) -> Comment {
        Comment {
            page,
            text: self.message.clone(),
            kind: self.kind.to_string(),
            color: to_hex_color(self.color),
            highlighted_text,
            jurisdiction: self.jurisdiction.clone(),
            search_text: self.search_text.clone(),
        }
    }
}

pub struct Annotator<'a> {
    doc: &'a PdfDocument,
    locator: &'a TextLocator<'a>,
    opacity: f64,
}

impl<'a> Annotator<'a> {
    pub fn new(doc: &'a PdfDocument, locator: &'a TextLocator<'a>, opacity: f64) -> Self {
        Self {
            doc,
            locator,
            opacity,
        }
    }

    /// Annotate the document for `bundle`.
    ///
    /// A bundle with nothing actionable returns the input unchanged. Fails
    /// only when neither an incremental nor a full save succeeds.
    pub fn annotate(&self, bundle: &FindingsBundle) -> Result<AnnotatedDocument, AnnotateError> {
        if !bundle.is_actionable() {
            debug!("Nothing actionable, returning document unchanged");
            return Ok(AnnotatedDocument::unchanged(self.doc));
        }

        let mut pass = Pass::default();
        let document_anchor = self
            .anchor_page(bundle.disclaimers.first().map(|d| d.text.as_str()))
            .unwrap_or(1);

        for finding in by_priority(&bundle.document_wide) {
            self.annotate_finding(&mut pass, finding, Some(DOCUMENT_WIDE_LABEL), document_anchor);
        }

        for disclaimer in &bundle.disclaimers {
            let label = disclaimer.label();
            let anchor = self.anchor_page(Some(&disclaimer.text)).unwrap_or(document_anchor);
            for finding in by_priority(&disclaimer.findings) {
                self.annotate_finding(&mut pass, finding, Some(label.as_str()), anchor);
            }
        }

        for issue in &bundle.formatting_issues {
            let finding = Finding::FormattingIssue(issue.clone());
            self.annotate_page_bound(&mut pass, &finding, issue.page, issue.bbox);
        }

        for issue in &bundle.footnote_issues {
            let finding = Finding::FootnoteIssue(issue.clone());
            let reference = issue.reference.as_deref().unwrap_or("");
            let marker_box = issue.bbox.or_else(|| {
                let layout = self.locator.layouts().get((issue.page as usize).checked_sub(1)?)?;
                find_ref_bbox(layout, reference)
            });
            match (marker_box, bundle.footnote_locations.get(reference)) {
                (Some(bbox), _) => self.annotate_page_bound(&mut pass, &finding, issue.page, Some(bbox)),
                (None, Some(location)) => {
                    self.annotate_page_bound(&mut pass, &finding, location.page, Some(location.bbox))
                }
                (None, None) => self.annotate_page_bound(&mut pass, &finding, issue.page, None),
            }
        }

        let comments = finalize_comments(pass.comments);
        info!(
            annotations = pass.pending.len(),
            comments = comments.len(),
            "Annotation pass complete"
        );

        if pass.pending.is_empty() {
            return Ok(AnnotatedDocument {
                comments,
                ..AnnotatedDocument::unchanged(self.doc)
            });
        }

        let outcome = match write_annotations(self.doc, &pass.pending, SaveMode::Incremental) {
            Ok(outcome) => outcome,
            Err(incremental) => {
                warn!(error = %incremental, "Incremental save failed, falling back to full save");
                write_annotations(self.doc, &pass.pending, SaveMode::Full).map_err(|full| {
                    error!(error = %full, "Full save failed");
                    AnnotateError::Save {
                        incremental: incremental.to_string(),
                        full: full.to_string(),
                    }
                })?
            }
        };

        Ok(AnnotatedDocument {
            bytes: outcome.bytes,
            comments,
            annotations_written: outcome.written,
            annotations_skipped: outcome.skipped,
        })
    }

    /// 1-based page of the disclaimer section, if any part of it is found.
    fn anchor_page(&self, hint: Option<&str>) -> Option<u32> {
        self.locator
            .locate_disclaimer_section(hint)
            .first()
            .map(Region::page_number)
    }

    fn paint(&self, pass: &mut Pass, region: &Region, template: &CommentTemplate<'_>) -> String {
        let bbox = region.bbox;
        pass.pending.push(PendingAnnotation::highlight(
            region.page_index,
            bbox,
            template.color,
            self.opacity,
            template.title.clone(),
            template.message.clone(),
        ));
        pass.pending.push(PendingAnnotation::note(
            region.page_index,
            (bbox.x1, bbox.y0),
            template.color,
            template.title.clone(),
            template.message.clone(),
        ));

        let text = self.locator.text_in_region(region);
        let text = if text.is_empty() {
            template.fallback_text.to_string()
        } else {
            text
        };
        text.chars().take(MAX_HIGHLIGHTED_TEXT).collect()
    }

    fn annotate_finding(&self, pass: &mut Pass, finding: &Finding, jurisdiction: Option<&str>, anchor_page: u32) {
        let template = CommentTemplate {
            title: title(finding, jurisdiction),
            message: finding.message(),
            kind: finding.type_label(),
            color: pass.next_color(),
            fallback_text: finding.exact_quote().unwrap_or(finding.best_quote()),
            jurisdiction: jurisdiction.map(str::to_string),
            search_text: Some(finding.best_quote().to_string()),
        };

        let regions = self.locator.locate_finding(finding);
        if regions.is_empty() {
            if finding.severity() == Severity::High {
                debug!(finding = finding.best_quote(), page = anchor_page, "Not located, anchoring comment");
                let text = finding.exact_quote().unwrap_or("").to_string();
                pass.comments.push(template.comment(anchor_page, text));
            }
            return;
        }

        for region in &regions {
            let text = self.paint(pass, region, &template);
            pass.comments.push(template.comment(region.page_number(), text));
        }
    }

    fn annotate_page_bound(&self, pass: &mut Pass, finding: &Finding, page: u32, bbox: Option<BBox>) {
        let template = CommentTemplate {
            title: finding.type_label().to_string(),
            message: finding.message(),
            kind: finding.type_label(),
            color: pass.next_color(),
            fallback_text: finding.exact_quote().unwrap_or(""),
            jurisdiction: None,
            search_text: finding.exact_quote().map(str::to_string),
        };

        match bbox.filter(|_| page >= 1) {
            Some(bbox) => {
                let region = Region::new(page as usize - 1, bbox);
                let text = self.paint(pass, &region, &template);
                pass.comments.push(template.comment(page, text));
            }
            None => {
                let text = template.fallback_text.to_string();
                pass.comments.push(template.comment(page.max(1), text));
            }
        }
    }
}

fn title(finding: &Finding, jurisdiction: Option<&str>) -> String {
    match jurisdiction {
        Some(label) => format!("{} ({})", finding.type_label(), label),
        None => finding.type_label().to_string(),
    }
}

/// Violations first, then missing requirements, otherwise in input order.
fn by_priority(findings: &[Finding]) -> impl Iterator<Item = &Finding> {
    let violations = findings.iter().filter(|f| f.is_violation());
    let rest = findings.iter().filter(|f| !f.is_violation());
    violations.chain(rest)
}

/// Drop duplicate comments (first wins) and order by page, keeping
/// discovery order within a page.
pub fn finalize_comments(comments: Vec<Comment>) -> Vec<Comment> {
    let mut seen = HashSet::new();
    let mut comments: Vec<Comment> = comments
        .into_iter()
        .filter(|c| seen.insert(c.dedup_key()))
        .collect();
    comments.sort_by_key(|c| c.page);
    comments
}
