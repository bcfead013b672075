//! Footnote resolver
//!
//! Footnote definitions are read from the footnote zone of every page into
//! one document-wide label space. Reference markers in body text are then
//! checked against it.

use lazy_static::lazy_static;
use regex::Regex;
use shared_pdf::{PageLayout, Span};
use shared_types::{BBox, FootnoteIssue, FootnoteIssueKind, FootnoteLocation};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::MarkerPolicyKind;

/// A marker set at or below this fraction of the page's median size is
/// treated as superscript.
pub const SUPERSCRIPT_RATIO: f64 = 0.92;

lazy_static! {
    static ref NUMBERED_FOOTNOTE: Regex = Regex::new(r"^(\d+)[\.\)\s]+(.+)$").unwrap();
    static ref STARRED_FOOTNOTE: Regex = Regex::new(r"^(\*+)\s+(.+)$").unwrap();
}

/// Footnote definitions of a whole document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootnoteMap {
    pub labels: BTreeMap<String, String>,
    pub locations: BTreeMap<String, FootnoteLocation>,
}

impl FootnoteMap {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }
}

/// Running state of the footnote scan. The open label carries over page
/// boundaries, so a continuation at the top of the next page's footnote
/// zone extends the last definition.
#[derive(Debug, Default)]
struct FootnoteScan {
    current_label: Option<String>,
    map: FootnoteMap,
}

impl FootnoteScan {
    fn start(&mut self, label: &str, text: &str, location: FootnoteLocation) {
        self.map.labels.insert(label.to_string(), text.trim().to_string());
        self.map.locations.insert(label.to_string(), location);
        self.current_label = Some(label.to_string());
    }

    fn continue_with(&mut self, text: &str) {
        let Some(label) = &self.current_label else {
            return;
        };
        if let Some(existing) = self.map.labels.get_mut(label) {
            if !existing.is_empty() {
                existing.push(' ');
            }
            existing.push_str(text);
        }
    }

    fn scan_page(&mut self, layout: &PageLayout) {
        for line in layout.footnote_blocks().flat_map(|b| b.lines.iter()) {
            let text = line.text();
            let text = text.trim();
            // lone page numbers and stray glyphs
            if text.chars().count() < 2 {
                continue;
            }
            let location = FootnoteLocation {
                page: layout.page_number(),
                bbox: line.bbox,
            };
            let caps = NUMBERED_FOOTNOTE
                .captures(text)
                .or_else(|| STARRED_FOOTNOTE.captures(text));
            match caps {
                Some(caps) => self.start(&caps[1], &caps[2], location),
                None => self.continue_with(text),
            }
        }
    }
}

/// Label to text and label to location maps for the whole document.
pub fn extract_footnotes(layouts: &[PageLayout]) -> FootnoteMap {
    let mut scan = FootnoteScan::default();
    for layout in layouts {
        scan.scan_page(layout);
    }
    debug!(labels = scan.map.labels.len(), "Footnotes extracted");
    scan.map
}

/// Decides whether a body span is a footnote reference marker.
pub trait ReferenceMarkerPolicy: Send + Sync {
    /// `median_size` is the median span size of the page, if it has text.
    fn is_marker(&self, span: &Span, median_size: Option<f64>) -> bool;
}

/// The whole span is digits or asterisks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareMarker;

impl ReferenceMarkerPolicy for BareMarker {
    fn is_marker(&self, span: &Span, _median_size: Option<f64>) -> bool {
        is_bare_marker(span.text.trim())
    }
}

/// A bare marker that is also set smaller than the surrounding text.
#[derive(Debug, Clone, Copy)]
pub struct SuperscriptMarker {
    pub ratio: f64,
}

impl Default for SuperscriptMarker {
    fn default() -> Self {
        Self {
            ratio: SUPERSCRIPT_RATIO,
        }
    }
}

impl ReferenceMarkerPolicy for SuperscriptMarker {
    fn is_marker(&self, span: &Span, median_size: Option<f64>) -> bool {
        is_bare_marker(span.text.trim())
            && median_size.is_some_and(|median| span.size <= self.ratio * median)
    }
}

pub fn marker_policy(kind: MarkerPolicyKind) -> Box<dyn ReferenceMarkerPolicy> {
    match kind {
        MarkerPolicyKind::Bare => Box::new(BareMarker),
        MarkerPolicyKind::Superscript => Box::new(SuperscriptMarker::default()),
    }
}

fn is_bare_marker(text: &str) -> bool {
    !text.is_empty()
        && (text.chars().all(|c| c.is_ascii_digit()) || text.chars().all(|c| c == '*'))
}

/// Body-zone reference markers with no matching definition.
///
/// A document without any footnote definitions has no label space to
/// check against and yields nothing.
pub fn check_references(
    layouts: &[PageLayout],
    footnotes: &FootnoteMap,
    policy: &dyn ReferenceMarkerPolicy,
) -> Vec<FootnoteIssue> {
    if footnotes.is_empty() {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for layout in layouts {
        let median = layout.median_span_size();
        let mut checked = HashSet::new();
        for span in layout.body_spans() {
            if !policy.is_marker(span, median) {
                continue;
            }
            let marker = span.text.trim().to_string();
            if !checked.insert(marker.clone()) {
                continue;
            }
            if !footnotes.contains(&marker) {
                issues.push(FootnoteIssue {
                    page: layout.page_number(),
                    issue_type: FootnoteIssueKind::ReferenceMissing,
                    message: format!(
                        "Footnote reference '{marker}' has no matching footnote in this document."
                    ),
                    reference: Some(marker),
                    bbox: Some(span.bbox),
                });
            }
        }
    }
    issues
}

/// Box of a body-zone reference marker on one page, preferring a
/// superscript-sized occurrence over the first plain one.
pub fn find_ref_bbox(layout: &PageLayout, reference: &str) -> Option<BBox> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let median = layout.median_span_size();
    let matches: Vec<&Span> = layout
        .body_spans()
        .filter(|s| s.text.trim() == reference)
        .collect();
    matches
        .iter()
        .find(|s| median.is_some_and(|m| s.size <= SUPERSCRIPT_RATIO * m))
        .or_else(|| matches.first())
        .map(|s| s.bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shared_pdf::{Block, Line};

    fn span(text: &str, x: f64, y: f64, size: f64) -> Span {
        let width = 0.5 * size * text.chars().count() as f64;
        Span::new(text, BBox::new(x, y, x + width, y + size), size, 0)
    }

    fn line(spans: Vec<Span>) -> Line {
        Line::from_spans(spans)
    }

    /// Body block at the top, footnote block at the bottom of a 792pt page.
    fn page(index: usize, body: Vec<Line>, notes: Vec<Line>) -> PageLayout {
        let mut blocks = Vec::new();
        if !body.is_empty() {
            blocks.push(Block::from_lines(body));
        }
        if !notes.is_empty() {
            blocks.push(Block::from_lines(notes));
        }
        PageLayout::new(index, 612.0, 792.0, blocks)
    }

    fn note(text: &str, y: f64) -> Line {
        line(vec![span(text, 72.0, y, 8.0)])
    }

    #[test]
    fn test_extracts_numbered_and_starred_labels() {
        let layouts = vec![page(
            0,
            vec![],
            vec![
                note("1. Source: Bloomberg, 2024.", 700.0),
                note("2) Returns shown net of fees", 710.0),
                note("and before tax.", 720.0),
                note("** Capital at risk.", 730.0),
            ],
        )];
        let map = extract_footnotes(&layouts);
        assert_eq!(map.labels["1"], "Source: Bloomberg, 2024.");
        assert_eq!(map.labels["2"], "Returns shown net of fees and before tax.");
        assert_eq!(map.labels["**"], "Capital at risk.");
        assert_eq!(map.locations["2"].page, 1);
        assert_eq!(map.locations["2"].bbox.y0, 710.0);
    }

    #[test]
    fn test_continuation_spills_to_next_page() {
        let layouts = vec![
            page(0, vec![], vec![note("3 Performance figures are", 740.0)]),
            page(1, vec![], vec![note("simulated.", 700.0)]),
        ];
        let map = extract_footnotes(&layouts);
        assert_eq!(map.labels["3"], "Performance figures are simulated.");
        assert_eq!(map.locations["3"].page, 1);
    }

    #[test]
    fn test_redefined_label_takes_last_text_and_location() {
        let layouts = vec![
            page(0, vec![], vec![note("1 Draft wording.", 700.0)]),
            page(1, vec![], vec![note("1 Final wording.", 720.0)]),
        ];
        let map = extract_footnotes(&layouts);
        assert_eq!(map.labels["1"], "Final wording.");
        assert_eq!(map.locations["1"].page, 2);
        assert_eq!(map.locations["1"].bbox.y0, 720.0);
    }

    #[test]
    fn test_footer_page_number_is_not_a_continuation() {
        let layouts = vec![page(
            0,
            vec![],
            vec![note("1 Source: Bloomberg.", 700.0), note("7", 760.0)],
        )];
        let map = extract_footnotes(&layouts);
        assert_eq!(map.labels["1"], "Source: Bloomberg.");
    }

    #[test]
    fn test_find_ref_bbox_ignores_footnote_zone() {
        let body = vec![
            line(vec![span("Growth", 72.0, 100.0, 12.0), span("2", 120.0, 100.0, 12.0)]),
        ];
        let notes = vec![line(vec![span("2", 72.0, 700.0, 7.0)])];
        let layout = page(0, body, notes);
        let bbox = find_ref_bbox(&layout, "2").unwrap();
        assert_eq!(bbox.y0, 100.0);
        assert_eq!(bbox.x0, 120.0);
    }

    #[test]
    fn test_body_text_is_not_a_definition() {
        let layouts = vec![page(0, vec![line(vec![span("1. Introduction", 72.0, 100.0, 12.0)])], vec![])];
        assert!(extract_footnotes(&layouts).is_empty());
    }

    fn body_with_marker(marker: &str) -> Vec<Line> {
        vec![line(vec![
            span("Returns were strong", 72.0, 100.0, 12.0),
            span(marker, 190.0, 98.0, 7.0),
        ])]
    }

    #[test]
    fn test_missing_reference_reported_once_per_page() {
        let defs = vec![note("1 Defined.", 700.0), note("2 Also defined.", 710.0)];
        let mut body = body_with_marker("3");
        body.push(line(vec![
            span("More text", 72.0, 114.0, 12.0),
            span("3", 140.0, 112.0, 7.0),
        ]));
        let layouts = vec![page(0, vec![], defs), page(1, body, vec![])];

        let map = extract_footnotes(&layouts);
        let issues = check_references(&layouts, &map, &BareMarker);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].page, 2);
        assert_eq!(issues[0].reference.as_deref(), Some("3"));
        assert_eq!(issues[0].issue_type, FootnoteIssueKind::ReferenceMissing);
        assert_eq!(
            issues[0].message,
            "Footnote reference '3' has no matching footnote in this document."
        );
    }

    #[test]
    fn test_defined_reference_is_fine() {
        let layouts = vec![page(0, body_with_marker("1"), vec![note("1 Defined.", 700.0)])];
        let map = extract_footnotes(&layouts);
        assert!(check_references(&layouts, &map, &BareMarker).is_empty());
    }

    #[test]
    fn test_no_definitions_means_no_issues() {
        let layouts = vec![page(0, body_with_marker("7"), vec![])];
        let map = extract_footnotes(&layouts);
        assert!(check_references(&layouts, &map, &BareMarker).is_empty());
    }

    #[test]
    fn test_footnote_zone_markers_are_ignored() {
        // everything below the threshold: no body-zone checks
        let layouts = vec![page(
            0,
            vec![],
            vec![note("1 Defined.", 700.0), line(vec![span("9", 72.0, 720.0, 7.0)])],
        )];
        let map = extract_footnotes(&layouts);
        assert!(check_references(&layouts, &map, &BareMarker).is_empty());
    }

    #[test]
    fn test_superscript_policy_skips_full_size_numbers() {
        let body = vec![
            line(vec![span("Returns were strong", 72.0, 100.0, 12.0)]),
            line(vec![span("Fund size", 72.0, 114.0, 12.0)]),
            line(vec![span("12", 72.0, 128.0, 12.0)]),
        ];
        let layouts = vec![page(0, body, vec![note("1 Defined.", 700.0)])];
        let map = extract_footnotes(&layouts);
        assert_eq!(check_references(&layouts, &map, &BareMarker).len(), 1);
        assert!(check_references(&layouts, &map, &SuperscriptMarker::default()).is_empty());
    }

    #[test]
    fn test_find_ref_bbox_prefers_superscript() {
        let body = vec![
            line(vec![span("4", 72.0, 100.0, 12.0)]),
            line(vec![span("Growth", 72.0, 114.0, 12.0), span("4", 120.0, 112.0, 7.0)]),
            line(vec![span("Income", 72.0, 128.0, 12.0)]),
        ];
        let layout = page(0, body, vec![]);
        let bbox = find_ref_bbox(&layout, "4").unwrap();
        assert_eq!(bbox.x0, 120.0);
        assert!(find_ref_bbox(&layout, "5").is_none());
    }
}
