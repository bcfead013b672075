//! End-to-end scenarios through `process` and the analysis pipeline
//!
//! Fixture PDFs are built in memory with Courier text so positions are
//! predictable.

use compliance_engine::footnotes::{check_references, extract_footnotes, BareMarker};
use compliance_engine::{
    process, ComplianceEngine, NullClassifier, RecordedClassifier, ScanConfig, TextLocator,
};
use pretty_assertions::assert_eq;
use shared_pdf::testing::{build_pdf, TestPage};
use shared_pdf::PdfDocument;
use shared_types::{DisclaimerFindings, Finding, FindingsBundle, FootnoteIssueKind, Jurisdiction};

// ============================================================================
// Fixtures
// ============================================================================

fn guarantee_pdf() -> Vec<u8> {
    build_pdf(vec![
        TestPage::letter().paragraph(
            72.0,
            100.0,
            10.0,
            &["Gulf Growth Fund", "We guarantee a 100% return on your investment."],
        ),
        TestPage::letter().paragraph(
            72.0,
            100.0,
            10.0,
            &[
                "Disclaimer",
                "For residents of the United Arab Emirates: this material is promotional.",
            ],
        ),
    ])
}

/// Page 2 body cites footnote 3; the footnote zone defines only 1 and 2.
fn footnote_pdf() -> Vec<u8> {
    build_pdf(vec![
        TestPage::letter()
            .text(72.0, 100.0, 12.0, "Annual report")
            .text(72.0, 700.0, 8.0, "1 Source: fund administrator.")
            .text(72.0, 712.0, 8.0, "2 Net of fees."),
        TestPage::letter()
            .text(72.0, 100.0, 12.0, "Returns were strong")
            .text(220.0, 96.0, 7.0, "3")
            .text(72.0, 130.0, 12.0, "Income was stable"),
    ])
}

fn text_of(bytes: &[u8]) -> Vec<String> {
    PdfDocument::from_bytes(bytes)
        .unwrap()
        .layouts()
        .iter()
        .map(|l| l.text())
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

/// Scenario 1: a guaranteed-return sentence is found, highlighted and
/// reported once.
#[tokio::test]
async fn scenario_guaranteed_return_is_highlighted() {
    let bytes = guarantee_pdf();
    let outcome = ComplianceEngine::default()
        .analyze(&bytes, &NullClassifier)
        .await
        .unwrap();

    assert_eq!(outcome.findings.document_wide.len(), 1);
    let finding = &outcome.findings.document_wide[0];
    assert!(finding.is_violation());
    assert_eq!(finding.exact_quote(), Some("We guarantee a 100% return"));

    assert_eq!(outcome.comments.len(), 1);
    let comment = &outcome.comments[0];
    assert_eq!(comment.page, 1);
    assert_eq!(comment.kind, "Violation");
    assert_eq!(comment.highlighted_text, "We guarantee a 100% return");

    let annotated = PdfDocument::from_bytes(&outcome.annotated).unwrap();
    let annots = annotated.existing_annotations(0).unwrap();
    assert!(annots.iter().any(|a| a.is_highlight()));
    assert!(annotated.existing_annotations(1).unwrap().is_empty());
}

/// Scenario 2: a body marker with no definition is reported on its page.
#[test]
fn scenario_missing_footnote_reference() {
    let doc = PdfDocument::from_bytes(&footnote_pdf()).unwrap();
    let layouts = doc.layouts();
    let footnotes = extract_footnotes(&layouts);
    assert_eq!(footnotes.labels.len(), 2);

    let issues = check_references(&layouts, &footnotes, &BareMarker);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].page, 2);
    assert_eq!(issues[0].issue_type, FootnoteIssueKind::ReferenceMissing);
    assert_eq!(issues[0].reference.as_deref(), Some("3"));
}

/// Scenario 2 through the whole pipeline, including the comment.
#[tokio::test]
async fn scenario_missing_footnote_reference_is_commented() {
    let outcome = ComplianceEngine::default()
        .analyze(&footnote_pdf(), &NullClassifier)
        .await
        .unwrap();
    assert_eq!(outcome.findings.footnote_issues.len(), 1);
    assert_eq!(outcome.comments.len(), 1);
    assert_eq!(outcome.comments[0].page, 2);
    assert_eq!(outcome.comments[0].kind, "Footnote Reference Missing");
    assert_eq!(outcome.comments[0].highlighted_text, "3");
}

/// Scenario 3: the same phrase from the regex scan and a jurisdiction check
/// yields one comment.
#[tokio::test]
async fn scenario_duplicate_finding_reported_once() {
    let recording = r#"{
        "disclaimers": [{
            "jurisdiction": "UAE",
            "text": "For residents of the United Arab Emirates: this material is promotional.",
            "findings": {"violations": [
                {"violation": "Guaranteed return", "exact_quote": "We guarantee a 100% return"}
            ]}
        }]
    }"#;
    let classifier = RecordedClassifier::from_json(recording).unwrap();
    let outcome = ComplianceEngine::default()
        .analyze(&guarantee_pdf(), &classifier)
        .await
        .unwrap();

    assert_eq!(outcome.findings.disclaimers.len(), 1);
    assert!(outcome.findings.disclaimers[0].findings.is_empty());
    let violations: Vec<_> = outcome.comments.iter().filter(|c| c.kind == "Violation").collect();
    assert_eq!(violations.len(), 1);
}

/// Scenario 4: an unlocatable required item still gets one comment, on the
/// disclaimer page, without a highlight.
#[test]
fn scenario_unlocated_requirement_gets_anchored_comment() {
    let bytes = guarantee_pdf();
    let bundle = FindingsBundle {
        disclaimers: vec![DisclaimerFindings {
            jurisdiction: Some(Jurisdiction::Uae),
            text: "For residents of the United Arab Emirates: this material is promotional.".into(),
            findings: vec![Finding::missing(
                "Past performance is not indicative of future results",
                Some("Required by SCA rules".into()),
            )],
        }],
        ..Default::default()
    };
    let out = process(&bytes, &bundle).unwrap();

    assert_eq!(out.comments.len(), 1);
    assert_eq!(out.comments[0].page, 2);
    assert_eq!(out.comments[0].kind, "Missing Required");
    assert_eq!(out.comments[0].jurisdiction.as_deref(), Some("UAE"));
    assert_eq!(out.comments[0].highlighted_text, "");
    // no highlight drawn
    assert_eq!(out.bytes, bytes);
}

/// Scenario 4 without any disclaimer section: anchored to page 1.
#[test]
fn scenario_unlocated_requirement_defaults_to_first_page() {
    let bytes = build_pdf(vec![
        TestPage::letter().text(72.0, 100.0, 10.0, "Quarterly update"),
        TestPage::letter().text(72.0, 100.0, 10.0, "Portfolio holdings"),
    ]);
    let bundle = FindingsBundle {
        document_wide: vec![Finding::missing("Capital at risk statement", None)],
        ..Default::default()
    };
    let out = process(&bytes, &bundle).unwrap();
    assert_eq!(out.comments.len(), 1);
    assert_eq!(out.comments[0].page, 1);
}

/// Scenario 5: nothing actionable returns the original bytes and no comments.
#[test]
fn scenario_clean_document_is_untouched() {
    let bytes = build_pdf(vec![TestPage::letter().text(
        72.0,
        100.0,
        10.0,
        "Capital at risk. Past performance is not a reliable indicator.",
    )]);
    let out = process(&bytes, &FindingsBundle::default()).unwrap();
    assert_eq!(out.bytes, bytes);
    assert!(out.comments.is_empty());
}

// ============================================================================
// Properties
// ============================================================================

/// Annotation keeps the document's text.
#[test]
fn annotated_text_matches_original() {
    let bytes = guarantee_pdf();
    let bundle = FindingsBundle {
        document_wide: vec![Finding::violation("Promise", Some("We guarantee a 100% return".into()))],
        ..Default::default()
    };
    let out = process(&bytes, &bundle).unwrap();
    assert_ne!(out.bytes, bytes);
    assert_eq!(text_of(&out.bytes), text_of(&bytes));
}

/// Two independent runs give the same comments.
#[test]
fn annotation_is_repeatable() {
    let bytes = guarantee_pdf();
    let bundle = FindingsBundle {
        document_wide: vec![
            Finding::violation("Promise", Some("We guarantee a 100% return".into())),
            Finding::missing("Licensed by the SCA", None),
        ],
        ..Default::default()
    };
    let first = process(&bytes, &bundle).unwrap();
    let second = process(&bytes, &bundle).unwrap();
    assert_eq!(first.comments, second.comments);
}

/// A superscript-only policy ignores full-size numbers.
#[tokio::test]
async fn superscript_policy_from_config() {
    let config = ScanConfig::from_str("reference_markers = \"superscript\"").unwrap();
    let outcome = ComplianceEngine::new(config)
        .analyze(&footnote_pdf(), &NullClassifier)
        .await
        .unwrap();
    // the marker is 7pt against 12pt body text, so it still counts
    assert_eq!(outcome.findings.footnote_issues.len(), 1);
}

mod locate_props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// A quote present verbatim is found on the page that holds it.
        #[test]
        fn verbatim_quote_found_on_its_page(
            words in prop::collection::vec("[a-z]{3,8}", 4..12),
            page in 0usize..3,
            start in 0usize..4,
        ) {
            let line = words.join(" ");
            let pages = (0..3)
                .map(|i| {
                    let text = if i == page { line.clone() } else { format!("filler page {i}") };
                    TestPage::letter().text(72.0, 100.0, 10.0, &text)
                })
                .collect();
            let doc = PdfDocument::from_bytes(&build_pdf(pages)).unwrap();
            let layouts = doc.layouts();
            let locator = TextLocator::new(&layouts);

            let start = start % (words.len() - 2);
            let quote = words[start..start + 3].join(" ");
            let regions = locator.locate(&quote);
            prop_assert!(!regions.is_empty());
            prop_assert!(regions.iter().any(|r| r.page_index == page));
        }
    }
}
