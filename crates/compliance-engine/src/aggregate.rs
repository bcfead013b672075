//! Finding aggregator
//!
//! Detection passes may finish in any order. Their results are collected
//! first, ordered by submission index and merged on one thread, so "first
//! seen wins" always means the same thing for the same inputs.

use shared_types::{
    DisclaimerFindings, Finding, FindingsBundle, FootnoteIssue, FootnoteLocation, FormattingIssue,
};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::classifier::DetectedDisclaimer;

/// Everything the detection passes produced for one document.
#[derive(Debug, Clone, Default)]
pub struct DetectionResults {
    /// Deterministic high-risk phrase scan
    pub phrase_findings: Vec<Finding>,
    /// Document-wide classifier results tagged with their chunk index
    pub document_batches: Vec<(usize, Vec<Finding>)>,
    /// Per-disclaimer classifier results tagged with detection order
    pub disclaimer_batches: Vec<(usize, DetectedDisclaimer, Vec<Finding>)>,
    pub footnote_issues: Vec<FootnoteIssue>,
    pub formatting_issues: Vec<FormattingIssue>,
    pub footnote_locations: BTreeMap<String, FootnoteLocation>,
}

/// First-seen filter over normalized finding keys.
#[derive(Debug)]
pub struct Deduper {
    key_len: usize,
    seen: HashSet<String>,
}

impl Deduper {
    pub fn new(key_len: usize) -> Self {
        Self {
            key_len,
            seen: HashSet::new(),
        }
    }

    /// True the first time a finding's key is offered.
    pub fn admit(&mut self, finding: &Finding) -> bool {
        self.seen.insert(finding.dedup_key(self.key_len))
    }
}

/// Collapse findings sharing a key, keeping the first of each.
pub fn dedupe_findings(findings: impl IntoIterator<Item = Finding>, key_len: usize) -> Vec<Finding> {
    let mut deduper = Deduper::new(key_len);
    findings.into_iter().filter(|f| deduper.admit(f)).collect()
}

/// Merge detection results into one deduplicated bundle.
///
/// Document-wide findings take precedence: a disclaimer finding whose key
/// already appeared document-wide (or under an earlier disclaimer) is dropped.
pub fn aggregate(mut results: DetectionResults, key_len: usize) -> FindingsBundle {
    results.document_batches.sort_by_key(|(index, _)| *index);
    results.disclaimer_batches.sort_by_key(|(index, _, _)| *index);

    let mut deduper = Deduper::new(key_len);
    let mut document_wide = Vec::new();
    let classifier_findings = results
        .document_batches
        .into_iter()
        .flat_map(|(_, findings)| findings);
    for finding in results.phrase_findings.into_iter().chain(classifier_findings) {
        if deduper.admit(&finding) {
            document_wide.push(finding);
        }
    }

    let mut disclaimers = Vec::new();
    let mut dropped = 0usize;
    for (_, disclaimer, findings) in results.disclaimer_batches {
        let mut kept = Vec::new();
        for finding in findings {
            if deduper.admit(&finding) {
                kept.push(finding);
            } else {
                dropped += 1;
            }
        }
        disclaimers.push(DisclaimerFindings {
            jurisdiction: disclaimer.jurisdiction,
            text: disclaimer.text,
            findings: kept,
        });
    }

    let footnote_issues = dedupe_page_bound(results.footnote_issues, key_len, Finding::FootnoteIssue);
    let formatting_issues =
        dedupe_page_bound(results.formatting_issues, key_len, Finding::FormattingIssue);

    debug!(dropped, "Dropped duplicate disclaimer findings");
    info!(
        document_wide = document_wide.len(),
        disclaimers = disclaimers.len(),
        footnote_issues = footnote_issues.len(),
        formatting_issues = formatting_issues.len(),
        "Findings aggregated"
    );

    FindingsBundle {
        document_wide,
        disclaimers,
        footnote_issues,
        formatting_issues,
        footnote_locations: results.footnote_locations,
    }
}

fn dedupe_page_bound<T: Clone>(issues: Vec<T>, key_len: usize, wrap: fn(T) -> Finding) -> Vec<T> {
    let mut deduper = Deduper::new(key_len);
    issues
        .into_iter()
        .filter(|issue| deduper.admit(&wrap(issue.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use shared_types::{BBox, FootnoteIssueKind, Jurisdiction};

    fn quoted(desc: &str, quote: &str) -> Finding {
        Finding::violation(desc, Some(quote.to_string()))
    }

    fn kuwait() -> DetectedDisclaimer {
        DetectedDisclaimer {
            jurisdiction: Some(Jurisdiction::Kuwait),
            text: "For residents of the State of Kuwait".into(),
        }
    }

    #[test]
    fn test_jurisdiction_duplicate_of_document_finding_is_dropped() {
        let results = DetectionResults {
            phrase_findings: vec![quoted("Promises a return", "We guarantee a 100% return")],
            disclaimer_batches: vec![(
                0,
                kuwait(),
                vec![
                    quoted("Guaranteed return claim", "we guarantee a  100% RETURN"),
                    Finding::missing("CMA licence number", None),
                ],
            )],
            ..Default::default()
        };
        let bundle = aggregate(results, 120);
        assert_eq!(bundle.document_wide.len(), 1);
        assert_eq!(bundle.disclaimers.len(), 1);
        assert_eq!(
            bundle.disclaimers[0].findings,
            vec![Finding::missing("CMA licence number", None)]
        );
    }

    #[test]
    fn test_batches_merge_in_submission_order() {
        let results = DetectionResults {
            document_batches: vec![
                (1, vec![quoted("second chunk", "same quote")]),
                (0, vec![quoted("first chunk", "same quote")]),
            ],
            ..Default::default()
        };
        let bundle = aggregate(results, 120);
        assert_eq!(bundle.document_wide, vec![quoted("first chunk", "same quote")]);
    }

    #[test]
    fn test_footnote_issues_on_different_pages_are_kept() {
        let issue = |page| FootnoteIssue {
            page,
            issue_type: FootnoteIssueKind::ReferenceMissing,
            message: "Footnote reference '3' has no matching footnote in this document.".into(),
            reference: Some("3".into()),
            bbox: Some(BBox::new(1.0, 2.0, 3.0, 4.0)),
        };
        let results = DetectionResults {
            footnote_issues: vec![issue(1), issue(2), issue(2)],
            ..Default::default()
        };
        let bundle = aggregate(results, 120);
        assert_eq!(bundle.footnote_issues.len(), 2);
    }

    #[test]
    fn test_key_length_truncates() {
        let a = quoted("a", "identical opening words then something else");
        let b = quoted("b", "identical opening words then a different ending");
        assert_eq!(dedupe_findings(vec![a.clone(), b.clone()], 23).len(), 1);
        assert_eq!(dedupe_findings(vec![a, b], 120).len(), 2);
    }

    fn finding_strategy() -> impl Strategy<Value = Finding> {
        (
            prop::sample::select(vec!["alpha", "Alpha", "beta", "BETA  ", "gamma delta"]),
            any::<bool>(),
        )
            .prop_map(|(quote, missing)| {
                if missing {
                    Finding::MissingRequirement {
                        phrase: "requirement".into(),
                        reason: None,
                        exact_quote: Some(quote.to_string()),
                        required: true,
                    }
                } else {
                    quoted("violation", quote)
                }
            })
    }

    fn shuffled_findings() -> impl Strategy<Value = (Vec<Finding>, Vec<Finding>)> {
        prop::collection::vec(finding_strategy(), 0..20)
            .prop_flat_map(|findings| (Just(findings.clone()), Just(findings).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn prop_dedupe_is_order_independent((findings, shuffled) in shuffled_findings()) {
            let keys = |fs: &[Finding]| -> Vec<String> {
                let mut keys: Vec<String> = fs.iter().map(|f| f.dedup_key(120)).collect();
                keys.sort();
                keys
            };
            let a = dedupe_findings(findings, 120);
            let b = dedupe_findings(shuffled, 120);
            prop_assert_eq!(keys(&a), keys(&b));

            let mut unique = keys(&a);
            unique.dedup();
            prop_assert_eq!(unique.len(), a.len());
        }
    }
}
