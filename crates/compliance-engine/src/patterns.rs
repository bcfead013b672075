//! Fast scan for high-risk promotional phrases
//!
//! A deterministic pass run before any classifier call. Patterns are listed
//! from most to least specific; on each page a hit that overlaps an earlier
//! pattern's hit is dropped, so "We guarantee a 100% return" is reported once
//! by the widest pattern rather than four times.

use lazy_static::lazy_static;
use regex::Regex;
use shared_pdf::PageText;
use shared_types::{normalize_key, Finding};
use std::collections::HashSet;

lazy_static! {
    /// High-risk phrase patterns with the violation they describe
    static ref HIGH_RISK_PATTERNS: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(r"(?i)\bwe\s+(?:guarantee|promise)[sd]?\b[^.%]{0,60}?\d+(?:\.\d+)?\s*%\s*(?:annual\s+)?(?:returns?|gains?|profits?|yields?)\b").unwrap(),
            "Promises a specific percentage return to investors",
        ),
        (
            Regex::new(r"(?i)\b100\s*%\s*(?:returns?|gains?|safe|profits?)\b").unwrap(),
            "Claims a 100% return or complete safety of capital",
        ),
        (
            Regex::new(r"(?i)\bguaranteed\s+\w+").unwrap(),
            "Describes an investment outcome as guaranteed",
        ),
        (
            Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*%\s*(?:returns?|gains?|growth|yields?)\b").unwrap(),
            "States a specific percentage return without a risk warning",
        ),
        (
            Regex::new(r"(?i)\bpromised?\s+of\b[^.]{0,60}?\breturns?\b").unwrap(),
            "Makes a promise of returns",
        ),
        (
            Regex::new(r"(?i)\b(?:forecast|predict)(?:s|ed|ing)?\b[^.]{0,60}?\bfuture\s+prices?\b").unwrap(),
            "Forecasts future prices",
        ),
        (
            Regex::new(r"(?i)\bwe\s+(?:guarantee|promise)\b").unwrap(),
            "Makes a guarantee or promise to investors",
        ),
        (
            Regex::new(r"(?i)\bfalse\s+or\s+misleading\b").unwrap(),
            "Contains language about false or misleading statements",
        ),
    ];
}

/// One pattern hit on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseHit {
    pub page_index: usize,
    pub quote: String,
    pub description: &'static str,
}

impl PhraseHit {
    pub fn into_finding(self) -> Finding {
        Finding::violation(self.description, Some(self.quote))
    }
}

/// Scan every page for high-risk phrases.
pub fn scan_high_risk_phrases(pages: &[PageText]) -> Vec<PhraseHit> {
    let mut hits = Vec::new();
    for page in pages {
        let text = page.text();
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut page_hits: Vec<(usize, PhraseHit)> = Vec::new();

        for (pattern, description) in HIGH_RISK_PATTERNS.iter() {
            for m in pattern.find_iter(&text) {
                let (start, end) = (m.start(), m.end());
                if taken.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                taken.push((start, end));
                page_hits.push((
                    start,
                    PhraseHit {
                        page_index: page.page_index(),
                        quote: m.as_str().trim().to_string(),
                        description: *description,
                    },
                ));
            }
        }

        // reading order within the page
        page_hits.sort_by_key(|(start, _)| *start);
        hits.extend(page_hits.into_iter().map(|(_, hit)| hit));
    }
    hits
}

/// Violations for the distinct phrases found, first occurrence wins.
pub fn high_risk_findings(pages: &[PageText], key_len: usize) -> Vec<Finding> {
    let mut seen = HashSet::new();
    scan_high_risk_phrases(pages)
        .into_iter()
        .filter(|hit| seen.insert(normalize_key(&hit.quote, key_len)))
        .map(PhraseHit::into_finding)
        .collect()
}
