//! Text locator
//!
//! Resolves free-form finding text to page regions. `locate` accumulates
//! several matching strategies; `locate_with_fallbacks` walks a cascade of
//! shorter prefixes and finally a keyword when nothing matches.

use lazy_static::lazy_static;
use regex::Regex;
use shared_pdf::{span_matches, PageLayout, PageText};
use shared_types::{Finding, Region};
use std::collections::HashSet;
use tracing::debug;

use crate::jurisdiction::{DISCLAIMER_HEADINGS, LEAD_IN_PHRASES};

/// Queries shorter than this never match.
pub const MIN_QUERY_CHARS: usize = 3;

/// Prefix searched when a long query has no exact match.
const LONG_QUERY_PREFIX: usize = 50;

/// Prefix lengths tried, in order, by `locate_with_fallbacks`.
const FALLBACK_PREFIXES: [usize; 3] = [80, 40, 20];

/// Sentences shorter than this are not searched on their own.
const MIN_SENTENCE_CHARS: usize = 20;

const VIOLATION_KEYWORDS: &[&str] = &["guaranteed", "guarantee", "promise", "forecast", "misleading"];

const MISSING_KEYWORDS: &[&str] = &[
    "past performance",
    "risk",
    "investor",
    "professional",
    "licensed",
    "promotional",
];

lazy_static! {
    static ref PERCENTAGE: Regex = Regex::new(r"\d+(?:\.\d+)?\s*%").unwrap();
}

/// First `n` characters of `s`, on a char boundary.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn too_short(query: &str) -> bool {
    query.trim().chars().count() < MIN_QUERY_CHARS
}

/// Short keyword to search for when no prefix of the finding text matches.
pub fn keyword_for(finding: &Finding) -> Option<String> {
    let text = match finding {
        Finding::Violation {
            description,
            exact_quote,
        } => format!("{} {}", exact_quote.as_deref().unwrap_or(""), description),
        Finding::MissingRequirement {
            phrase,
            exact_quote,
            ..
        } => format!("{} {}", exact_quote.as_deref().unwrap_or(""), phrase),
        Finding::FootnoteIssue(_) | Finding::FormattingIssue(_) => return None,
    };

    if let Some(m) = PERCENTAGE.find(&text) {
        return Some(m.as_str().to_string());
    }

    let vocabulary = if finding.is_violation() {
        VIOLATION_KEYWORDS
    } else {
        MISSING_KEYWORDS
    };
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .find(|word| lower.contains(*word))
        .map(|word| word.to_string())
}

/// Per-request text index over every page of a document.
pub struct TextLocator<'a> {
    layouts: &'a [PageLayout],
    pages: Vec<PageText>,
}

impl<'a> TextLocator<'a> {
    pub fn new(layouts: &'a [PageLayout]) -> Self {
        let pages = layouts.iter().map(PageText::new).collect();
        Self { layouts, pages }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    pub fn layouts(&self) -> &[PageLayout] {
        self.layouts
    }

    fn search_all(&self, query: &str, case_insensitive: bool, out: &mut Vec<Region>) {
        for page in &self.pages {
            for bbox in page.search(query, case_insensitive) {
                out.push(Region::new(page.page_index(), bbox));
            }
        }
    }

    /// Every region matching `query` under any strategy.
    ///
    /// Results are deduplicated by page and rounded top-left corner.
    pub fn locate(&self, query: &str) -> Vec<Region> {
        let query = query.trim();
        if too_short(query) {
            return Vec::new();
        }

        let mut found = Vec::new();
        self.search_all(query, false, &mut found);

        if query != query.to_lowercase() {
            self.search_all(query, true, &mut found);
        }

        if query.chars().count() > LONG_QUERY_PREFIX {
            self.search_all(prefix(query, LONG_QUERY_PREFIX), false, &mut found);
        }

        // any '.' splits, a trailing one included
        if query.contains('.') {
            for sentence in query
                .split('.')
                .map(str::trim)
                .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
                .take(2)
            {
                self.search_all(sentence, false, &mut found);
            }
        }

        dedupe_regions(found)
    }

    /// `locate`, then successively shorter prefixes, then `keyword`.
    pub fn locate_with_fallbacks(&self, query: &str, keyword: Option<&str>) -> Vec<Region> {
        let query = query.trim();
        if too_short(query) {
            return Vec::new();
        }

        let regions = self.locate(query);
        if !regions.is_empty() {
            return regions;
        }

        let len = query.chars().count();
        for n in FALLBACK_PREFIXES {
            if len > n {
                let regions = self.locate(prefix(query, n));
                if !regions.is_empty() {
                    debug!(query, prefix = n, "Located by prefix");
                    return regions;
                }
            }
        }

        match keyword {
            Some(keyword) => {
                let regions = self.locate(keyword);
                if !regions.is_empty() {
                    debug!(query, keyword, "Located by keyword");
                }
                regions
            }
            None => Vec::new(),
        }
    }

    /// Regions for a finding: the fallback cascade, then a raw per-span
    /// keyword search as a last resort.
    pub fn locate_finding(&self, finding: &Finding) -> Vec<Region> {
        let keyword = keyword_for(finding);
        let regions = self.locate_with_fallbacks(finding.best_quote(), keyword.as_deref());
        if !regions.is_empty() {
            return regions;
        }

        let Some(keyword) = keyword.filter(|k| !too_short(k)) else {
            return Vec::new();
        };
        let raw = self
            .layouts
            .iter()
            .flat_map(|layout| {
                span_matches(layout, &keyword)
                    .into_iter()
                    .map(move |bbox| Region::new(layout.index, bbox))
            })
            .collect();
        dedupe_regions(raw)
    }

    /// Regions that mark the disclaimer block: jurisdiction lead-ins,
    /// "Disclaimer" headings and the opening of `hint`.
    ///
    /// Ordered by page and then from the top; the first region is the
    /// anchor for findings that cannot be placed.
    pub fn locate_disclaimer_section(&self, hint: Option<&str>) -> Vec<Region> {
        let mut found = Vec::new();
        for phrase in LEAD_IN_PHRASES.iter().chain(DISCLAIMER_HEADINGS) {
            self.search_all(phrase, true, &mut found);
        }

        if let Some(hint) = hint.map(str::trim).filter(|h| !too_short(h)) {
            let mut hinted = self.locate(prefix(hint, 100));
            if hinted.is_empty() {
                hinted = self.locate(prefix(hint, 50));
            }
            found.extend(hinted);
        }

        let mut regions = dedupe_regions(found);
        regions.sort_by(|a, b| {
            a.page_index
                .cmp(&b.page_index)
                .then(a.bbox.y0.total_cmp(&b.bbox.y0))
        });
        regions
    }

    /// Text under a region, whitespace-normalized.
    pub fn text_in_region(&self, region: &Region) -> String {
        self.pages
            .get(region.page_index)
            .map(|page| page.text_in_rect(&region.bbox))
            .unwrap_or_default()
    }
}

/// Drop regions that land on an already-seen spot, keeping order.
pub fn dedupe_regions(regions: Vec<Region>) -> Vec<Region> {
    let mut seen = HashSet::new();
    regions
        .into_iter()
        .filter(|r| seen.insert(r.spot_key()))
        .collect()
}
