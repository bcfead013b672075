//! Comparison against a library of approved disclaimers
//!
//! Reference information only: the closest approved wording and which of
//! its required phrases the detected disclaimer carries. Risk and approval
//! do not depend on it.

use serde::{Deserialize, Serialize};
use shared_types::Jurisdiction;
use std::collections::HashSet;
use tracing::debug;

use crate::classifier::DetectedDisclaimer;
use crate::jurisdiction::jurisdiction_of_lead_in;

/// Comparisons kept per analysis.
pub const MAX_COMPARISONS: usize = 5;

/// Share of a phrase's significant words that must appear in the text.
const PHRASE_WORD_SHARE: f64 = 0.7;

/// A pre-approved disclaimer wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedDisclaimer {
    pub id: String,
    #[serde(default)]
    pub jurisdiction: Option<Jurisdiction>,
    pub full_text: String,
    #[serde(default)]
    pub required_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub approved_id: String,
    /// Word-set Jaccard score in 0..=1
    pub similarity: f64,
    pub matched_phrases: Vec<String>,
    pub missing_phrases: Vec<String>,
}

/// Lowercased words longer than two characters, punctuation treated as a
/// separator.
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the two word sets, nudged up by 10% when more
/// than five words are shared.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    let score = intersection as f64 / union as f64;
    if intersection > 5 {
        (score * 1.1).min(1.0)
    } else {
        score
    }
}

fn collapse_lower(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `phrase` appears in `text`, verbatim (case and spacing aside) or
/// through most of its words longer than three characters.
pub fn phrase_present(text: &str, phrase: &str) -> bool {
    let text = collapse_lower(text);
    let phrase = collapse_lower(phrase);
    if text.contains(&phrase) {
        return true;
    }

    let significant: HashSet<&str> = phrase.split(' ').filter(|w| w.chars().count() > 3).collect();
    if significant.is_empty() {
        return false;
    }
    let words: HashSet<&str> = text.split(' ').collect();
    let present = significant.intersection(&words).count();
    present as f64 >= significant.len() as f64 * PHRASE_WORD_SHARE
}

/// Score `detected` against the approved wordings of its jurisdiction,
/// best match first.
///
/// The jurisdiction is the detected one, else the one its lead-in names.
/// When the library has nothing for it, every entry is compared.
pub fn compare_with_approved(
    detected: &DetectedDisclaimer,
    library: &[ApprovedDisclaimer],
) -> Vec<ComparisonResult> {
    let jurisdiction = detected
        .jurisdiction
        .or_else(|| jurisdiction_of_lead_in(&detected.text));

    let mut candidates: Vec<&ApprovedDisclaimer> = match jurisdiction {
        Some(j) => library.iter().filter(|a| a.jurisdiction == Some(j)).collect(),
        None => library.iter().collect(),
    };
    if candidates.is_empty() {
        candidates = library.iter().collect();
    }

    let mut results: Vec<ComparisonResult> = candidates
        .into_iter()
        .map(|approved| {
            let (matched_phrases, missing_phrases) = approved
                .required_phrases
                .iter()
                .cloned()
                .partition(|phrase| phrase_present(&detected.text, phrase));
            ComparisonResult {
                approved_id: approved.id.clone(),
                similarity: similarity(&detected.text, &approved.full_text),
                matched_phrases,
                missing_phrases,
            }
        })
        .collect();
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(MAX_COMPARISONS);

    debug!(
        jurisdiction = ?jurisdiction,
        best = results.first().map(|r| r.similarity),
        "Compared with approved disclaimers"
    );
    results
}
