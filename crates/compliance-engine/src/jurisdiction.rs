//! Jurisdiction phrases used to find disclaimer sections
//!
//! Marketing material usually opens each regional disclaimer with a
//! "For residents of ..." lead-in, and the whole block tends to sit under a
//! "Disclaimer" heading.

use shared_types::Jurisdiction;

/// Lead-in phrases that open a jurisdiction-specific disclaimer, lowercase.
pub const LEAD_IN_PHRASES: &[&str] = &[
    "for residents of the united arab emirates",
    "for residents of the uae",
    "for residents of the state of kuwait",
    "for residents of the sultanate of oman",
    "for residents of the kingdom of saudi arabia",
    "for residents of the dubai international financial centre",
    "for residents of the difc",
    "for residents of the state of qatar",
];

/// Headings that introduce the disclaimer block.
pub const DISCLAIMER_HEADINGS: &[&str] = &["disclaimer", "disclaimers"];

/// Jurisdiction introduced by a lead-in found in `text`, if any.
pub fn jurisdiction_of_lead_in(text: &str) -> Option<Jurisdiction> {
    let lower = text.to_lowercase();
    LEAD_IN_PHRASES
        .iter()
        .find(|phrase| lower.contains(*phrase))
        .and_then(|phrase| Jurisdiction::match_name(phrase.trim_start_matches("for residents of ")))
}
