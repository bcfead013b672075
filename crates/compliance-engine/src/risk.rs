//! Risk classification and approval

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Finding, FindingsBundle, RiskLevel};

/// Items listed per section of the explanation.
const EXPLANATION_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub risk_level: RiskLevel,
    pub approved: bool,
    pub violations: usize,
    pub missing_required: usize,
    pub missing_optional: usize,
    pub footnote_issues: usize,
    pub formatting_issues: usize,
    pub explanation: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Classify a bundle.
///
/// Every violation and every required missing item counts towards the
/// total. Any violation, or three or more issues, is HIGH; one or two
/// required missing items is MEDIUM.
pub fn summarize(bundle: &FindingsBundle) -> AnalysisSummary {
    let mut violations = Vec::new();
    let mut missing = Vec::new();
    let mut missing_required = 0;
    for finding in bundle.quoted_findings() {
        match finding {
            Finding::Violation { .. } => violations.push(finding.description().to_string()),
            Finding::MissingRequirement { phrase, required, .. } => {
                missing.push(phrase.clone());
                if *required {
                    missing_required += 1;
                }
            }
            Finding::FootnoteIssue(_) | Finding::FormattingIssue(_) => {}
        }
    }

    let total = missing_required + violations.len();
    let risk_level = if total >= 3 || !violations.is_empty() {
        RiskLevel::High
    } else if total >= 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    let approved = risk_level == RiskLevel::Low && missing.is_empty() && violations.is_empty();

    AnalysisSummary {
        risk_level,
        approved,
        violations: violations.len(),
        missing_required,
        missing_optional: missing.len() - missing_required,
        footnote_issues: bundle.footnote_issues.len(),
        formatting_issues: bundle.formatting_issues.len(),
        explanation: explain(risk_level, approved, &violations, &missing),
        analyzed_at: Utc::now(),
    }
}

fn explain(risk_level: RiskLevel, approved: bool, violations: &[String], missing: &[String]) -> String {
    let mut out = format!(
        "Risk level {risk_level}: {} violation(s), {} missing item(s).",
        violations.len(),
        missing.len()
    );
    if approved {
        out.push_str(" No compliance issues found.");
    }
    for (heading, items) in [("Violations", violations), ("Missing", missing)] {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{heading}:"));
        for item in items.iter().take(EXPLANATION_ITEMS) {
            out.push_str(&format!("\n- {item}"));
        }
        if items.len() > EXPLANATION_ITEMS {
            out.push_str(&format!("\n... and {} more", items.len() - EXPLANATION_ITEMS));
        }
    }
    out
}
