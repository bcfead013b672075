//! The aggregated findings handed to the annotator

use std::collections::BTreeMap;

use crate::geometry::BBox;
use crate::jurisdiction::Jurisdiction;
use crate::types::{Finding, FootnoteIssue, FormattingIssue};

/// Where a footnote definition starts.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FootnoteLocation {
    /// 1-based page number
    pub page: u32,
    pub bbox: BBox,
}

/// Findings for one detected disclaimer.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DisclaimerFindings {
    /// `None` for a general disclaimer
    #[serde(default)]
    pub jurisdiction: Option<Jurisdiction>,
    /// Disclaimer text as detected; used to find the disclaimer section
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl DisclaimerFindings {
    /// Label shown in comments for this disclaimer's findings.
    pub fn label(&self) -> String {
        match self.jurisdiction {
            Some(j) => j.code().to_string(),
            None => crate::jurisdiction::GENERAL_LABEL.to_string(),
        }
    }
}

/// Everything the annotator needs, already deduplicated.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FindingsBundle {
    #[serde(default)]
    pub document_wide: Vec<Finding>,
    #[serde(default)]
    pub disclaimers: Vec<DisclaimerFindings>,
    #[serde(default)]
    pub footnote_issues: Vec<FootnoteIssue>,
    #[serde(default)]
    pub formatting_issues: Vec<FormattingIssue>,
    #[serde(default)]
    pub footnote_locations: BTreeMap<String, FootnoteLocation>,
}

impl FindingsBundle {
    /// Whether anything in the bundle warrants markup.
    pub fn is_actionable(&self) -> bool {
        let quoted = self
            .document_wide
            .iter()
            .chain(self.disclaimers.iter().flat_map(|d| d.findings.iter()))
            .any(|f| f.is_violation() || f.is_missing_requirement());
        quoted || !self.footnote_issues.is_empty() || !self.formatting_issues.is_empty()
    }

    /// All quote-bearing findings, document-wide first.
    pub fn quoted_findings(&self) -> impl Iterator<Item = &Finding> {
        self.document_wide
            .iter()
            .chain(self.disclaimers.iter().flat_map(|d| d.findings.iter()))
    }
}
