use crate::geometry::BBox;

/// Characters of message/quote text kept when building comment keys.
pub const COMMENT_KEY_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Overall risk of a document, derived from its findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootnoteIssueKind {
    #[serde(rename = "footnote_reference_missing")]
    ReferenceMissing,
}

/// A footnote problem, bound to a page at creation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FootnoteIssue {
    /// 1-based page number
    pub page: u32,
    pub issue_type: FootnoteIssueKind,
    pub message: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormattingIssueKind {
    UnusualColor,
    ExistingHighlight,
}

/// A formatting anomaly (leftover red text, carried-over highlight).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FormattingIssue {
    /// 1-based page number
    pub page: u32,
    pub issue_type: FormattingIssueKind,
    pub message: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub bbox: Option<BBox>,
}

fn default_required() -> bool {
    true
}

/// A single compliance issue prior to being anchored to a page.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    Violation {
        description: String,
        #[serde(default)]
        exact_quote: Option<String>,
    },
    MissingRequirement {
        phrase: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        exact_quote: Option<String>,
        #[serde(default = "default_required")]
        required: bool,
    },
    FootnoteIssue(FootnoteIssue),
    FormattingIssue(FormattingIssue),
}

impl Finding {
    pub fn violation(description: impl Into<String>, exact_quote: Option<String>) -> Self {
        Finding::Violation {
            description: description.into(),
            exact_quote,
        }
    }

    pub fn missing(phrase: impl Into<String>, reason: Option<String>) -> Self {
        Finding::MissingRequirement {
            phrase: phrase.into(),
            reason,
            exact_quote: None,
            required: true,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::Violation { .. } => Severity::High,
            Finding::MissingRequirement { required: true, .. } => Severity::High,
            Finding::MissingRequirement { required: false, .. } => Severity::Medium,
            Finding::FootnoteIssue(_) => Severity::Medium,
            Finding::FormattingIssue(_) => Severity::Low,
        }
    }

    /// Human-readable type label shown in comments.
    pub fn type_label(&self) -> &'static str {
        match self {
            Finding::Violation { .. } => "Violation",
            Finding::MissingRequirement { required: true, .. } => "Missing Required",
            Finding::MissingRequirement { required: false, .. } => "Non Compliant",
            Finding::FootnoteIssue(issue) => match issue.issue_type {
                FootnoteIssueKind::ReferenceMissing => "Footnote Reference Missing",
            },
            Finding::FormattingIssue(issue) => match issue.issue_type {
                FormattingIssueKind::UnusualColor => "Unusual Color",
                FormattingIssueKind::ExistingHighlight => "Existing Highlight",
            },
        }
    }

    /// Verbatim document text attached to the finding, if any.
    pub fn exact_quote(&self) -> Option<&str> {
        let quote = match self {
            Finding::Violation { exact_quote, .. } => exact_quote.as_deref(),
            Finding::MissingRequirement { exact_quote, .. } => exact_quote.as_deref(),
            Finding::FootnoteIssue(issue) => issue.reference.as_deref(),
            Finding::FormattingIssue(issue) => issue.text.as_deref(),
        };
        quote.filter(|q| !q.trim().is_empty())
    }

    /// The description/phrase the finding was reported with.
    pub fn description(&self) -> &str {
        match self {
            Finding::Violation { description, .. } => description,
            Finding::MissingRequirement { phrase, .. } => phrase,
            Finding::FootnoteIssue(issue) => &issue.message,
            Finding::FormattingIssue(issue) => &issue.message,
        }
    }

    /// Exact quote when present, else the description.
    pub fn best_quote(&self) -> &str {
        self.exact_quote().unwrap_or_else(|| self.description())
    }

    /// Message carried by the comment and the popup note.
    pub fn message(&self) -> String {
        match self {
            Finding::Violation { description, .. } => description.clone(),
            Finding::MissingRequirement { phrase, reason, .. } => match reason {
                Some(reason) if !reason.trim().is_empty() => format!("{phrase}: {reason}"),
                _ => format!("Required statement missing: {phrase}"),
            },
            Finding::FootnoteIssue(issue) => issue.message.clone(),
            Finding::FormattingIssue(issue) => issue.message.clone(),
        }
    }

    /// Page for findings that are bound to one at creation (1-based).
    pub fn page(&self) -> Option<u32> {
        match self {
            Finding::FootnoteIssue(issue) => Some(issue.page),
            Finding::FormattingIssue(issue) => Some(issue.page),
            _ => None,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Finding::FootnoteIssue(issue) => issue.bbox,
            Finding::FormattingIssue(issue) => issue.bbox,
            _ => None,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Finding::Violation { .. })
    }

    pub fn is_missing_requirement(&self) -> bool {
        matches!(self, Finding::MissingRequirement { .. })
    }

    /// Dedup identity: normalized best quote, plus page and position for
    /// page-bound findings (the same message on two pages is two issues).
    pub fn dedup_key(&self, max_chars: usize) -> String {
        let base = normalize_key(self.best_quote(), max_chars);
        match self {
            Finding::FootnoteIssue(issue) => {
                format!("{}|p{}|{}", base, issue.page, issue.reference.as_deref().unwrap_or(""))
            }
            Finding::FormattingIssue(issue) => {
                let pos = issue
                    .bbox
                    .map(|b| format!("{:.1},{:.1}", b.x0, b.y0))
                    .unwrap_or_default();
                format!("{}|{:?}|p{}|{}", base, issue.issue_type, issue.page, pos)
            }
            _ => base,
        }
    }
}

/// Lowercase, collapse whitespace and keep the first `max_chars` chars.
pub fn normalize_key(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let key: String = collapsed.to_lowercase().chars().take(max_chars).collect();
    key.trim_end().to_string()
}

/// User-facing record: one per finding and located region.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Comment {
    /// 1-based page number
    pub page: u32,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `#rrggbb`
    pub color: String,
    pub highlighted_text: String,
    pub jurisdiction: Option<String>,
    pub search_text: Option<String>,
}

impl Comment {
    /// Identity used when collapsing duplicate comments.
    pub fn dedup_key(&self) -> (String, String, u32) {
        let anchor = if self.highlighted_text.trim().is_empty() {
            self.search_text.as_deref().unwrap_or("")
        } else {
            &self.highlighted_text
        };
        (
            normalize_key(&self.text, COMMENT_KEY_LEN),
            normalize_key(anchor, COMMENT_KEY_LEN),
            self.page,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_severity_follows_variant() {
        assert_eq!(Finding::violation("x", None).severity(), Severity::High);
        assert_eq!(Finding::missing("risk warning", None).severity(), Severity::High);
        let optional = Finding::MissingRequirement {
            phrase: "licence number".into(),
            reason: None,
            exact_quote: None,
            required: false,
        };
        assert_eq!(optional.severity(), Severity::Medium);
        assert_eq!(optional.type_label(), "Non Compliant");
    }

    #[test]
    fn test_best_quote_prefers_exact_quote() {
        let f = Finding::violation("Promises returns", Some("guarantee a 100% return".into()));
        assert_eq!(f.best_quote(), "guarantee a 100% return");

        let blank = Finding::violation("Promises returns", Some("   ".into()));
        assert_eq!(blank.best_quote(), "Promises returns");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  We  Guarantee\n a RETURN ", 120), "we guarantee a return");
        assert_eq!(normalize_key("abcdef", 3), "abc");
    }

    #[test]
    fn test_page_bound_keys_include_page() {
        let issue = |page| {
            Finding::FootnoteIssue(FootnoteIssue {
                page,
                issue_type: FootnoteIssueKind::ReferenceMissing,
                message: "Footnote reference '3' has no matching footnote in this document.".into(),
                reference: Some("3".into()),
                bbox: None,
            })
        };
        assert_ne!(issue(1).dedup_key(120), issue(2).dedup_key(120));
        assert_eq!(issue(2).dedup_key(120), issue(2).dedup_key(120));
    }

    #[test]
    fn test_finding_json_is_tagged() {
        let f = Finding::missing("past performance", Some("Required by regulator".into()));
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["kind"], "missing_requirement");
        assert_eq!(json["required"], true);

        let parsed: Finding =
            serde_json::from_str(r#"{"kind":"violation","description":"Guaranteed returns"}"#)
                .unwrap();
        assert_eq!(parsed, Finding::violation("Guaranteed returns", None));
    }

    #[test]
    fn test_comment_json_shape() {
        let c = Comment {
            page: 2,
            text: "Guaranteed returns".into(),
            kind: "Violation".into(),
            color: "#ff0000".into(),
            highlighted_text: "guaranteed returns".into(),
            jurisdiction: Some("Document-wide".into()),
            search_text: None,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "Violation");
        assert_eq!(json["page"], 2);
        assert!(json["search_text"].is_null());
    }

    proptest::proptest! {
        #[test]
        fn prop_normalize_key_is_idempotent(text in "\\PC{0,200}", len in 1usize..150) {
            let once = normalize_key(&text, len);
            proptest::prop_assert!(once.chars().count() <= len);
            proptest::prop_assert_eq!(normalize_key(&once, len), once.clone());
        }
    }
}
