pub mod bundle;
pub mod geometry;
pub mod jurisdiction;
pub mod types;

pub use bundle::{DisclaimerFindings, FindingsBundle, FootnoteLocation};
pub use geometry::{BBox, Region};
pub use jurisdiction::{Jurisdiction, UnknownJurisdiction, GENERAL_LABEL};
pub use types::{
    normalize_key, Comment, Finding, FootnoteIssue, FootnoteIssueKind, FormattingIssue,
    FormattingIssueKind, RiskLevel, Severity, COMMENT_KEY_LEN,
};
