//! Compliance classifier seam
//!
//! The classifier (LLM-backed in production) identifies disclaimers and
//! judges text against jurisdiction checklists. Its output arrives as loosely
//! structured JSON; `parse_findings` accepts every shape seen in practice and
//! degrades to an empty result instead of failing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{Finding, Jurisdiction};
use tracing::warn;

use crate::error::ClassifierError;

/// A disclaimer found in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedDisclaimer {
    /// `None` for a general disclaimer
    pub jurisdiction: Option<Jurisdiction>,
    pub text: String,
}

/// Consecutive pages sent together for a document-wide check.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChunk {
    /// Submission order
    pub index: usize,
    /// 0-based index of the first page
    pub first_page: usize,
    pub text: String,
}

impl PageChunk {
    /// Group page texts into chunks of `pages_per_chunk` pages.
    pub fn split(pages: &[String], pages_per_chunk: usize) -> Vec<PageChunk> {
        pages
            .chunks(pages_per_chunk.max(1))
            .enumerate()
            .map(|(index, chunk)| {
                let first_page = index * pages_per_chunk.max(1);
                let text = chunk
                    .iter()
                    .enumerate()
                    .map(|(i, page)| format!("[Page {}]\n{}", first_page + i + 1, page))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                PageChunk {
                    index,
                    first_page,
                    text,
                }
            })
            .collect()
    }
}

#[async_trait]
pub trait ComplianceClassifier: Send + Sync {
    /// Identify the disclaimers in the document's page texts.
    async fn detect_disclaimers(&self, pages: &[String]) -> Result<Vec<DetectedDisclaimer>, ClassifierError>;

    /// Judge one disclaimer against its jurisdiction's requirements.
    async fn check_disclaimer(&self, disclaimer: &DetectedDisclaimer) -> Result<Vec<Finding>, ClassifierError>;

    /// Look for violations in a chunk of document pages.
    async fn scan_chunk(&self, chunk: &PageChunk) -> Result<Vec<Finding>, ClassifierError>;
}

/// Classifier that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

#[async_trait]
impl ComplianceClassifier for NullClassifier {
    async fn detect_disclaimers(&self, _pages: &[String]) -> Result<Vec<DetectedDisclaimer>, ClassifierError> {
        Ok(Vec::new())
    }

    async fn check_disclaimer(&self, _disclaimer: &DetectedDisclaimer) -> Result<Vec<Finding>, ClassifierError> {
        Ok(Vec::new())
    }

    async fn scan_chunk(&self, _chunk: &PageChunk) -> Result<Vec<Finding>, ClassifierError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RecordedDisclaimer {
    #[serde(default)]
    jurisdiction: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default, alias = "response")]
    findings: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Recording {
    #[serde(default)]
    disclaimers: Vec<RecordedDisclaimer>,
    #[serde(default, alias = "document_wide")]
    document: Value,
}

/// Replays classifier responses captured earlier.
///
/// ```json
/// {
///   "disclaimers": [
///     { "jurisdiction": "KSA", "text": "For residents of ...",
///       "findings": { "missing_required": [{ "element": "CMA licence number" }] } }
///   ],
///   "document": { "violations": ["Guaranteed returns"] }
/// }
/// ```
///
/// Document findings are returned for the first chunk only so a multi-chunk
/// run does not repeat them.
#[derive(Debug, Clone, Default)]
pub struct RecordedClassifier {
    disclaimers: Vec<(DetectedDisclaimer, Vec<Finding>)>,
    document: Vec<Finding>,
}

impl RecordedClassifier {
    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let recording: Recording = serde_json::from_str(strip_code_fences(raw))?;
        let disclaimers = recording
            .disclaimers
            .into_iter()
            .map(|d| {
                let disclaimer = DetectedDisclaimer {
                    jurisdiction: d.jurisdiction.as_deref().and_then(Jurisdiction::match_name),
                    text: d.text,
                };
                (disclaimer, findings_from_value(&d.findings))
            })
            .collect();
        Ok(Self {
            disclaimers,
            document: findings_from_value(&recording.document),
        })
    }
}

#[async_trait]
impl ComplianceClassifier for RecordedClassifier {
    async fn detect_disclaimers(&self, _pages: &[String]) -> Result<Vec<DetectedDisclaimer>, ClassifierError> {
        Ok(self.disclaimers.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn check_disclaimer(&self, disclaimer: &DetectedDisclaimer) -> Result<Vec<Finding>, ClassifierError> {
        Ok(self
            .disclaimers
            .iter()
            .find(|(d, _)| d == disclaimer)
            .map(|(_, findings)| findings.clone())
            .unwrap_or_default())
    }

    async fn scan_chunk(&self, chunk: &PageChunk) -> Result<Vec<Finding>, ClassifierError> {
        if chunk.index == 0 {
            Ok(self.document.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a raw classifier response into findings. Malformed text yields
/// nothing.
pub fn parse_findings(raw: &str) -> Vec<Finding> {
    match serde_json::from_str::<Value>(strip_code_fences(raw)) {
        Ok(value) => findings_from_value(&value),
        Err(e) => {
            warn!(error = %e, "Malformed classifier response, treating as empty");
            Vec::new()
        }
    }
}

/// Parse a raw disclaimer-detection response.
pub fn parse_disclaimers(raw: &str) -> Vec<DetectedDisclaimer> {
    let value = match serde_json::from_str::<Value>(strip_code_fences(raw)) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Malformed disclaimer response, treating as empty");
            return Vec::new();
        }
    };
    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("disclaimers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| {
            let text = str_field(item, &["text", "disclaimer_text", "disclaimer"])?;
            let jurisdiction = str_field(item, &["jurisdiction"]).and_then(|j| Jurisdiction::match_name(&j));
            Some(DetectedDisclaimer { jurisdiction, text })
        })
        .collect()
}

fn str_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn findings_from_value(value: &Value) -> Vec<Finding> {
    match value {
        Value::String(raw) => parse_findings(raw),
        Value::Object(_) => {
            let mut findings = Vec::new();
            for item in array_field(value, "violations") {
                if let Some(f) = violation_from(item) {
                    findings.push(f);
                }
            }
            for item in array_field(value, "missing_required") {
                if let Some(f) = missing_from(item) {
                    findings.push(f);
                }
            }
            for item in array_field(value, "checklist") {
                if let Some(f) = checklist_item_from(item) {
                    findings.push(f);
                }
            }
            findings
        }
        _ => Vec::new(),
    }
}

fn array_field<'v>(value: &'v Value, name: &str) -> &'v [Value] {
    value
        .get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn violation_from(item: &Value) -> Option<Finding> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(Finding::violation(s.trim(), None)),
        Value::Object(_) => {
            let description = str_field(item, &["violation", "description", "issue"])?;
            let exact_quote = str_field(item, &["exact_quote", "quote"]);
            Some(Finding::violation(description, exact_quote))
        }
        _ => None,
    }
}

fn missing_from(item: &Value) -> Option<Finding> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(Finding::missing(s.trim(), None)),
        Value::Object(_) => {
            let phrase = str_field(item, &["element", "missing_element", "phrase"])?;
            Some(Finding::MissingRequirement {
                phrase,
                reason: str_field(item, &["reason", "missing_details"]),
                exact_quote: str_field(item, &["exact_quote", "quote"]),
                required: item.get("is_required").and_then(Value::as_bool).unwrap_or(true),
            })
        }
        _ => None,
    }
}

/// Non-compliant checklist items become missing requirements.
fn checklist_item_from(item: &Value) -> Option<Finding> {
    let compliant = item
        .get("compliant")
        .or_else(|| item.get("is_compliant"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if compliant {
        return None;
    }
    Some(Finding::MissingRequirement {
        phrase: str_field(item, &["item", "element"])?,
        reason: str_field(item, &["missing_details", "reason"]),
        exact_quote: str_field(item, &["exact_quote", "quote"]),
        required: item.get("is_required").and_then(Value::as_bool).unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[]\n```\n"), "[]");
    }

    #[test]
    fn test_parse_mixed_violation_shapes() {
        let raw = r#"```json
        {
          "violations": [
            "Promises guaranteed returns",
            {"violation": "Forecasts prices", "exact_quote": "prices will double"},
            {"exact_quote": "no description"},
            42
          ],
          "missing_required": [
            {"element": "Risk warning", "exact_quote": null},
            {"missing_element": "Licence number", "checklist_reference": "3.1"}
          ]
        }
        ```"#;
        let findings = parse_findings(raw);
        assert_eq!(
            findings,
            vec![
                Finding::violation("Promises guaranteed returns", None),
                Finding::violation("Forecasts prices", Some("prices will double".into())),
                Finding::missing("Risk warning", None),
                Finding::missing("Licence number", None),
            ]
        );
    }

    #[test]
    fn test_checklist_items() {
        let raw = r#"{"checklist": [
            {"item": "CMA licence", "is_required": true, "compliant": false, "missing_details": "No licence number"},
            {"item": "Office address", "is_required": false, "compliant": false},
            {"item": "Risk warning", "is_required": true, "compliant": true}
        ]}"#;
        let findings = parse_findings(raw);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].message(), "CMA licence: No licence number");
        assert_eq!(findings[1].severity(), shared_types::Severity::Medium);
    }

    #[test]
    fn test_malformed_is_empty() {
        assert!(parse_findings("I could not analyse this document.").is_empty());
        assert!(parse_findings("[1, 2, 3]").is_empty());
        assert!(parse_disclaimers("{{{").is_empty());
    }

    #[test]
    fn test_parse_disclaimers() {
        let raw = r#"{"disclaimers": [
            {"jurisdiction": "Kingdom of Saudi Arabia", "text": "For residents of the Kingdom of Saudi Arabia ..."},
            {"jurisdiction": "general", "text": "This material is for information only."},
            {"jurisdiction": "UAE"}
        ]}"#;
        let disclaimers = parse_disclaimers(raw);
        assert_eq!(disclaimers.len(), 2);
        assert_eq!(disclaimers[0].jurisdiction, Some(Jurisdiction::Ksa));
        assert_eq!(disclaimers[1].jurisdiction, None);
    }

    #[test]
    fn test_page_chunks() {
        let pages: Vec<String> = (1..=7).map(|i| format!("text {i}")).collect();
        let chunks = PageChunk::split(&pages, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].first_page, 5);
        assert!(chunks[1].text.starts_with("[Page 6]\ntext 6"));
    }

    #[tokio::test]
    async fn test_recorded_classifier() {
        let raw = r#"{
            "disclaimers": [
                {"jurisdiction": "Oman", "text": "For residents of the Sultanate of Oman",
                 "findings": {"missing_required": [{"element": "CMA approval"}]}}
            ],
            "document": "```json\n{\"violations\": [\"Guaranteed income\"]}\n```"
        }"#;
        let classifier = RecordedClassifier::from_json(raw).unwrap();
        let disclaimers = classifier.detect_disclaimers(&[]).await.unwrap();
        assert_eq!(disclaimers.len(), 1);
        assert_eq!(disclaimers[0].jurisdiction, Some(Jurisdiction::Oman));

        let findings = classifier.check_disclaimer(&disclaimers[0]).await.unwrap();
        assert_eq!(findings, vec![Finding::missing("CMA approval", None)]);

        let chunk = |index| PageChunk {
            index,
            first_page: 0,
            text: String::new(),
        };
        assert_eq!(classifier.scan_chunk(&chunk(0)).await.unwrap().len(), 1);
        assert!(classifier.scan_chunk(&chunk(1)).await.unwrap().is_empty());
    }

    #[test]
    fn test_recording_must_be_json() {
        assert!(matches!(
            RecordedClassifier::from_json("not json"),
            Err(ClassifierError::Malformed(_))
        ));
    }
}
