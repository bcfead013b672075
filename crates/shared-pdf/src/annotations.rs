//! Writing highlight and note annotations
//!
//! Annotations are collected as `PendingAnnotation`s in page space and
//! written in one pass. The preferred output is an incremental update
//! appended to the original bytes; `SaveMode::Full` rewrites the file.
//! A single annotation that cannot be attached is skipped and logged.

use lopdf::{dictionary, Dictionary, Document, IncrementalDocument, Object, ObjectId, StringFormat};
use shared_types::BBox;
use tracing::{debug, warn};

use crate::coords::bbox_to_user_rect;
use crate::error::{PdfError, Result};
use crate::parser::PdfDocument;

/// Side of the square icon used for note annotations.
const NOTE_ICON_SIZE: f64 = 18.0;

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    Highlight { opacity: f64 },
    Note,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnnotation {
    pub page_index: usize,
    /// Page space
    pub rect: BBox,
    /// RGB components in 0..1
    pub color: [f64; 3],
    pub title: String,
    pub contents: String,
    pub kind: AnnotationKind,
}

impl PendingAnnotation {
    pub fn highlight(
        page_index: usize,
        rect: BBox,
        color: [f64; 3],
        opacity: f64,
        title: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            page_index,
            rect,
            color,
            title: title.into(),
            contents: contents.into(),
            kind: AnnotationKind::Highlight { opacity },
        }
    }

    /// Note icon whose top-left corner sits at `point` (page space).
    pub fn note(
        page_index: usize,
        point: (f64, f64),
        color: [f64; 3],
        title: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        let (x, y) = point;
        Self {
            page_index,
            rect: BBox::new(x, y, x + NOTE_ICON_SIZE, y + NOTE_ICON_SIZE),
            color,
            title: title.into(),
            contents: contents.into(),
            kind: AnnotationKind::Note,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Append an update section after the original bytes
    Incremental,
    /// Rewrite the whole file
    Full,
}

#[derive(Debug)]
pub struct WriteOutcome {
    pub bytes: Vec<u8>,
    pub written: usize,
    pub skipped: usize,
}

/// Format 0..1 components as `#rrggbb`.
pub fn to_hex_color(color: [f64; 3]) -> String {
    let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", c(color[0]), c(color[1]), c(color[2]))
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn reals(values: &[f64]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v as f32)).collect())
}

fn annotation_dict(annot: &PendingAnnotation, media_box: [f64; 4]) -> Dictionary {
    let [x0, y0, x1, y1] = bbox_to_user_rect(&annot.rect, media_box);
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Rect" => reals(&[x0, y0, x1, y1]),
        "C" => reals(&annot.color),
        "T" => text_string(&annot.title),
        "Contents" => text_string(&annot.contents),
        "F" => 4,
    };
    match annot.kind {
        AnnotationKind::Highlight { opacity } => {
            dict.set("Subtype", Object::Name(b"Highlight".to_vec()));
            // top-left, top-right, bottom-left, bottom-right
            dict.set("QuadPoints", reals(&[x0, y1, x1, y1, x0, y0, x1, y0]));
            dict.set("CA", Object::Real(opacity as f32));
        }
        AnnotationKind::Note => {
            dict.set("Subtype", Object::Name(b"Text".to_vec()));
            dict.set("Name", Object::Name(b"Comment".to_vec()));
            dict.set("Open", Object::Boolean(false));
        }
    }
    dict
}

/// Attach an annotation to a page of `target`, resolving an indirect
/// `Annots` array through `target` first and then `prev`.
fn attach_annotation(
    target: &mut Document,
    prev: Option<&Document>,
    page_id: ObjectId,
    mut annot: Dictionary,
) -> Result<()> {
    let existing: Vec<Object> = {
        let page = target
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| PdfError::Annotation(e.to_string()))?;
        match page.get(b"Annots") {
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Reference(id)) => {
                let resolved = target
                    .get_object(*id)
                    .ok()
                    .or_else(|| prev.and_then(|p| p.get_object(*id).ok()));
                match resolved {
                    Some(Object::Array(arr)) => arr.clone(),
                    _ => {
                        return Err(PdfError::Annotation(format!(
                            "Annots reference {id:?} does not resolve to an array"
                        )))
                    }
                }
            }
            _ => Vec::new(),
        }
    };

    annot.set("P", Object::Reference(page_id));
    let annot_id = target.add_object(Object::Dictionary(annot));

    let page = target
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PdfError::Annotation(e.to_string()))?;
    let mut annots = existing;
    annots.push(Object::Reference(annot_id));
    page.set("Annots", Object::Array(annots));
    Ok(())
}

/// Write `annotations` on top of `source` and serialize.
pub fn write_annotations(
    source: &PdfDocument,
    annotations: &[PendingAnnotation],
    mode: SaveMode,
) -> Result<WriteOutcome> {
    match mode {
        SaveMode::Incremental => write_incremental(source, annotations),
        SaveMode::Full => write_full(source, annotations),
    }
}

fn write_incremental(source: &PdfDocument, annotations: &[PendingAnnotation]) -> Result<WriteOutcome> {
    let mut inc = IncrementalDocument::create_from(source.bytes().to_vec(), source.inner().clone());
    let mut written = 0;
    let mut skipped = 0;

    for annot in annotations {
        let result = source.page_id(annot.page_index).and_then(|page_id| {
            let media_box = source.media_box(annot.page_index)?;
            inc.opt_clone_object_to_new_document(page_id)
                .map_err(|e| PdfError::Annotation(e.to_string()))?;
            let dict = annotation_dict(annot, media_box);
            attach_annotation(&mut inc.new_document, Some(source.inner()), page_id, dict)
        });
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(page = annot.page_index + 1, error = %e, "Skipping annotation");
                skipped += 1;
            }
        }
    }

    let mut bytes = Vec::new();
    inc.save_to(&mut bytes)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    debug!(written, skipped, "Incremental save complete");
    Ok(WriteOutcome {
        bytes,
        written,
        skipped,
    })
}

fn write_full(source: &PdfDocument, annotations: &[PendingAnnotation]) -> Result<WriteOutcome> {
    let mut doc = source.inner().clone();
    let mut written = 0;
    let mut skipped = 0;

    for annot in annotations {
        let result = source.page_id(annot.page_index).and_then(|page_id| {
            let media_box = source.media_box(annot.page_index)?;
            attach_annotation(&mut doc, None, page_id, annotation_dict(annot, media_box))
        });
        match result {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(page = annot.page_index + 1, error = %e, "Skipping annotation");
                skipped += 1;
            }
        }
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    debug!(written, skipped, "Full save complete");
    Ok(WriteOutcome {
        bytes,
        written,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_pdf, TestPage};
    use pretty_assertions::assert_eq;

    fn sample() -> PdfDocument {
        let bytes = build_pdf(vec![TestPage::letter().text(72.0, 100.0, 12.0, "Capital at risk")]);
        PdfDocument::from_bytes(&bytes).unwrap()
    }

    fn pending() -> Vec<PendingAnnotation> {
        vec![
            PendingAnnotation::highlight(
                0,
                BBox::new(72.0, 90.0, 180.0, 103.0),
                [1.0, 0.0, 0.0],
                0.4,
                "Violation",
                "Capital is at risk",
            ),
            PendingAnnotation::note(0, (180.0, 90.0), [1.0, 0.0, 0.0], "Violation", "Capital is at risk"),
        ]
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(to_hex_color([1.0, 0.5, 0.0]), "#ff7f00");
    }

    #[test]
    fn test_incremental_save_appends_to_original() {
        let doc = sample();
        let outcome = write_annotations(&doc, &pending(), SaveMode::Incremental).unwrap();
        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.bytes.starts_with(doc.bytes()));

        let reopened = PdfDocument::from_bytes(&outcome.bytes).unwrap();
        let annots = reopened.existing_annotations(0).unwrap();
        assert_eq!(annots.len(), 2);
        assert!(annots[0].is_highlight());
        assert_eq!(annots[1].subtype, "Text");
        assert!((annots[0].rect.y0 - 90.0).abs() < 0.01);
        assert_eq!(annots[0].contents.as_deref(), Some("Capital is at risk"));
    }

    #[test]
    fn test_full_save_keeps_text() {
        let doc = sample();
        let outcome = write_annotations(&doc, &pending(), SaveMode::Full).unwrap();
        let reopened = PdfDocument::from_bytes(&outcome.bytes).unwrap();
        assert_eq!(reopened.existing_annotations(0).unwrap().len(), 2);
        assert_eq!(reopened.layouts()[0].text(), "Capital at risk");
    }

    #[test]
    fn test_bad_page_is_skipped() {
        let doc = sample();
        let mut annots = pending();
        annots[0].page_index = 9;
        let outcome = write_annotations(&doc, &annots, SaveMode::Full).unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_non_ascii_contents() {
        match text_string("café") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
