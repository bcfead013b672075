//! PDF document wrapper
//!
//! Holds the original bytes next to the parsed document so the writer can
//! append an incremental update to the untouched input.

use lopdf::{Document, Object, ObjectId};
use shared_types::BBox;
use tracing::warn;

use crate::content::{inherited_attribute, ContentInterpreter};
use crate::coords::{number, user_rect_to_bbox};
use crate::error::{PdfError, Result};
use crate::fonts::{resolve, resolve_dict};
use crate::layout::{build_layout, PageLayout};

/// US Letter, used when a page has no usable MediaBox.
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// An annotation already present in the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingAnnotation {
    pub subtype: String,
    /// Page space
    pub rect: BBox,
    pub contents: Option<String>,
}

impl ExistingAnnotation {
    pub fn is_highlight(&self) -> bool {
        self.subtype == "Highlight"
    }
}

pub struct PdfDocument {
    bytes: Vec<u8>,
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Self {
            bytes: bytes.to_vec(),
            doc,
            pages,
        })
    }

    /// The bytes the document was opened from.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    /// Inherited MediaBox as `[llx, lly, urx, ury]`.
    pub fn media_box(&self, index: usize) -> Result<[f64; 4]> {
        let page_id = self.page_id(index)?;
        let media_box = inherited_attribute(&self.doc, page_id, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| {
                let v: Vec<f64> = arr.iter().filter_map(|o| number(resolve(&self.doc, o))).collect();
                (v.len() == 4).then(|| {
                    [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])]
                })
            })
            .filter(|mb| mb[2] > mb[0] && mb[3] > mb[1]);
        Ok(media_box.unwrap_or(DEFAULT_MEDIA_BOX))
    }

    /// Page `(width, height)` in points.
    pub fn page_size(&self, index: usize) -> Result<(f64, f64)> {
        let mb = self.media_box(index)?;
        Ok((mb[2] - mb[0], mb[3] - mb[1]))
    }

    /// Structured layout of one page.
    pub fn page_layout(&self, index: usize) -> Result<PageLayout> {
        let page_id = self.page_id(index)?;
        let media_box = self.media_box(index)?;
        let runs = ContentInterpreter::new(&self.doc, media_box).page_runs(page_id)?;
        Ok(build_layout(
            index,
            media_box[2] - media_box[0],
            media_box[3] - media_box[1],
            runs,
        ))
    }

    /// Layouts of every page. A page that fails to extract contributes an
    /// empty layout.
    pub fn layouts(&self) -> Vec<PageLayout> {
        (0..self.page_count())
            .map(|index| match self.page_layout(index) {
                Ok(layout) => layout,
                Err(e) => {
                    warn!(page = index + 1, error = %e, "Layout extraction failed, skipping page");
                    let (width, height) = self
                        .page_size(index)
                        .unwrap_or((DEFAULT_MEDIA_BOX[2], DEFAULT_MEDIA_BOX[3]));
                    PageLayout::empty(index, width, height)
                }
            })
            .collect()
    }

    /// Annotations already embedded on a page.
    pub fn existing_annotations(&self, index: usize) -> Result<Vec<ExistingAnnotation>> {
        let page_id = self.page_id(index)?;
        let media_box = self.media_box(index)?;
        let page = self
            .doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| PdfError::Parse(e.to_string()))?;

        let Ok(annots) = page.get(b"Annots").map(|a| resolve(&self.doc, a)) else {
            return Ok(Vec::new());
        };
        let Ok(items) = annots.as_array() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for item in items {
            let Some(dict) = resolve_dict(&self.doc, item) else {
                continue;
            };
            let subtype = dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .unwrap_or_default();
            let rect: Vec<f64> = dict
                .get(b"Rect")
                .map(|r| resolve(&self.doc, r))
                .and_then(|r| r.as_array())
                .map(|arr| arr.iter().filter_map(|o| number(resolve(&self.doc, o))).collect())
                .unwrap_or_default();
            if rect.len() != 4 {
                continue;
            }
            let contents = dict.get(b"Contents").ok().and_then(|c| match resolve(&self.doc, c) {
                Object::String(bytes, _) => Some(decode_text_string(bytes)),
                _ => None,
            });
            out.push(ExistingAnnotation {
                subtype,
                rect: user_rect_to_bbox([rect[0], rect[1], rect[2], rect[3]], media_box),
                contents,
            });
        }
        Ok(out)
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, else PDFDocEncoding as Latin-1).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
