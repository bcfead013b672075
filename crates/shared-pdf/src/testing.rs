//! Synthetic PDFs for tests
//!
//! Pages use a single Courier font (every glyph 0.6 em wide) so text
//! positions are predictable. Coordinates are page space: `y` is the
//! baseline measured from the top of the page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use shared_types::BBox;

use crate::coords::bbox_to_user_rect;

#[derive(Debug, Clone)]
pub struct TestPage {
    width: f64,
    height: f64,
    ops: Vec<Operation>,
    highlights: Vec<BBox>,
}

impl TestPage {
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            highlights: Vec::new(),
        }
    }

    pub fn text(self, x: f64, y: f64, size: f64, text: &str) -> Self {
        self.colored_text(x, y, size, (0.0, 0.0, 0.0), text)
    }

    pub fn colored_text(mut self, x: f64, y: f64, size: f64, rgb: (f64, f64, f64), text: &str) -> Self {
        let baseline = self.height - y;
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "rg",
                vec![Object::Real(rgb.0 as f32), Object::Real(rgb.1 as f32), Object::Real(rgb.2 as f32)],
            ),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Real(size as f32)]),
            Operation::new("Td", vec![Object::Real(x as f32), Object::Real(baseline as f32)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self
    }

    /// Lines of body text starting at `y`, 14pt apart.
    pub fn paragraph(mut self, x: f64, y: f64, size: f64, lines: &[&str]) -> Self {
        for (i, line) in lines.iter().enumerate() {
            self = self.text(x, y + 14.0 * i as f64, size, line);
        }
        self
    }

    /// A pre-existing highlight annotation over a page-space box.
    pub fn highlight(mut self, rect: BBox) -> Self {
        self.highlights.push(rect);
        self
    }

    pub fn raw_ops(mut self, ops: Vec<Operation>) -> Self {
        self.ops.extend(ops);
        self
    }
}

/// Serialize pages into a complete PDF file.
pub fn build_pdf(pages: Vec<TestPage>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for page in pages {
        let media_box = [0.0, 0.0, page.width, page.height];
        let content = Content { operations: page.ops };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap_or_default(),
        ));
        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page.width as f32), Object::Real(page.height as f32)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        if !page.highlights.is_empty() {
            let annots: Vec<Object> = page
                .highlights
                .iter()
                .map(|b| {
                    let r = bbox_to_user_rect(b, media_box);
                    let id = doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Highlight",
                        "Rect" => r.iter().map(|v| Object::Real(*v as f32)).collect::<Vec<_>>(),
                        "C" => vec![Object::Real(1.0), Object::Real(1.0), Object::Real(0.0)],
                    });
                    Object::Reference(id)
                })
                .collect();
            page_dict.set("Annots", annots);
        }
        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    // in-memory write of a freshly built document
    let _ = doc.save_to(&mut buffer);
    buffer
}

/// One US Letter page with the given raw content operations.
pub fn single_page_pdf(ops: Vec<Operation>) -> Vec<u8> {
    build_pdf(vec![TestPage::letter().raw_ops(ops)])
}
