//! Content stream interpreter
//!
//! Walks a page's operators keeping the graphics and text state, and emits
//! one `TextRun` per text-showing operator with every character placed in
//! page space. Form XObjects are followed; everything that does not move
//! text or change the fill colour is ignored.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use shared_types::BBox;
use tracing::debug;

use crate::coords::{number, user_to_page, Matrix};
use crate::error::{PdfError, Result};
use crate::fonts::{resolve, resolve_dict, stream_data, FontMetrics};
use crate::layout::CharBox;

/// Glyph box extent relative to the baseline, in units of font size.
const ASCENT: f64 = 0.9;
const DESCENT: f64 = -0.2;

/// TJ adjustments more negative than this (thousandths of an em) read as
/// a word break.
const TJ_SPACE_THRESHOLD: f64 = -100.0;

const MAX_FORM_DEPTH: usize = 8;

/// Text shown by one operator, placed in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub chars: Vec<CharBox>,
    pub font: String,
    /// Effective size after the text and graphics matrices
    pub size: f64,
    /// Packed `0xRRGGBB` fill colour
    pub color: u32,
    pub bbox: BBox,
    /// Page-space y of the baseline at the start of the run
    pub baseline: f64,
}

impl TextRun {
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.c).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.chars.iter().all(|c| c.c.is_whitespace())
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: u32,
    font: Option<Rc<FontMetrics>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: 0,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Pack 0..1 colour components as `0xRRGGBB`.
pub fn pack_rgb(r: f64, g: f64, b: f64) -> u32 {
    let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    (c(r) << 16) | (c(g) << 8) | c(b)
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> u32 {
    pack_rgb((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

/// Fill colour from numeric operands: 1 = gray, 3 = RGB, 4 = CMYK.
fn color_from_operands(operands: &[Object]) -> Option<u32> {
    let nums: Vec<f64> = operands.iter().filter_map(number).collect();
    match nums.len() {
        1 => Some(pack_rgb(nums[0], nums[0], nums[0])),
        3 => Some(pack_rgb(nums[0], nums[1], nums[2])),
        4 => Some(cmyk_to_rgb(nums[0], nums[1], nums[2], nums[3])),
        _ => None,
    }
}

/// Inherited page attribute lookup (`Resources`, `MediaBox`, ...).
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok().and_then(|o| o.as_dict().ok());
    for _ in 0..32 {
        let dict = current?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| resolve_dict(doc, p));
    }
    None
}

fn load_fonts(doc: &Document, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, Rc<FontMetrics>> {
    let mut fonts = HashMap::new();
    let font_dict = resources
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|f| resolve_dict(doc, f));
    if let Some(font_dict) = font_dict {
        for (name, obj) in font_dict.iter() {
            if let Some(dict) = resolve_dict(doc, obj) {
                fonts.insert(name.clone(), Rc::new(FontMetrics::from_dict(doc, dict)));
            }
        }
    }
    fonts
}

pub struct ContentInterpreter<'a> {
    doc: &'a Document,
    media_box: [f64; 4],
    fallback_font: Rc<FontMetrics>,
    runs: Vec<TextRun>,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(doc: &'a Document, media_box: [f64; 4]) -> Self {
        Self {
            doc,
            media_box,
            fallback_font: Rc::new(FontMetrics::fallback()),
            runs: Vec::new(),
        }
    }

    /// Interpret a page's content streams and return its text runs.
    pub fn page_runs(mut self, page_id: ObjectId) -> Result<Vec<TextRun>> {
        let content = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::Content(e.to_string()))?;
        let resources = inherited_attribute(self.doc, page_id, b"Resources")
            .and_then(|r| r.as_dict().ok());
        self.run_stream(&content, resources, GraphicsState::default(), 0)?;
        Ok(self.runs)
    }

    fn run_stream(
        &mut self,
        data: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(data).map_err(|e| PdfError::Content(e.to_string()))?;
        let fonts = load_fonts(self.doc, resources);

        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(number);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    let font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .and_then(|name| fonts.get(name).cloned());
                    gs.font = Some(font.unwrap_or_else(|| self.fallback_font.clone()));
                    gs.font_size = num(1).unwrap_or(gs.font_size);
                }
                "Tc" => gs.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => gs.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => gs.h_scale = num(0).unwrap_or(100.0) / 100.0,
                "TL" => gs.leading = num(0).unwrap_or(0.0),
                "Ts" => gs.rise = num(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let (tx, ty) = (num(0).unwrap_or(0.0), num(1).unwrap_or(0.0));
                    if op.operator == "TD" {
                        gs.leading = -ty;
                    }
                    tlm = Matrix::translate(tx, ty).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let mut chars = Vec::new();
                        self.show(bytes, &gs, &mut tm, &mut chars);
                        self.push_run(chars, &gs, &tm);
                    }
                }
                "'" | "\"" => {
                    let string_at = if op.operator == "\"" {
                        gs.word_spacing = num(0).unwrap_or(gs.word_spacing);
                        gs.char_spacing = num(1).unwrap_or(gs.char_spacing);
                        2
                    } else {
                        0
                    };
                    tlm = Matrix::translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.get(string_at) {
                        let mut chars = Vec::new();
                        self.show(bytes, &gs, &mut tm, &mut chars);
                        self.push_run(chars, &gs, &tm);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let mut chars = Vec::new();
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes, &gs, &mut tm, &mut chars),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        self.adjust(adjust, &gs, &mut tm, &mut chars);
                                    }
                                }
                            }
                        }
                        self.push_run(chars, &gs, &tm);
                    }
                }
                "rg" | "g" | "k" | "sc" | "scn" => {
                    if let Some(color) = color_from_operands(operands) {
                        gs.fill = color;
                    }
                }
                "cs" => gs.fill = 0,
                "Do" => {
                    if depth < MAX_FORM_DEPTH {
                        if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                            self.run_form(name, resources, &gs, depth);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn run_form(&mut self, name: &[u8], resources: Option<&'a Dictionary>, gs: &GraphicsState, depth: usize) {
        let doc = self.doc;
        let stream = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(doc, x))
            .and_then(|x| x.get(name).ok())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(|s| s.as_name())
            .map(|s| s == b"Form")
            .unwrap_or(false);
        if !is_form {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| m.as_array().ok())
            .and_then(|m| Matrix::from_operands(m))
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(doc, r))
            .or(resources);

        let mut inner = gs.clone();
        inner.ctm = matrix.then(&gs.ctm);
        let data = stream_data(stream);
        if let Err(e) = self.run_stream(&data, form_resources, inner, depth + 1) {
            debug!(error = %e, "Skipping unreadable form XObject");
        }
    }

    fn show(&self, bytes: &[u8], gs: &GraphicsState, tm: &mut Matrix, out: &mut Vec<CharBox>) {
        let font = gs.font.clone().unwrap_or_else(|| self.fallback_font.clone());
        let size = gs.font_size;
        let th = gs.h_scale;

        for glyph in font.decode(bytes) {
            let advance = glyph.width * size * th;
            let m = tm.then(&gs.ctm);
            let y_lo = gs.rise + DESCENT * size;
            let y_hi = gs.rise + ASCENT * size;
            let corners: Vec<(f64, f64)> = [(0.0, y_lo), (advance, y_lo), (0.0, y_hi), (advance, y_hi)]
                .iter()
                .map(|&(x, y)| {
                    let (ux, uy) = m.apply(x, y);
                    user_to_page(ux, uy, self.media_box)
                })
                .collect();

            if let Some(bbox) = BBox::from_points(&corners) {
                let count = glyph.text.chars().count();
                if count > 0 {
                    let step = bbox.width() / count as f64;
                    for (i, c) in glyph.text.chars().enumerate() {
                        let x0 = bbox.x0 + step * i as f64;
                        out.push(CharBox {
                            c,
                            bbox: BBox::new(x0, bbox.y0, x0 + step, bbox.y1),
                        });
                    }
                }
            }

            let spacing = gs.char_spacing + if glyph.is_word_space { gs.word_spacing } else { 0.0 };
            let tx = advance + spacing * th;
            *tm = Matrix::translate(tx, 0.0).then(tm);
        }
    }

    /// Apply a numeric TJ element; large negative values become a space.
    fn adjust(&self, amount: f64, gs: &GraphicsState, tm: &mut Matrix, out: &mut Vec<CharBox>) {
        let tx = -amount / 1000.0 * gs.font_size * gs.h_scale;
        if amount < TJ_SPACE_THRESHOLD && !out.last().map(|c| c.c.is_whitespace()).unwrap_or(true) {
            let m = tm.then(&gs.ctm);
            let size = gs.font_size;
            let corners: Vec<(f64, f64)> = [
                (0.0, gs.rise + DESCENT * size),
                (tx, gs.rise + ASCENT * size),
            ]
            .iter()
            .map(|&(x, y)| {
                let (ux, uy) = m.apply(x, y);
                user_to_page(ux, uy, self.media_box)
            })
            .collect();
            if let Some(bbox) = BBox::from_points(&corners) {
                out.push(CharBox { c: ' ', bbox });
            }
        }
        *tm = Matrix::translate(tx, 0.0).then(tm);
    }

    fn push_run(&mut self, chars: Vec<CharBox>, gs: &GraphicsState, tm_after: &Matrix) {
        let Some(first) = chars.first() else {
            return;
        };
        let bbox = chars
            .iter()
            .skip(1)
            .fold(first.bbox, |acc, c| acc.union(&c.bbox));
        let combined = tm_after.then(&gs.ctm);
        let size = (gs.font_size * combined.vertical_scale()).abs();
        // baseline sits DESCENT below the glyph box bottom edge
        let baseline = bbox.y1 + DESCENT * size;
        let font = gs
            .font
            .as_ref()
            .map(|f| f.name().to_string())
            .unwrap_or_else(|| self.fallback_font.name().to_string());
        self.runs.push(TextRun {
            chars,
            font,
            size,
            color: gs.fill,
            bbox,
            baseline,
        });
    }
}
