//! Coordinate transformation between PDF user space and page space
//!
//! PDF user space has its origin at the bottom-left of the MediaBox with y
//! growing upward. Page space (used by every box this crate hands out) has
//! its origin at the top-left with y growing downward.

use lopdf::Object;
use shared_types::BBox;

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Transform that applies `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of a unit vertical vector after transformation.
    pub fn vertical_scale(&self) -> f64 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Build from six numeric operands (`cm`, `Tm`, form `Matrix`).
    pub fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let mut v = [0.0f64; 6];
        for (slot, obj) in v.iter_mut().zip(operands.iter()) {
            *slot = number(obj)?;
        }
        Some(Matrix::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

/// Numeric value of an integer or real object.
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Convert a user-space point to page space.
pub fn user_to_page(x: f64, y: f64, media_box: [f64; 4]) -> (f64, f64) {
    let [llx, _lly, _urx, ury] = media_box;
    (x - llx, ury - y)
}

/// Convert a page-space point to user space.
pub fn page_to_user(x: f64, y: f64, media_box: [f64; 4]) -> (f64, f64) {
    let [llx, _lly, _urx, ury] = media_box;
    (x + llx, ury - y)
}

/// Convert a page-space box to a user-space `[llx, lly, urx, ury]` rect.
pub fn bbox_to_user_rect(bbox: &BBox, media_box: [f64; 4]) -> [f64; 4] {
    let (x0, y_top) = page_to_user(bbox.x0, bbox.y0, media_box);
    let (x1, y_bottom) = page_to_user(bbox.x1, bbox.y1, media_box);
    [x0, y_bottom, x1, y_top]
}

/// Convert a user-space rect (any corner order) to a page-space box.
pub fn user_rect_to_bbox(rect: [f64; 4], media_box: [f64; 4]) -> BBox {
    let (x0, y0) = user_to_page(rect[0], rect[1], media_box);
    let (x1, y1) = user_to_page(rect[2], rect[3], media_box);
    BBox::new(x0, y0, x1, y1)
}
