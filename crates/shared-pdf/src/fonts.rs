//! Font metrics and text decoding for the layout extractor
//!
//! Only what is needed to place glyphs: advance widths (from `Widths` or a
//! descendant font's `W` array, with a built-in approximation for the
//! standard fonts) and a code-to-text mapping (ToUnicode CMap, else the
//! UTF-16BE / UTF-8 / WinAnsi / Latin-1 fallback cascade).

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::coords::number;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Advance in text space units for a font size of 1
    pub width: f64,
    /// Single-byte code 32, the only code word spacing applies to
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
pub struct FontMetrics {
    base_font: String,
    two_byte: bool,
    monospace: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    missing_width: Option<f64>,
    to_unicode: HashMap<u32, String>,
}

/// Follow a reference to the object it points at.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..8 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Decoded stream bytes; unfiltered streams come back as stored.
pub(crate) fn stream_data(stream: &lopdf::Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn name_of(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
}

impl FontMetrics {
    /// Metrics used when a `Tf` names a font the resources do not define.
    pub fn fallback() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            two_byte: false,
            monospace: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            missing_width: None,
            to_unicode: HashMap::new(),
        }
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::fallback();
        if let Some(base) = name_of(font, b"BaseFont") {
            metrics.base_font = base;
        }
        let lower = metrics.base_font.to_lowercase();
        metrics.monospace = lower.contains("courier") || lower.contains("mono");
        let subtype = name_of(font, b"Subtype").unwrap_or_default();

        if subtype == "Type0" {
            metrics.two_byte = true;
            let descendant = font
                .get(b"DescendantFonts")
                .ok()
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(desc) = descendant {
                metrics.missing_width = desc
                    .get(b"DW")
                    .ok()
                    .and_then(number)
                    .map(|w| w / 1000.0)
                    .or(Some(1.0));
                if let Some(w) = desc.get(b"W").ok().map(|o| resolve(doc, o)) {
                    metrics.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            metrics.first_char = font
                .get(b"FirstChar")
                .ok()
                .and_then(number)
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0);
            if let Ok(arr) = font.get(b"Widths").map(|o| resolve(doc, o)).and_then(|o| o.as_array()) {
                metrics.widths = arr
                    .iter()
                    .map(|o| number(resolve(doc, o)).unwrap_or(0.0) / 1000.0)
                    .collect();
            }
            metrics.missing_width = font
                .get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|d| d.get(b"MissingWidth").ok())
                .and_then(number)
                .filter(|w| *w > 0.0)
                .map(|w| w / 1000.0);
        }

        if let Ok(obj) = font.get(b"ToUnicode") {
            if let Object::Stream(stream) = resolve(doc, obj) {
                metrics.to_unicode = parse_to_unicode(&stream_data(stream));
            }
        }

        metrics
    }

    pub fn name(&self) -> &str {
        &self.base_font
    }

    /// Decode a shown string into positioned glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if !self.two_byte && self.to_unicode.is_empty() {
            if let Some(text) = decode_unicode_string(bytes) {
                return text
                    .chars()
                    .map(|c| Glyph {
                        text: c.to_string(),
                        width: standard_width(c, self.monospace),
                        is_word_space: c == ' ',
                    })
                    .collect();
            }
        }

        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| c.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32))
                .collect()
        } else {
            bytes.iter().map(|b| *b as u32).collect()
        };

        codes
            .into_iter()
            .map(|code| {
                let text = match self.to_unicode.get(&code) {
                    Some(t) => t.clone(),
                    None if self.two_byte => char::from_u32(code)
                        .filter(|c| !c.is_control())
                        .map(String::from)
                        .unwrap_or_default(),
                    None => decode_single_byte(code as u8).to_string(),
                };
                Glyph {
                    width: self.width_of(code, &text),
                    is_word_space: !self.two_byte && code == 32,
                    text,
                }
            })
            .collect()
    }

    fn width_of(&self, code: u32, text: &str) -> f64 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .or(self.missing_width)
                .unwrap_or(1.0);
        }
        if code >= self.first_char {
            if let Some(w) = self.widths.get((code - self.first_char) as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        if let Some(w) = self.missing_width {
            return w;
        }
        standard_width(text.chars().next().unwrap_or(' '), self.monospace)
    }
}

/// UTF-16BE (with BOM) or multi-byte UTF-8 strings written straight into
/// the content stream. Plain single-byte strings return `None`.
fn decode_unicode_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).ok();
    }
    if bytes.iter().any(|b| *b >= 0x80) {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return Some(s.to_string());
        }
    }
    None
}

/// WinAnsi for the 0x80..0x9F block, Latin-1 elsewhere.
pub fn decode_single_byte(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        _ => b as char,
    }
}

/// Approximate Helvetica advance widths for fonts without a `Widths` array.
pub fn standard_width(c: char, monospace: bool) -> f64 {
    if monospace {
        return 0.6;
    }
    match c {
        ' ' | 'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '|' | '\'' | 'f' | 't' | 'I' | '['
        | ']' | '/' | '\\' => 0.278,
        'r' | '-' | '(' | ')' | '`' => 0.333,
        'm' | 'M' => 0.833,
        'w' => 0.722,
        'W' => 0.944,
        '%' => 0.889,
        '@' => 1.015,
        '0'..='9' => 0.556,
        c if c.is_ascii_uppercase() => 0.7,
        _ => 0.556,
    }
}

fn parse_cid_widths(doc: &Document, w: &Object) -> HashMap<u32, f64> {
    let mut out = HashMap::new();
    let Ok(items) = w.as_array() else {
        return out;
    };
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(resolve(doc, &items[i])) else {
            break;
        };
        let first = first as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(ws)) => {
                for (k, wv) in ws.iter().enumerate() {
                    if let Some(v) = number(resolve(doc, wv)) {
                        out.insert(first + k as u32, v / 1000.0);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = number(last).unwrap_or(first as f64) as u32;
                let width = items.get(i + 2).and_then(|o| number(resolve(doc, o)));
                if let Some(v) = width {
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        out.insert(code, v / 1000.0);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    out
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && data[end] != b'>' {
                    end += 1;
                }
                let hex: Vec<u8> = data[start..end]
                    .iter()
                    .copied()
                    .filter(|c| c.is_ascii_hexdigit())
                    .collect();
                let bytes = hex
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let s = if s.len() == 1 { format!("{s}0") } else { s.to_string() };
                        u8::from_str_radix(&s, 16).ok()
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // literal strings never carry mappings we use
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'(' | b'%')
                {
                    i += 1;
                }
                tokens.push(CMapToken::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_text(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return decode_single_byte(bytes[0]).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .filter(|c| c.len() == 2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(code_of(src), utf16_text(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (lo, hi) = match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(lo), CMapToken::Hex(hi)) => (code_of(lo), code_of(hi)),
                        _ => break,
                    };
                    let hi = hi.min(lo.saturating_add(0xFFFF));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            let mut units: Vec<u16> = dst
                                .chunks(2)
                                .filter(|c| c.len() == 2)
                                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                                .collect();
                            if units.is_empty() {
                                units.push(dst.first().copied().unwrap_or(0) as u16);
                            }
                            for code in lo..=hi {
                                let mut shifted = units.clone();
                                if let Some(last) = shifted.last_mut() {
                                    *last = last.wrapping_add((code - lo) as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&shifted));
                            }
                            i += 3;
                        }
                        CMapToken::ArrayStart => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while j < tokens.len() {
                                match &tokens[j] {
                                    CMapToken::Hex(dst) => {
                                        if code <= hi {
                                            map.insert(code, utf16_text(dst));
                                        }
                                        code += 1;
                                        j += 1;
                                    }
                                    CMapToken::ArrayEnd => {
                                        j += 1;
                                        break;
                                    }
                                    _ => break,
                                }
                            }
                            i = j;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    const CMAP: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <0066 0069>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0044> <0045> [<0061> <0062>]
endbfrange
endcmap";

    #[test]
    fn test_parse_to_unicode() {
        let map = parse_to_unicode(CMAP.as_bytes());
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x45).map(String::as_str), Some("b"));
        assert!(map.get(&0x27).is_none());
    }

    #[test]
    fn test_widths_from_font_dict() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 65,
            "LastChar" => 66,
            "Widths" => vec![667.into(), 500.into()],
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        let glyphs = metrics.decode(b"AB ");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "A");
        assert!((glyphs[0].width - 0.667).abs() < 1e-9);
        assert!((glyphs[1].width - 0.5).abs() < 1e-9);
        // outside the Widths range: standard approximation
        assert!((glyphs[2].width - 0.278).abs() < 1e-9);
        assert!(glyphs[2].is_word_space);
    }

    #[test]
    fn test_courier_is_monospace() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        };
        let metrics = FontMetrics::from_dict(&doc, &font);
        assert!(metrics.decode(b"iW").iter().all(|g| (g.width - 0.6).abs() < 1e-9));
    }

    #[test]
    fn test_decode_fallbacks() {
        let metrics = FontMetrics::fallback();
        let utf16: Vec<u8> = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        let text: String = metrics.decode(&utf16).into_iter().map(|g| g.text).collect();
        assert_eq!(text, "Hi");

        let text: String = metrics
            .decode("café".as_bytes())
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(text, "café");

        let text: String = metrics
            .decode(&[b'I', 0x92, b'm'])
            .into_iter()
            .map(|g| g.text)
            .collect();
        assert_eq!(text, "I’m");
    }
}
