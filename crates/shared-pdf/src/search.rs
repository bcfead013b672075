//! Per-page text search returning bounding boxes
//!
//! The page text is flattened in reading order with one box per character.
//! Runs of whitespace (including line breaks) collapse to a single space so
//! a quote wrapped over two lines still matches. A match spanning several
//! lines yields one box per line.

use shared_types::BBox;

use crate::layout::{needs_space, PageLayout};

#[derive(Debug, Clone, Copy)]
struct IndexedChar {
    c: char,
    folded: char,
    /// `None` for synthetic line-break spaces
    bbox: Option<BBox>,
    line: usize,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Searchable text of one page.
#[derive(Debug, Clone)]
pub struct PageText {
    page_index: usize,
    chars: Vec<IndexedChar>,
}

impl PageText {
    pub fn new(layout: &PageLayout) -> Self {
        let mut raw: Vec<IndexedChar> = Vec::new();
        for (line_no, line) in layout.lines().enumerate() {
            for (i, span) in line.spans.iter().enumerate() {
                if i > 0 && needs_space(&line.spans[i - 1], span) {
                    let prev = &line.spans[i - 1];
                    raw.push(IndexedChar {
                        c: ' ',
                        folded: ' ',
                        bbox: Some(BBox::new(prev.bbox.x1, span.bbox.y0, span.bbox.x0, span.bbox.y1)),
                        line: line_no,
                    });
                }
                for ch in span.chars() {
                    raw.push(IndexedChar {
                        c: ch.c,
                        folded: fold(ch.c),
                        bbox: Some(ch.bbox),
                        line: line_no,
                    });
                }
            }
            raw.push(IndexedChar {
                c: ' ',
                folded: ' ',
                bbox: None,
                line: line_no,
            });
        }

        // collapse whitespace runs to one plain space
        let mut chars: Vec<IndexedChar> = Vec::with_capacity(raw.len());
        for mut ch in raw {
            if ch.c.is_whitespace() {
                if chars.last().map(|l| l.c == ' ').unwrap_or(true) {
                    continue;
                }
                ch.c = ' ';
                ch.folded = ' ';
            }
            chars.push(ch);
        }
        while chars.last().map(|l| l.c == ' ').unwrap_or(false) {
            chars.pop();
        }

        Self {
            page_index: layout.index,
            chars,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Whitespace-normalized page text.
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.c).collect()
    }

    /// Every non-overlapping occurrence of `needle`, one box per line touched.
    pub fn search(&self, needle: &str, case_insensitive: bool) -> Vec<BBox> {
        let needle: Vec<char> = needle
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .map(|c| if case_insensitive { fold(c) } else { c })
            .collect();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return Vec::new();
        }

        let mut rects = Vec::new();
        let mut start = 0;
        while start + needle.len() <= self.chars.len() {
            let window = &self.chars[start..start + needle.len()];
            let hit = window.iter().zip(needle.iter()).all(|(ch, n)| {
                let c = if case_insensitive { ch.folded } else { ch.c };
                c == *n
            });
            if hit {
                rects.extend(line_boxes(window));
                start += needle.len();
            } else {
                start += 1;
            }
        }
        rects
    }

    /// Text of the characters whose centre lies inside `rect`.
    pub fn text_in_rect(&self, rect: &BBox) -> String {
        let area = rect.expand(0.5);
        let mut out = String::new();
        let mut last_line = None;
        for ch in &self.chars {
            let Some(bbox) = ch.bbox else {
                continue;
            };
            let (cx, cy) = bbox.center();
            if !area.contains_point(cx, cy) {
                continue;
            }
            if last_line.is_some() && last_line != Some(ch.line) && !out.ends_with(' ') {
                out.push(' ');
            }
            last_line = Some(ch.line);
            out.push(ch.c);
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn line_boxes(window: &[IndexedChar]) -> Vec<BBox> {
    let mut boxes: Vec<(usize, BBox)> = Vec::new();
    for ch in window {
        let Some(bbox) = ch.bbox else {
            continue;
        };
        if ch.c == ' ' && bbox.is_empty() {
            continue;
        }
        match boxes.last_mut() {
            Some((line, acc)) if *line == ch.line => *acc = acc.union(&bbox),
            _ => boxes.push((ch.line, bbox)),
        }
    }
    boxes.into_iter().map(|(_, b)| b).collect()
}

/// Case-insensitive substring search inside single spans.
///
/// Cruder than `PageText::search` (no cross-span matches) but never misses
/// a keyword that sits inside one span.
pub fn span_matches(layout: &PageLayout, keyword: &str) -> Vec<BBox> {
    let needle: Vec<char> = keyword.trim().chars().map(fold).collect();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut rects = Vec::new();
    for span in layout.spans() {
        let chars = span.chars();
        if chars.len() < needle.len() {
            continue;
        }
        let found = (0..=chars.len() - needle.len()).find(|&i| {
            chars[i..i + needle.len()]
                .iter()
                .zip(needle.iter())
                .all(|(c, n)| fold(c.c) == *n)
        });
        if let Some(i) = found {
            let first = chars[i].bbox;
            let bbox = chars[i..i + needle.len()]
                .iter()
                .fold(first, |acc, c| acc.union(&c.bbox));
            rects.push(bbox);
        }
    }
    rects
}
