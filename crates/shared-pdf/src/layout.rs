//! Page layout: blocks of lines of spans
//!
//! Text runs from the content interpreter are merged into spans (same
//! font, size and colour on one baseline), spans into lines (vertical
//! overlap, left to right) and lines into blocks (small vertical gaps).
//! The bottom quarter of the page is the footnote zone; a block never
//! straddles the zone boundary.

use shared_types::BBox;

use crate::content::TextRun;

/// Blocks whose top edge is at or below this fraction of the page height
/// belong to the footnote zone.
pub const FOOTNOTE_ZONE_RATIO: f64 = 0.75;

/// Gap between spans (in em) above which a space separates them.
const SPACE_GAP_EM: f64 = 0.15;
/// Largest gap (in em) that still merges two runs into one span.
const MERGE_GAP_EM: f64 = 1.0;
/// Largest gap (in em) between spans of one line.
const LINE_GAP_EM: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharBox {
    pub c: char,
    pub bbox: BBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Body,
    Footnote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub bbox: BBox,
    pub size: f64,
    /// Packed `0xRRGGBB`
    pub color: u32,
    pub font: String,
    chars: Vec<CharBox>,
}

impl Span {
    /// Build a span with characters spread evenly across the box.
    pub fn new(text: impl Into<String>, bbox: BBox, size: f64, color: u32) -> Self {
        let text = text.into();
        let count = text.chars().count().max(1) as f64;
        let step = bbox.width() / count;
        let chars = text
            .chars()
            .enumerate()
            .map(|(i, c)| CharBox {
                c,
                bbox: BBox::new(
                    bbox.x0 + step * i as f64,
                    bbox.y0,
                    bbox.x0 + step * (i + 1) as f64,
                    bbox.y1,
                ),
            })
            .collect();
        Self {
            text,
            bbox,
            size,
            color,
            font: String::new(),
            chars,
        }
    }

    pub fn chars(&self) -> &[CharBox] {
        &self.chars
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.color >> 16) & 0xFF) as u8,
            ((self.color >> 8) & 0xFF) as u8,
            (self.color & 0xFF) as u8,
        )
    }

    fn from_run(run: TextRun) -> Self {
        Self {
            text: run.text(),
            bbox: run.bbox,
            size: run.size,
            color: run.color,
            font: run.font,
            chars: run.chars,
        }
    }

    fn push_char(&mut self, ch: CharBox) {
        self.text.push(ch.c);
        self.bbox = self.bbox.union(&ch.bbox);
        self.chars.push(ch);
    }

    fn trim(mut self) -> Option<Self> {
        while self.chars.last().map(|c| c.c.is_whitespace()).unwrap_or(false) {
            self.chars.pop();
        }
        let lead = self.chars.iter().take_while(|c| c.c.is_whitespace()).count();
        self.chars.drain(..lead);
        let first = self.chars.first()?.bbox;
        self.bbox = self.chars.iter().fold(first, |acc, c| acc.union(&c.bbox));
        self.text = self.chars.iter().map(|c| c.c).collect();
        Some(self)
    }
}

/// Whether text joining `prev` and `next` needs a separating space.
pub fn needs_space(prev: &Span, next: &Span) -> bool {
    let gap = next.bbox.x0 - prev.bbox.x1;
    let em = prev.size.min(next.size).max(1.0);
    gap > SPACE_GAP_EM * em
        && !prev.text.ends_with(char::is_whitespace)
        && !next.text.starts_with(char::is_whitespace)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub bbox: BBox,
    pub spans: Vec<Span>,
}

impl Line {
    pub fn from_spans(spans: Vec<Span>) -> Self {
        let bbox = union_all(spans.iter().map(|s| s.bbox));
        Self { bbox, spans }
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 && needs_space(&self.spans[i - 1], span) {
                out.push(' ');
            }
            out.push_str(&span.text);
        }
        out
    }

    fn push(&mut self, span: Span) {
        self.bbox = self.bbox.union(&span.bbox);
        self.spans.push(span);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub bbox: BBox,
    pub lines: Vec<Line>,
}

impl Block {
    pub fn from_lines(lines: Vec<Line>) -> Self {
        let bbox = union_all(lines.iter().map(|l| l.bbox));
        Self { bbox, lines }
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, line: Line) {
        self.bbox = self.bbox.union(&line.bbox);
        self.lines.push(line);
    }
}

fn union_all(mut boxes: impl Iterator<Item = BBox>) -> BBox {
    let first = boxes.next().unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
    boxes.fold(first, |acc, b| acc.union(&b))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 0-based page index
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub blocks: Vec<Block>,
}

impl PageLayout {
    pub fn new(index: usize, width: f64, height: f64, blocks: Vec<Block>) -> Self {
        Self {
            index,
            width,
            height,
            blocks,
        }
    }

    pub fn empty(index: usize, width: f64, height: f64) -> Self {
        Self::new(index, width, height, Vec::new())
    }

    /// 1-based page number
    pub fn page_number(&self) -> u32 {
        self.index as u32 + 1
    }

    pub fn footnote_threshold(&self) -> f64 {
        FOOTNOTE_ZONE_RATIO * self.height
    }

    pub fn zone_of(&self, block: &Block) -> Zone {
        if block.bbox.y0 >= self.footnote_threshold() {
            Zone::Footnote
        } else {
            Zone::Body
        }
    }

    pub fn body_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(move |b| self.zone_of(b) == Zone::Body)
    }

    pub fn footnote_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(move |b| self.zone_of(b) == Zone::Footnote)
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.blocks.iter().flat_map(|b| b.lines.iter())
    }

    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.lines().flat_map(|l| l.spans.iter())
    }

    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn body_spans(&self) -> impl Iterator<Item = &Span> {
        self.body_blocks()
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.spans.iter())
    }

    /// Median font size of the body-zone spans; footnote text is smaller
    /// and would drag it down.
    pub fn median_span_size(&self) -> Option<f64> {
        let mut sizes: Vec<f64> = self.body_spans().map(|s| s.size).collect();
        if sizes.is_empty() {
            return None;
        }
        sizes.sort_by(|a, b| a.total_cmp(b));
        let mid = sizes.len() / 2;
        Some(if sizes.len() % 2 == 0 {
            (sizes[mid - 1] + sizes[mid]) / 2.0
        } else {
            sizes[mid]
        })
    }
}

/// Group interpreted runs into a page layout.
pub fn build_layout(index: usize, width: f64, height: f64, runs: Vec<TextRun>) -> PageLayout {
    let spans = merge_runs(runs);
    let lines = group_lines(spans);
    let blocks = group_blocks(lines, FOOTNOTE_ZONE_RATIO * height);
    PageLayout::new(index, width, height, blocks)
}

fn same_style(span: &Span, run: &TextRun) -> bool {
    span.font == run.font && (span.size - run.size).abs() < 0.01 && span.color == run.color
}

fn merge_runs(runs: Vec<TextRun>) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut current: Option<(Span, f64)> = None;

    for run in runs {
        let baseline = run.baseline;
        let em = run.size.max(1.0);
        if let Some((span, span_baseline)) = current.as_mut() {
            let gap = run.bbox.x0 - span.bbox.x1;
            let mergeable = same_style(span, &run)
                && (baseline - *span_baseline).abs() < 0.1 * em
                && gap > -0.25 * em
                && gap < MERGE_GAP_EM * em;
            if mergeable {
                let starts_blank = run.chars.first().map(|c| c.c.is_whitespace()).unwrap_or(false);
                if gap > SPACE_GAP_EM * em && !span.text.ends_with(char::is_whitespace) && !starts_blank {
                    span.push_char(CharBox {
                        c: ' ',
                        bbox: BBox::new(span.bbox.x1, span.bbox.y0, run.bbox.x0, span.bbox.y1),
                    });
                }
                for ch in run.chars {
                    span.push_char(ch);
                }
                continue;
            }
        }
        if let Some((done, _)) = current.take() {
            spans.extend(done.trim());
        }
        if !run.chars.is_empty() {
            current = Some((Span::from_run(run), baseline));
        }
    }
    if let Some((done, _)) = current {
        spans.extend(done.trim());
    }
    spans
}

fn group_lines(spans: Vec<Span>) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    for span in spans {
        if let Some(line) = lines.last_mut() {
            let min_height = span.bbox.height().min(line.bbox.height());
            let em = span.size.max(1.0);
            let overlaps = span.bbox.vertical_overlap(&line.bbox) >= 0.5 * min_height;
            let gap = span.bbox.x0 - line.bbox.x1;
            if overlaps && gap > -0.5 * em && gap < LINE_GAP_EM * em {
                line.push(span);
                continue;
            }
        }
        lines.push(Line::from_spans(vec![span]));
    }
    lines
}

fn group_blocks(lines: Vec<Line>, threshold: f64) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in lines {
        if let Some(block) = blocks.last_mut() {
            if let Some(last) = block.lines.last() {
                let height = line.bbox.height().max(last.bbox.height());
                let gap = line.bbox.y0 - last.bbox.y1;
                // blocks are zoned by their top; a footnote line directly under
                // body text must not be absorbed into the body block
                let crosses_zone = block.bbox.y0 < threshold && line.bbox.y0 >= threshold;
                let aligned = line.bbox.horizontal_overlap(&block.bbox) > 0.0;
                if gap > -0.5 * height && gap < 0.6 * height && aligned && !crosses_zone {
                    block.push(line);
                    continue;
                }
            }
        }
        blocks.push(Block::from_lines(vec![line]));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str, x: f64, baseline: f64, size: f64, color: u32) -> TextRun {
        let width = 0.5 * size;
        let chars: Vec<CharBox> = text
            .chars()
            .enumerate()
            .map(|(i, c)| CharBox {
                c,
                bbox: BBox::new(
                    x + width * i as f64,
                    baseline - 0.9 * size,
                    x + width * (i + 1) as f64,
                    baseline + 0.2 * size,
                ),
            })
            .collect();
        let bbox = union_all(chars.iter().map(|c| c.bbox));
        TextRun {
            chars,
            font: "Helvetica".into(),
            size,
            color,
            bbox,
            baseline,
        }
    }

    #[test]
    fn test_runs_merge_into_span_with_space() {
        // second word starts 3pt after the first ends (0.3 em)
        let runs = vec![run("Past", 72.0, 100.0, 10.0, 0), run("performance", 95.0, 100.0, 10.0, 0)];
        let layout = build_layout(0, 612.0, 792.0, runs);
        assert_eq!(layout.blocks.len(), 1);
        let spans: Vec<_> = layout.spans().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Past performance");
    }

    #[test]
    fn test_style_change_splits_span_not_line() {
        let runs = vec![
            run("Returns are", 72.0, 100.0, 10.0, 0),
            run("3", 127.0, 96.0, 6.0, 0),
            run("not assured", 135.0, 100.0, 10.0, 0),
        ];
        let layout = build_layout(0, 612.0, 792.0, runs);
        let lines: Vec<_> = layout.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 3);
        assert_eq!(lines[0].spans[1].text, "3");
    }

    #[test]
    fn test_blocks_split_on_gap_and_zone() {
        let runs = vec![
            run("First paragraph line one", 72.0, 100.0, 10.0, 0),
            run("First paragraph line two", 72.0, 112.0, 10.0, 0),
            run("Second paragraph", 72.0, 300.0, 10.0, 0),
            run("Body line just above the zone", 72.0, 590.0, 10.0, 0),
            run("1. Footnote text right below", 72.0, 603.0, 10.0, 0),
        ];
        let layout = build_layout(0, 612.0, 792.0, runs);
        assert_eq!(layout.blocks.len(), 4);
        assert_eq!(layout.blocks[0].lines.len(), 2);
        assert_eq!(layout.body_blocks().count(), 3);
        let foot: Vec<_> = layout.footnote_blocks().collect();
        assert_eq!(foot.len(), 1);
        assert_eq!(foot[0].text(), "1. Footnote text right below");
    }

    #[test]
    fn test_blank_runs_are_dropped() {
        let runs = vec![run("   ", 72.0, 100.0, 10.0, 0)];
        let layout = build_layout(0, 612.0, 792.0, runs);
        assert!(layout.blocks.is_empty());
    }

    #[test]
    fn test_median_span_size() {
        let layout = PageLayout::new(
            0,
            612.0,
            792.0,
            vec![Block::from_lines(vec![Line::from_spans(vec![
                Span::new("a", BBox::new(0.0, 0.0, 5.0, 10.0), 10.0, 0),
                Span::new("b", BBox::new(6.0, 0.0, 10.0, 10.0), 6.0, 0),
                Span::new("c", BBox::new(11.0, 0.0, 15.0, 10.0), 12.0, 0),
            ])])],
        );
        assert_eq!(layout.median_span_size(), Some(10.0));
    }

    #[test]
    fn test_median_ignores_footnote_zone() {
        let body = Block::from_lines(vec![Line::from_spans(vec![
            Span::new("Body", BBox::new(72.0, 100.0, 100.0, 112.0), 12.0, 0),
        ])]);
        let notes = Block::from_lines(vec![
            Line::from_spans(vec![Span::new("1 Note", BBox::new(72.0, 700.0, 100.0, 707.0), 7.0, 0)]),
            Line::from_spans(vec![Span::new("2 Note", BBox::new(72.0, 710.0, 100.0, 717.0), 7.0, 0)]),
        ]);
        let layout = PageLayout::new(0, 612.0, 792.0, vec![body, notes]);
        assert_eq!(layout.body_spans().count(), 1);
        assert_eq!(layout.median_span_size(), Some(12.0));
    }

    #[test]
    fn test_span_new_spreads_chars() {
        let span = Span::new("abcd", BBox::new(0.0, 0.0, 40.0, 10.0), 10.0, 0xFF0000);
        assert_eq!(span.chars().len(), 4);
        assert_eq!(span.chars()[2].bbox.x0, 20.0);
        assert_eq!(span.rgb(), (255, 0, 0));
    }
}
