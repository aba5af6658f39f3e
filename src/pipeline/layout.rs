//! Paragraph layout: styled paragraphs → positioned lines on fixed-size pages.
//!
//! This is the only geometry in the crate. Paragraphs are word-wrapped to
//! the frame width, stacked top to bottom and moved to a new page when the
//! next line would cross the bottom margin. Widths are estimated from an
//! average glyph width per face; the built-in PDF fonts carry no metrics we
//! could query without embedding AFM tables.

use crate::config::PageSize;
use crate::pipeline::blocks::BlockStyle;

/// Built-in font face used by a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Helvetica,
    HelveticaBold,
}

impl FontFace {
    /// Average advance width as a fraction of the font size.
    fn average_advance(self) -> f32 {
        match self {
            FontFace::Helvetica => 0.52,
            FontFace::HelveticaBold => 0.56,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// Typographic parameters of one block style, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleSpec {
    pub face: FontFace,
    pub size: f32,
    pub leading: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub align: Align,
}

/// Fixed stylesheet of the line renderer.
pub fn style_spec(style: BlockStyle) -> StyleSpec {
    match style {
        BlockStyle::Title => StyleSpec {
            face: FontFace::HelveticaBold,
            size: 18.0,
            leading: 22.0,
            space_before: 0.0,
            space_after: 6.0,
            align: Align::Center,
        },
        BlockStyle::Heading2 => StyleSpec {
            face: FontFace::HelveticaBold,
            size: 14.0,
            leading: 18.0,
            space_before: 12.0,
            space_after: 6.0,
            align: Align::Left,
        },
        BlockStyle::Normal => StyleSpec {
            face: FontFace::Helvetica,
            size: 10.0,
            leading: 12.0,
            space_before: 0.0,
            space_after: 0.0,
            align: Align::Left,
        },
    }
}

/// Page dimensions and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    pub fn new(size: PageSize, margin: f32) -> Self {
        let (width, height) = size.dimensions_pt();
        Self {
            width,
            height,
            margin,
        }
    }

    pub fn frame_width(&self) -> f32 {
        (self.width - 2.0 * self.margin).max(1.0)
    }

    fn top(&self) -> f32 {
        self.height - self.margin
    }
}

/// A line of text with its baseline origin (PDF coordinates, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: BlockStyle,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Laid-out document.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Lay out `(style, text)` paragraphs. `\n` inside a text forces a line break.
///
/// Always returns at least one page.
pub fn layout(paragraphs: &[(BlockStyle, String)], geometry: PageGeometry) -> Layout {
    let mut pages = vec![Page::default()];
    let mut cursor = geometry.top();
    let mut at_top = true;

    for (style, text) in paragraphs {
        let spec = style_spec(*style);
        let lines = wrap(text, &spec, geometry.frame_width());

        // Space before a paragraph is dropped at the head of a page.
        if !at_top {
            cursor -= spec.space_before;
        }

        for line in lines {
            if !at_top && cursor - spec.leading < geometry.margin {
                pages.push(Page::default());
                cursor = geometry.top();
            }

            let width = estimate_width(&line, &spec);
            let x = match spec.align {
                Align::Left => geometry.margin,
                Align::Center => {
                    geometry.margin + ((geometry.frame_width() - width) / 2.0).max(0.0)
                }
            };

            let current = pages.len() - 1;
            pages[current].lines.push(PlacedLine {
                text: line,
                style: *style,
                x,
                y: cursor - spec.size,
            });
            cursor -= spec.leading;
            at_top = false;
        }

        cursor -= spec.space_after;
        if cursor < geometry.margin {
            // The remaining space after this paragraph is gone; the next
            // line starts a new page anyway, so reset the spacing state.
            pages.push(Page::default());
            cursor = geometry.top();
            at_top = true;
        }
    }

    // A trailing page opened by spacing alone carries nothing.
    if pages.len() > 1 && pages.last().is_some_and(|p| p.lines.is_empty()) {
        pages.pop();
    }

    Layout { geometry, pages }
}

/// Estimated advance width of `text` in points.
pub fn estimate_width(text: &str, spec: &StyleSpec) -> f32 {
    text.chars().count() as f32 * spec.size * spec.face.average_advance()
}

/// Break `text` into lines that fit `max_width`.
///
/// Runs of ASCII whitespace collapse to one space, words longer than a line
/// are split hard, and an empty paragraph yields one empty line so that blank
/// source lines keep their vertical space.
pub fn wrap(text: &str, spec: &StyleSpec, max_width: f32) -> Vec<String> {
    let max_chars = ((max_width / (spec.size * spec.face.average_advance())).floor() as usize).max(1);
    let mut lines = Vec::new();

    for segment in sanitize(text).split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in segment
            .split(|c: char| c.is_ascii_whitespace())
            .filter(|w| !w.is_empty())
        {
            let mut word: Vec<char> = word.chars().collect();

            while !word.is_empty() {
                let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
                if needed <= max_chars {
                    if current_len > 0 {
                        current.push(' ');
                        current_len += 1;
                    }
                    current.extend(word.iter());
                    current_len += word.len();
                    word.clear();
                } else if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                } else {
                    let rest = word.split_off(max_chars);
                    lines.push(word.iter().collect());
                    word = rest;
                }
            }
        }

        lines.push(current);
    }

    lines
}

/// Replace tabs with spaces and drop other control characters (e.g. `\r`).
fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            '\n' => Some('\n'),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
