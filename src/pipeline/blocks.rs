//! Line classification: Markdown text → flat sequence of styled blocks.
//!
//! Three prefix rules, checked in order, and nothing else. Lists, emphasis,
//! deeper headings and blank-line paragraph breaks are not
//! recognised; every source line becomes exactly one block.

use serde::{Deserialize, Serialize};

/// Style category of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStyle {
    Title,
    Heading2,
    Normal,
}

/// One source line tagged with its style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub style: BlockStyle,
    /// Line content with the heading prefix removed (Normal keeps the whole line).
    pub text: String,
}

impl Block {
    pub fn new(style: BlockStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Classify a single line.
pub fn classify_line(line: &str) -> Block {
    if let Some(rest) = line.strip_prefix("# ") {
        Block::new(BlockStyle::Title, rest)
    } else if let Some(rest) = line.strip_prefix("## ") {
        Block::new(BlockStyle::Heading2, rest)
    } else {
        Block::new(BlockStyle::Normal, line)
    }
}

/// Split `text` on `\n` and classify every line.
///
/// A trailing newline yields a final empty Normal block, and `\r` from CRLF
/// files stays in the block text; the layout stage drops control characters
/// when drawing.
pub fn classify(text: &str) -> Vec<Block> {
    text.split('\n').map(classify_line).collect()
}
