//! Inline paragraph markup: turn a block's text into the string to draw.
//!
//! In [`MarkupMode::Literal`] the text is drawn as written. In
//! [`MarkupMode::Inline`] the line is read as rich-text paragraph markup:
//! a small XML-like tag set plus character entities. Tags are validated and
//! stripped (the fallback renderer has no inline styling), entities are
//! decoded and `<br/>` becomes a forced line break (`\n` in the output).
//!
//! Malformed markup is an error for the whole line, which the renderer turns
//! into a failure of the whole document.

use crate::config::MarkupMode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Tags accepted in `Inline` mode. Anything else is rejected.
const KNOWN_TAGS: &[&str] = &[
    "a", "b", "br", "em", "font", "i", "strike", "strong", "sub", "sup", "super", "u",
];

static RE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^<\s*(/?)\s*([A-Za-z][A-Za-z0-9]*)((?:\s+[A-Za-z_][A-Za-z0-9_-]*\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)\s*>"#,
    )
    .unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(#[0-9]+|#[xX][0-9A-Fa-f]+|[A-Za-z]+);").unwrap());

/// Resolve `text` to drawable characters according to `mode`.
///
/// # Errors
/// Returns a description of the first markup problem in `Inline` mode.
pub fn resolve(text: &str, mode: MarkupMode) -> Result<String, String> {
    match mode {
        MarkupMode::Literal => Ok(text.to_string()),
        MarkupMode::Inline => parse_inline(text),
    }
}

fn parse_inline(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<String> = Vec::new();
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let column = text[..i].chars().count() + 1;

        if rest.starts_with('<') {
            let caps = RE_TAG
                .captures(rest)
                .ok_or_else(|| format!("unterminated or malformed tag at column {column}"))?;
            let closing = !caps[1].is_empty();
            let self_closing = !caps[4].is_empty();
            let name = caps[2].to_ascii_lowercase();

            if !KNOWN_TAGS.contains(&name.as_str()) {
                return Err(format!("unknown tag <{name}> at column {column}"));
            }

            if name == "br" {
                if closing {
                    return Err(format!("stray </br> at column {column}"));
                }
                out.push('\n');
            } else if closing {
                match open.pop() {
                    Some(top) if top == name => {}
                    Some(top) => {
                        return Err(format!(
                            "</{name}> at column {column} closes <{top}>"
                        ))
                    }
                    None => return Err(format!("</{name}> at column {column} was never opened")),
                }
            } else if !self_closing {
                open.push(name);
            }

            i += caps[0].len();
        } else if rest.starts_with('&') {
            let caps = RE_ENTITY
                .captures(rest)
                .ok_or_else(|| format!("bare '&' at column {column}; write &amp;"))?;
            out.push(decode_entity(&caps[1]).ok_or_else(|| {
                format!("unknown entity &{}; at column {column}", &caps[1])
            })?);
            i += caps[0].len();
        } else {
            // Safe: `i` always sits on a char boundary.
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    if let Some(tag) = open.pop() {
        return Err(format!("<{tag}> is never closed"));
    }

    Ok(out)
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(s: &str) -> Result<String, String> {
        resolve(s, MarkupMode::Inline)
    }

    #[test]
    fn literal_passes_everything_through() {
        let s = "Fish & chips <3 <blink>";
        assert_eq!(resolve(s, MarkupMode::Literal).unwrap(), s);
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(inline("Some plain text.").unwrap(), "Some plain text.");
        assert_eq!(inline("").unwrap(), "");
    }

    #[test]
    fn known_tags_are_stripped() {
        assert_eq!(inline("a <b>bold</b> and <i>it</i>").unwrap(), "a bold and it");
        assert_eq!(
            inline(r#"<font name="Courier" size='9'>code</font>"#).unwrap(),
            "code"
        );
        assert_eq!(inline("<B>upper</B>").unwrap(), "upper");
    }

    #[test]
    fn br_forces_a_break() {
        assert_eq!(inline("one<br/>two").unwrap(), "one\ntwo");
        assert_eq!(inline("one<br />two").unwrap(), "one\ntwo");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(inline("Fish &amp; chips").unwrap(), "Fish & chips");
        assert_eq!(inline("&lt;tag&gt;").unwrap(), "<tag>");
        assert_eq!(inline("&#65;&#x42;").unwrap(), "AB");
        assert_eq!(inline("a&nbsp;b").unwrap(), "a\u{a0}b");
    }

    #[test]
    fn bare_ampersand_fails() {
        let err = inline("Fish & chips").unwrap_err();
        assert!(err.contains("column 6"), "got: {err}");
    }

    #[test]
    fn bare_less_than_fails() {
        assert!(inline("if a < b then").is_err());
    }

    #[test]
    fn unknown_tag_fails() {
        let err = inline("<blink>hi</blink>").unwrap_err();
        assert!(err.contains("<blink>"), "got: {err}");
    }

    #[test]
    fn unknown_entity_fails() {
        assert!(inline("&bogus;").is_err());
        assert!(inline("&#xZZ;").is_err());
    }

    #[test]
    fn unbalanced_tags_fail() {
        assert!(inline("<b>open").is_err());
        assert!(inline("close</b>").is_err());
        assert!(inline("<b><i>x</b></i>").is_err());
    }

    #[test]
    fn multibyte_text_survives() {
        assert_eq!(inline("Café <b>naïve</b> — ok").unwrap(), "Café naïve — ok");
    }
}
