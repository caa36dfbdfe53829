//! Heuristic field extraction from documentation pages.
//!
//! Every field has its own pure extractor. `syntax` and `example` look at the
//! raw markup so block boundaries survive; the others work on the text
//! produced by [`strip_html`].

use std::{path::Path, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::text_util::{read_lossy, strip_html, strip_tags, truncate_chars};

const SYNTAX_MAX_CHARS: usize = 200;
const PARAMETERS_MAX_CHARS: usize = 400;
const RETURNS_MAX_CHARS: usize = 200;
const EXAMPLE_MAX_CHARS: usize = 500;
const EXAMPLE_TRUNCATION_MARKER: &str = "\n// ...";
const NOTE_MIN_CHARS: usize = 11;
const NOTE_MAX_CHARS: usize = 150;
const MAX_NOTES: usize = 3;
const DESCRIPTION_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedInfo {
    pub syntax: Option<String>,
    pub parameters: Option<String>,
    pub returns: Option<String>,
    pub example: Option<String>,
    pub notes: Vec<String>,
    pub description: Option<String>,
}

impl ExtractedInfo {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn regexes(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static SYNTAX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"(?i)((?:bool|int|long|double|string|void|ulong|uint|ushort|datetime|color)\s+[A-Z][a-zA-Z0-9_]*\s*\([^)]*\))",
        // class methods
        r"(?i)((?:virtual\s+)?(?:bool|int|double|string|void)\s+[A-Z][a-zA-Z0-9_]*\s*\([^)]*\))",
    ])
});

static PARAMETERS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"(?i)Parameters?[:\s]*\n([^\n]+(?:\n[^\n]+)*)",
        r"参数[:\s]*\n([^\n]+(?:\n[^\n]+)*)",
    ])
});

static RETURNS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"(?i)Return(?:s|ed)?\s+value[:\s]*\n?([^\n]+)",
        r"(?i)Returns?[:\s]*\n?([^\n]+)",
        r"返回值?[:\s]*\n?([^\n]+)",
    ])
});

static EXAMPLE_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[r"(?is)<pre[^>]*>(.*?)</pre>", r"(?is)<code[^>]*>(.*?)</code>"])
});

static EXAMPLE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Example[:\s]*\n?").unwrap());

static NOTE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Note|注意|Important|Warning)[:\s]+([^\n]+)").unwrap()
});

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

fn first_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Function signature such as `bool OrderSend(MqlTradeRequest& request)`.
pub fn extract_syntax(html: &str) -> Option<String> {
    let raw = first_capture(&SYNTAX_PATTERNS, html)?;
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(truncate_chars(&collapsed, SYNTAX_MAX_CHARS).to_string())
}

/// Block following a "Parameters" header, up to the next blank line.
pub fn extract_parameters(text: &str) -> Option<String> {
    let raw = first_capture(&PARAMETERS_PATTERNS, text)?;
    Some(truncate_chars(raw.trim(), PARAMETERS_MAX_CHARS).to_string())
}

/// First line following a "Return value" header.
pub fn extract_returns(text: &str) -> Option<String> {
    let raw = first_capture(&RETURNS_PATTERNS, text)?;
    Some(truncate_chars(raw.trim(), RETURNS_MAX_CHARS).to_string())
}

/// First `<pre>`/`<code>` block, else the text after an "Example" header.
pub fn extract_example(html: &str) -> Option<String> {
    let raw = first_capture(&EXAMPLE_BLOCKS, html).or_else(|| {
        let header = EXAMPLE_HEADER.find(html)?;
        Some(truncate_chars(&html[header.end()..], EXAMPLE_MAX_CHARS))
    })?;

    let code = strip_tags(raw);
    let code = code.trim();
    if code.chars().count() > EXAMPLE_MAX_CHARS {
        Some(format!(
            "{}{EXAMPLE_TRUNCATION_MARKER}",
            truncate_chars(code, EXAMPLE_MAX_CHARS)
        ))
    } else {
        Some(code.to_string())
    }
}

/// Up to three "Note"/"Important"/"Warning" lines in document order.
pub fn extract_notes(text: &str) -> Vec<String> {
    NOTE_HEADER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|note| note.chars().count() >= NOTE_MIN_CHARS)
        .take(MAX_NOTES)
        .map(|note| truncate_chars(note, NOTE_MAX_CHARS).to_string())
        .collect()
}

/// The first two paragraphs, joined with a space.
pub fn extract_description(text: &str) -> Option<String> {
    let desc = PARAGRAPH_BREAK
        .split(text)
        .take(2)
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    (!desc.is_empty())
        .then(|| truncate_chars(&desc, DESCRIPTION_MAX_CHARS).to_string())
}

/// Run every extractor over a page's raw content.
pub fn extract_from_str(raw: &str) -> ExtractedInfo {
    let text = strip_html(raw);

    ExtractedInfo {
        syntax: extract_syntax(raw),
        parameters: extract_parameters(&text),
        returns: extract_returns(&text),
        example: extract_example(raw),
        notes: extract_notes(&text),
        description: extract_description(&text),
    }
}

/// Read a page and extract its fields. Unreadable pages yield an empty
/// result rather than an error.
pub fn extract(path: &Path) -> ExtractedInfo {
    match read_lossy(path) {
        Ok(raw) => extract_from_str(&raw),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "extraction skipped");
            ExtractedInfo::default()
        }
    }
}
