use std::{io, path::Path, sync::LazyLock};

use regex::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap()
});

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap());

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|h[1-6]|li|ul|ol|tr|table|pre|blockquote|section|article|header|footer|dt|dd|hr)\b[^>]*>",
    )
    .unwrap()
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Reduce HTML to plain text while keeping its block structure.
///
/// Script and style bodies are dropped, block-level tags become line breaks
/// and inline tags become spaces. Each line is whitespace-collapsed and runs
/// of blank lines are folded into a single blank line, so paragraphs stay
/// separated by exactly one empty line.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_blank = false;
    }
    out
}

/// Remove tags without touching whitespace (used for code blocks).
pub fn strip_tags(html: &str) -> String {
    decode_entities(&ANY_TAG.replace_all(html, ""))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Prefix of `text` holding at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate to `max` characters, appending `marker` only when text was cut.
pub fn truncate_with_marker(text: &str, max: usize, marker: &str) -> String {
    let head = truncate_chars(text, max);
    if head.len() < text.len() {
        format!("{head}{marker}")
    } else {
        text.to_string()
    }
}

/// Read a file as text, replacing invalid UTF-8 sequences.
pub fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
