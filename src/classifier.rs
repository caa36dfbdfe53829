//! Pattern-based query classification.
//!
//! A query is tried against an ordered chain of matchers (error, function,
//! class, how-to); the first matcher that recognises it decides the
//! [`QueryKind`] and the keywords handed to the ranker. Anything left over
//! is a concept query.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Error,
    Function,
    Class,
    HowTo,
    Concept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub kind: QueryKind,
    pub keywords: Vec<String>,
    pub context: Option<String>,
    pub original_query: String,
}

impl QueryAnalysis {
    fn new(kind: QueryKind, keywords: Vec<String>, query: &str) -> Self {
        Self {
            kind,
            keywords,
            context: None,
            original_query: query.to_string(),
        }
    }
}

fn regexes(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        // error: E512: undeclared identifier
        r#"(?i)error[:\s]+([A-Z]\d+)[:\s]+([^'"]+)"#,
        // E512: undeclared identifier
        r#"(?i)\b([A-Z]\d{3,4})\b[:\s]+([^'"]+)"#,
        r"(?i)undeclared\s+identifier\s+'?([a-z_][a-z0-9_]*)'?",
        r"(?i)'([a-z_][a-z0-9_]*)'\s*-\s*undeclared",
    ])
});

static FUNCTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"^([A-Z][a-zA-Z0-9_]+)(?:\(\))?$",
        r"(?i)how\s+to\s+use\s+([A-Z][a-zA-Z0-9_]+)",
    ])
});

static CLASS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"(?i)^C?([A-Z][a-zA-Z0-9_]+)\s+class",
        r"^C([A-Z][a-zA-Z0-9_]+)$",
    ])
});

static HOWTO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    regexes(&[
        r"(?i)(?:how|如何|怎么|怎样)\s+(?:to|do|实现|做|用)",
        r"(?i)(?:what|什么)\s+(?:is|are)",
    ])
});

static ERROR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]\d{3,4})\b").unwrap());

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

const STOP_WORDS: &[&str] = &[
    "how", "to", "use", "the", "a", "an", "is", "are", "in", "on", "at",
    "如何", "怎么", "使用", "的", "了", "吗", "呢",
];

/// First capture group of the first pattern that matches.
fn first_capture<'q>(patterns: &[Regex], query: &'q str) -> Option<&'q str> {
    patterns
        .iter()
        .find_map(|re| re.captures(query))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn match_error(query: &str) -> Option<QueryAnalysis> {
    let ident = first_capture(&ERROR_PATTERNS, query)?;
    let mut analysis =
        QueryAnalysis::new(QueryKind::Error, vec![ident.to_lowercase()], query);
    analysis.context = Some("error_diagnosis".to_string());
    Some(analysis)
}

fn match_function(query: &str) -> Option<QueryAnalysis> {
    let name = first_capture(&FUNCTION_PATTERNS, query.trim())?;
    Some(QueryAnalysis::new(
        QueryKind::Function,
        vec![name.to_lowercase()],
        query,
    ))
}

fn match_class(query: &str) -> Option<QueryAnalysis> {
    let name = first_capture(&CLASS_PATTERNS, query.trim())?.to_lowercase();
    let prefixed = format!("c{name}");
    Some(QueryAnalysis::new(QueryKind::Class, vec![name, prefixed], query))
}

fn match_howto(query: &str) -> Option<QueryAnalysis> {
    HOWTO_PATTERNS
        .iter()
        .any(|re| re.is_match(query))
        .then(|| {
            QueryAnalysis::new(QueryKind::HowTo, extract_keywords(query), query)
        })
}

const MATCHERS: &[fn(&str) -> Option<QueryAnalysis>] =
    &[match_error, match_function, match_class, match_howto];

/// Classify a raw query. Pure and deterministic.
pub fn classify(query: &str) -> QueryAnalysis {
    MATCHERS.iter().find_map(|m| m(query)).unwrap_or_else(|| {
        QueryAnalysis::new(QueryKind::Concept, extract_keywords(query), query)
    })
}

/// Find a bare compiler error code (one uppercase letter and 3-4 digits).
pub fn extract_error_code(query: &str) -> Option<String> {
    ERROR_CODE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lowercase, drop punctuation and keep tokens longer than two characters
/// that are not stop words. Order of first appearance, duplicates kept.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    NON_WORD
        .replace_all(&lower, " ")
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}
