//! Direct documentation access: keyword search, page retrieval and the
//! category catalogue.

use std::{cmp::Ordering, path::Path};

use serde::Serialize;

use crate::{
    doc_index::{Collection, DocEntry, DocIndex, lookup_key},
    error::Result,
    migration,
    text_util::{read_lossy, strip_html, truncate_with_marker},
};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Results appended to a "not found" answer from [`get_doc`].
const FALLBACK_SEARCH_LIMIT: usize = 5;
const MARKDOWN_MAX_CHARS: usize = 15_000;
const HTML_MAX_CHARS: usize = 10_000;
const HINT_TARGET_SCORE: f64 = 0.95;
const RULE_WIDTH: usize = 60;

/// Fixed topic catalogue over well-known reference pages.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    ("trading", &["ordersend", "ordercheck", "ctrade", "positionselect"]),
    (
        "indicators",
        &["icustom", "copybuffer", "indicatorcreate", "setindexbuffer"],
    ),
    (
        "math",
        &["mathabs", "mathsin", "mathcos", "mathrandom", "mathpow"],
    ),
    (
        "array",
        &["arrayresize", "arraycopy", "arraysort", "arrayinitialize"],
    ),
    (
        "string",
        &["stringfind", "stringsplit", "stringreplace", "stringformat"],
    ),
    (
        "datetime",
        &["timecurrent", "timelocal", "timetostruct", "timegmt"],
    ),
    ("files", &["fileopen", "fileclose", "filewrite", "fileread"]),
    (
        "chart",
        &["chartopen", "chartredraw", "chartid", "chartsetinteger"],
    ),
    ("objects", &["objectcreate", "objectdelete", "objectsetinteger"]),
    (
        "onnx",
        &[
            "onnxcreate",
            "onnxrun",
            "onnxrelease",
            "MQL5_ONNX_Integration_Guide",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocHit {
    pub key: String,
    pub rel_path: String,
    pub collection: Collection,
    pub score: f64,
}

impl DocHit {
    fn new(key: &str, entry: &DocEntry, score: f64) -> Self {
        Self {
            key: key.to_string(),
            rel_path: entry.rel_path.clone(),
            collection: entry.collection,
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSearch {
    pub query: String,
    pub hints: Vec<String>,
    pub exact: Option<DocHit>,
    /// The best `limit` hits.
    pub results: Vec<DocHit>,
    /// Number of hits before the limit was applied.
    pub total: usize,
}

impl DocSearch {
    pub fn render(&self) -> String {
        let mut out = format!("Search: \"{}\"\n\n", self.query);

        if !self.hints.is_empty() {
            for hint in &self.hints {
                out.push_str(&format!("* {hint}\n"));
            }
            out.push('\n');
        }

        if let Some(exact) = &self.exact {
            out.push_str(&format!(
                "Exact match: {}  (from {})\n\n",
                exact.rel_path, exact.collection
            ));
        }

        if !self.results.is_empty() {
            out.push_str(&format!(
                "Related documents ({} / {}):\n",
                self.results.len(),
                self.total
            ));
            for (i, hit) in self.results.iter().enumerate() {
                out.push_str(&format!(
                    "  {}. {}  ({})\n",
                    i + 1,
                    hit.rel_path,
                    hit.collection
                ));
            }
        } else if self.exact.is_none() {
            out.push_str("No matching documents\n");
            out.push_str(
                "Tip: use English identifiers such as OrderSend or CopyBuffer, or try a shorter keyword",
            );
        }

        out
    }
}

fn hint_lines(query: &str) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(ident) = migration::undeclared_identifier(query)
        && let Some(hint) = migration::hint_for(&ident)
    {
        lines.push(format!(
            "Diagnosis: undeclared identifier '{ident}' should probably be '{}' ({})",
            hint.replacement, hint.hint
        ));
    }

    for hint in migration::hints_in(query) {
        lines.push(format!(
            "Migration: '{}' -> '{}' ({})",
            hint.trigger, hint.replacement, hint.hint
        ));
    }

    lines
}

/// Score every index key against the lowercased query.
///
/// Exact keys score 1.0, keys containing the query score by how much of the
/// key the query covers, and keys related through a migration hint score
/// 0.95.
pub fn search_docs(index: &DocIndex, query: &str, limit: usize) -> DocSearch {
    let lower = query.trim().to_lowercase();
    let targets = migration::target_keys(query);
    let query_len = lower.chars().count() as f64;

    let mut hits: Vec<DocHit> = index
        .entries()
        .filter_map(|(key, entry)| {
            let score = if key == lower {
                1.0
            } else if !lower.is_empty() && key.contains(lower.as_str()) {
                query_len / key.chars().count().max(2) as f64
            } else if targets.iter().any(|t| *t == key) {
                HINT_TARGET_SCORE
            } else {
                return None;
            };
            Some(DocHit::new(key, entry, score))
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let total = hits.len();
    hits.truncate(limit);

    DocSearch {
        query: query.to_string(),
        hints: hint_lines(query),
        exact: index.get(&lower).map(|entry| DocHit::new(&lower, entry, 1.0)),
        results: hits,
        total,
    }
}

fn resolve<'a>(index: &'a DocIndex, filename: &str) -> Option<&'a DocEntry> {
    let key = lookup_key(filename);
    index.get(&key).or_else(|| {
        let base = Path::new(&key)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())?;
        index.get_by_name(&lookup_key(&base))
    })
}

/// Read a document by name. Markdown is returned as written, HTML as
/// plain text. Unknown names produce a short search report instead.
pub fn get_doc(index: &DocIndex, filename: &str) -> Result<String> {
    let Some(entry) = resolve(index, filename) else {
        let search = search_docs(index, filename, FALLBACK_SEARCH_LIMIT);
        return Ok(format!(
            "Document not found: {filename}\n\n{}",
            search.render()
        ));
    };

    let content = read_lossy(&entry.abs_path)?;
    let body = if entry.is_markdown() {
        truncate_with_marker(&content, MARKDOWN_MAX_CHARS, "\n\n... (content truncated)")
    } else {
        truncate_with_marker(&strip_html(&content), HTML_MAX_CHARS, "...")
    };

    let rule = "=".repeat(RULE_WIDTH);
    Ok(format!(
        "{} ({})\n{rule}\n\n{body}\n\n{rule}",
        entry.rel_path, entry.collection
    ))
}

/// List the catalogue, or the pages of one category.
pub fn browse_categories(category: Option<&str>) -> String {
    let rule = "=".repeat(RULE_WIDTH);

    let Some(category) = category.map(str::trim).filter(|c| !c.is_empty())
    else {
        let mut out = format!("Documentation categories\n{rule}\n\n");
        for (name, docs) in CATEGORIES {
            out.push_str(&format!("  {name}: {} documents\n", docs.len()));
        }
        out.push_str("\nPass a category name to list its documents");
        return out;
    };

    let wanted = category.to_lowercase();
    match CATEGORIES.iter().find(|(name, _)| *name == wanted) {
        Some((name, docs)) => {
            let mut out = format!("{}\n{rule}\n\n", name.to_uppercase());
            for doc in *docs {
                out.push_str(&format!("  - {doc}.htm\n"));
            }
            out
        }
        None => {
            let names: Vec<&str> = CATEGORIES.iter().map(|(n, _)| *n).collect();
            format!(
                "Unknown category: {category}\n\nAvailable: {}",
                names.join(", ")
            )
        }
    }
}
