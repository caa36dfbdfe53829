//! Shapes extracted fields into quick or detailed answers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    classifier::{QueryAnalysis, QueryKind},
    extractor::ExtractedInfo,
    text_util::truncate_chars,
};

pub const QUICK_TOKENS: usize = 500;
pub const DETAILED_TOKENS: usize = 1500;
pub const MAX_RELATED_DOCS: usize = 3;

/// Answer verbosity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Compact answer (~500 tokens).
    #[default]
    Quick,
    /// Every extracted field (~1500 tokens).
    Detailed,
}

impl Mode {
    /// How many candidate documents the engine ranks for this mode.
    pub fn candidate_limit(self) -> usize {
        match self {
            Mode::Quick => 1,
            Mode::Detailed => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartQueryResult {
    pub mode: Mode,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Shortened example used by quick answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub reference: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_docs: Vec<String>,
    pub estimated_tokens: usize,
}

impl SmartQueryResult {
    /// A bare answer with no extracted fields.
    pub fn plain(
        mode: Mode,
        answer: String,
        reference: &str,
        estimated_tokens: usize,
    ) -> Self {
        Self {
            mode,
            answer,
            syntax: None,
            parameters: None,
            returns: None,
            example: None,
            code: None,
            notes: Vec::new(),
            reference: reference.to_string(),
            related_docs: Vec::new(),
            estimated_tokens,
        }
    }
}

fn description_prefix(info: &ExtractedInfo, max: usize) -> Option<&str> {
    info.description
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| truncate_chars(d, max))
}

pub fn format_quick(
    info: &ExtractedInfo,
    analysis: &QueryAnalysis,
    doc_name: &str,
) -> SmartQueryResult {
    let answer = match analysis.kind {
        QueryKind::Error => {
            let mut answer = String::from("Error diagnosis\n\n");
            if let Some(desc) = description_prefix(info, 150) {
                answer.push_str(desc);
                answer.push('\n');
            }
            answer.push_str("\nSuggested fix:\n");
            if let Some(syntax) = &info.syntax {
                answer.push_str(&format!("use: {syntax}\n"));
            }
            answer
        }
        QueryKind::Function | QueryKind::Class => info
            .syntax
            .clone()
            .or_else(|| description_prefix(info, 100).map(str::to_string))
            .unwrap_or_else(|| "Function/class reference".to_string()),
        QueryKind::HowTo | QueryKind::Concept => description_prefix(info, 200)
            .map(str::to_string)
            .unwrap_or_else(|| "Query result".to_string()),
    };

    let mut result =
        SmartQueryResult::plain(Mode::Quick, answer, doc_name, QUICK_TOKENS);
    result.code = info
        .example
        .as_deref()
        .map(|e| truncate_chars(e, 200).to_string());
    result
}

pub fn format_detailed(
    info: &ExtractedInfo,
    _analysis: &QueryAnalysis,
    doc_name: &str,
    related_docs: &[String],
) -> SmartQueryResult {
    let answer = info
        .description
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "Detailed reference".to_string());

    SmartQueryResult {
        mode: Mode::Detailed,
        answer,
        syntax: info.syntax.clone(),
        parameters: info.parameters.clone(),
        returns: info.returns.clone(),
        example: info.example.clone(),
        code: None,
        notes: info.notes.clone(),
        reference: doc_name.to_string(),
        related_docs: related_docs.iter().take(MAX_RELATED_DOCS).cloned().collect(),
        estimated_tokens: DETAILED_TOKENS,
    }
}

/// Render a result as the text block returned to tool callers.
pub fn render_text(result: &SmartQueryResult, query: &str) -> String {
    let mut out = String::from("Smart query result\n");
    out.push_str(&"=".repeat(60));
    out.push_str(&format!("\n\nQuery: {query}\n"));
    out.push_str(&format!(
        "Mode: {}\n",
        match result.mode {
            Mode::Quick => "quick",
            Mode::Detailed => "detailed",
        }
    ));
    out.push_str(&format!("Estimated tokens: ~{}\n\n", result.estimated_tokens));
    out.push_str(&"-".repeat(60));
    out.push_str(&format!("\n\nAnswer:\n{}\n\n", result.answer));

    let sections = [
        ("Syntax", &result.syntax),
        ("Parameters", &result.parameters),
        ("Returns", &result.returns),
    ];
    for (title, value) in sections {
        if let Some(value) = value {
            out.push_str(&format!("{title}:\n{value}\n\n"));
        }
    }

    if let Some(code) = result.code.as_ref().or(result.example.as_ref()) {
        out.push_str(&format!("Example:\n{code}\n\n"));
    }

    if !result.notes.is_empty() {
        out.push_str("Notes:\n");
        for (i, note) in result.notes.iter().enumerate() {
            out.push_str(&format!("{}. {note}\n", i + 1));
        }
        out.push('\n');
    }

    out.push_str(&format!("Reference: {}\n", result.reference));

    if !result.related_docs.is_empty() {
        out.push_str("\nRelated documents:\n");
        for doc in &result.related_docs {
            out.push_str(&format!("  - {doc}\n"));
        }
    }

    out
}
