//! The smart query pipeline: classify, consult the error store, rank
//! documents, extract and format.

use crate::{
    classifier::{self, QueryKind},
    doc_index::DocIndex,
    error::Result,
    error_store::{ErrorSearchResult, ErrorStore},
    extractor,
    formatter::{self, Mode, SmartQueryResult},
    migration, ranker,
};

pub const STORE_REFERENCE: &str = "error database";
pub const NO_REFERENCE: &str = "none";
const NO_RESULT_TOKENS: usize = 100;

pub struct QueryEngine<'a> {
    index: &'a DocIndex,
    store: &'a ErrorStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a DocIndex, store: &'a ErrorStore) -> Self {
        Self { index, store }
    }

    /// Answer a free-form query.
    ///
    /// Error queries are looked up in the error store first; a hit there
    /// short-circuits document search.
    pub fn query(&self, query: &str, mode: Mode) -> Result<SmartQueryResult> {
        let analysis = classifier::classify(query);
        tracing::debug!(kind = ?analysis.kind, keywords = ?analysis.keywords, "query classified");

        if analysis.kind == QueryKind::Error {
            let hits = self.store.lookup(query, None)?;
            if let Some(top) = hits.first() {
                tracing::debug!(id = top.record.id, "answered from error store");
                return Ok(from_store(top, mode));
            }
        }

        let mut keywords = analysis.keywords.clone();
        if analysis.kind == QueryKind::Error
            && let Some(extra) = migration::undeclared_replacement(query)
            && !keywords.contains(&extra)
        {
            keywords.push(extra);
        }

        let candidates =
            ranker::rank(&keywords, self.index, mode.candidate_limit());
        let Some(primary) = candidates.first() else {
            let answer = format!(
                "No matching documentation found. Keywords: {}",
                analysis.keywords.join(", ")
            );
            return Ok(SmartQueryResult::plain(
                mode,
                answer,
                NO_REFERENCE,
                NO_RESULT_TOKENS,
            ));
        };

        tracing::debug!(key = primary.key, score = primary.score, "primary document");
        let info = extractor::extract(&primary.entry.abs_path);
        let doc_name = primary.entry.rel_path.as_str();

        Ok(match mode {
            Mode::Quick => formatter::format_quick(&info, &analysis, doc_name),
            Mode::Detailed => {
                let mut related: Vec<String> = Vec::new();
                for c in &candidates[1..] {
                    let path = &c.entry.rel_path;
                    // Synonym keys can lead back to the primary page.
                    if path != doc_name && !related.contains(path) {
                        related.push(path.clone());
                    }
                }
                formatter::format_detailed(&info, &analysis, doc_name, &related)
            }
        })
    }
}

fn from_store(hit: &ErrorSearchResult, mode: Mode) -> SmartQueryResult {
    let record = &hit.record;
    let mut answer = format!(
        "Found a known fix in the error database (seen {} times)\n\n\
         Error: {} - {}\n\n",
        record.occurrence_count, record.error_code, record.error_message
    );
    if let Some(solution) = &record.solution {
        answer.push_str(&format!("Solution:\n{solution}\n\n"));
    }
    if let Some(docs) = &record.related_docs {
        answer.push_str(&format!("Related documents:\n{docs}\n\n"));
    }
    answer.push_str(
        "Tip: if this does not fix it, query the documentation for more detail",
    );

    let tokens = answer.chars().count() / 4;
    let mut result =
        SmartQueryResult::plain(mode, answer, STORE_REFERENCE, tokens);
    result.related_docs = record.related_doc_list();
    result
}
