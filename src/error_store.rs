//! Persistent knowledge base of compiler errors and their fixes.
//!
//! Records are identified by their `(error_code, error_message)` pair. The
//! backing redb file is opened on first use and can be released with
//! [`ErrorStore::close`]; any later call opens it again.

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{DateTime, SecondsFormat, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    classifier,
    error::{Error, Result},
};

const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const IDENTITY: TableDefinition<(&str, &str), u64> =
    TableDefinition::new("identity");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID: &str = "next_id";

/// Result cap for code and keyword searches.
pub const SEARCH_LIMIT: usize = 10;
/// Largest occurrence count accepted from an import (a signed 64-bit
/// integer, as other tools export it).
pub const MAX_IMPORTED_COUNT: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: u64,
    pub error_code: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// JSON array of document names, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_docs: Option<String>,
    pub occurrence_count: u64,
    pub first_seen: String,
    pub last_seen: String,
}

impl ErrorRecord {
    /// Related documents as a list. A value that is not a JSON array of
    /// strings is returned as a single entry.
    pub fn related_doc_list(&self) -> Vec<String> {
        match self.related_docs.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)
                .unwrap_or_else(|_| vec![raw.to_string()]),
        }
    }
}

/// A freshly observed error, before the store assigns identity and counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewError {
    pub error_code: String,
    pub error_message: String,
    pub file_path: Option<String>,
    pub solution: Option<String>,
    pub related_docs: Option<String>,
}

impl NewError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: code.into(),
            error_message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_related_docs(mut self, docs: impl Into<String>) -> Self {
        self.related_docs = Some(docs.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorSearchResult {
    #[serde(flatten)]
    pub record: ErrorRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_errors: usize,
    pub total_occurrences: u64,
    pub store_location: String,
}

impl StoreStats {
    pub fn average_occurrences(&self) -> f64 {
        if self.total_errors == 0 {
            0.0
        } else {
            self.total_occurrences as f64 / self.total_errors as f64
        }
    }
}

/// Shape accepted by [`ErrorStore::import_errors`] for each element.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    error_code: String,
    error_message: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(default)]
    related_docs: Option<String>,
    #[serde(default = "default_count")]
    occurrence_count: u64,
    first_seen: String,
    last_seen: String,
}

fn default_count() -> u64 {
    1
}

/// RFC 3339 UTC with millisecond precision, so string order is time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn normalize_timestamp(raw: &str) -> Result<String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| timestamp(t.with_timezone(&Utc)))
        .map_err(|e| Error::InvalidRecord(format!("bad timestamp {raw:?}: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn by_frequency(a: &ErrorRecord, b: &ErrorRecord) -> Ordering {
    b.occurrence_count
        .cmp(&a.occurrence_count)
        .then_with(|| b.last_seen.cmp(&a.last_seen))
}

pub struct ErrorStore {
    path: PathBuf,
    db: Mutex<Option<Database>>,
}

impl ErrorStore {
    /// Create a handle for the store at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            db: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.db.lock().map(|db| db.is_some()).unwrap_or(false)
    }

    fn open(path: &Path) -> Result<Database> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| Error::DataDir(parent.to_path_buf()))?;
        }
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(IDENTITY)?;
        txn.open_table(META)?;
        txn.commit()?;

        tracing::debug!(path = %path.display(), "error store opened");
        Ok(db)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let mut guard = self.db.lock().map_err(|_| Error::LockPoisoned)?;
        let db = match guard.take() {
            Some(db) => db,
            None => Self::open(&self.path)?,
        };
        f(guard.insert(db))
    }

    /// Release the database handle. The next operation re-opens it.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.db.lock().map_err(|_| Error::LockPoisoned)?;
        if guard.take().is_some() {
            tracing::debug!(path = %self.path.display(), "error store closed");
        }
        Ok(())
    }

    /// Record an occurrence of an error seen now.
    pub fn add_error(&self, new: NewError) -> Result<ErrorRecord> {
        self.add_error_at(new, Utc::now())
    }

    /// Record an occurrence of an error seen at `seen_at`.
    ///
    /// A known `(code, message)` pair has its count bumped, `last_seen`
    /// refreshed and any supplied solution, file path or related docs
    /// replace the stored ones. Unknown pairs are inserted with a count of 1.
    pub fn add_error_at(
        &self,
        new: NewError,
        seen_at: DateTime<Utc>,
    ) -> Result<ErrorRecord> {
        let now = timestamp(seen_at);
        let file_path = non_empty(new.file_path);
        let solution = non_empty(new.solution);
        let related_docs = non_empty(new.related_docs);

        self.with_db(|db| {
            let txn = db.begin_write()?;
            let record = {
                let mut identity = txn.open_table(IDENTITY)?;
                let mut records = txn.open_table(RECORDS)?;
                let key = (new.error_code.as_str(), new.error_message.as_str());
                let existing = identity.get(key)?.map(|v| v.value());

                let record = match existing {
                    Some(id) => {
                        let mut record = load_record(&records, id)?;
                        record.occurrence_count =
                            record.occurrence_count.saturating_add(1);
                        if now > record.last_seen {
                            record.last_seen = now;
                        }
                        record.solution = solution.or(record.solution);
                        record.file_path = file_path.or(record.file_path);
                        record.related_docs =
                            related_docs.or(record.related_docs);
                        record
                    }
                    None => {
                        let mut meta = txn.open_table(META)?;
                        let id = allocate_id(&mut meta)?;
                        identity.insert(key, id)?;
                        ErrorRecord {
                            id,
                            error_code: new.error_code.clone(),
                            error_message: new.error_message.clone(),
                            file_path,
                            solution,
                            related_docs,
                            occurrence_count: 1,
                            first_seen: now.clone(),
                            last_seen: now,
                        }
                    }
                };
                save_record(&mut records, &record)?;
                record
            };
            txn.commit()?;
            Ok(record)
        })
    }

    fn all_records(&self) -> Result<Vec<ErrorRecord>> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(RECORDS)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let (_id, bytes) = entry?;
                result.push(serde_json::from_slice(bytes.value())?);
            }
            Ok(result)
        })
    }

    fn ranked_where(
        &self,
        keep: impl Fn(&ErrorRecord) -> bool,
        limit: usize,
    ) -> Result<Vec<ErrorRecord>> {
        let mut records: Vec<ErrorRecord> =
            self.all_records()?.into_iter().filter(|r| keep(r)).collect();
        records.sort_by(by_frequency);
        records.truncate(limit);
        Ok(records)
    }

    /// Look up errors by exact code, optionally narrowed to messages that
    /// contain `message` (case-sensitive).
    pub fn search_error(
        &self,
        code: &str,
        message: Option<&str>,
    ) -> Result<Vec<ErrorSearchResult>> {
        let records = self.ranked_where(
            |r| {
                r.error_code == code
                    && message.is_none_or(|m| r.error_message.contains(m))
            },
            SEARCH_LIMIT,
        )?;
        Ok(records
            .into_iter()
            .map(|record| ErrorSearchResult {
                record,
                relevance_score: None,
            })
            .collect())
    }

    /// Keyword search over messages and solutions.
    ///
    /// Every token longer than two characters must occur (case-insensitively)
    /// in the message or the solution. Results are ordered by relevance, then
    /// by frequency and recency.
    pub fn search_similar_errors(
        &self,
        text: &str,
    ) -> Result<Vec<ErrorSearchResult>> {
        let lower = text.to_lowercase();
        let terms: Vec<&str> = lower
            .split_whitespace()
            .filter(|t| t.chars().count() > 2)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let term_hits = |r: &ErrorRecord| {
            let message = r.error_message.to_lowercase();
            let solution = r.solution.as_deref().unwrap_or("").to_lowercase();
            terms
                .iter()
                .filter(|t| message.contains(**t) || solution.contains(**t))
                .count()
        };

        let records =
            self.ranked_where(|r| term_hits(r) == terms.len(), SEARCH_LIMIT)?;
        let mut results: Vec<ErrorSearchResult> = records
            .into_iter()
            .map(|record| {
                let score = term_hits(&record) as f64 / terms.len() as f64;
                ErrorSearchResult {
                    record,
                    relevance_score: Some(score),
                }
            })
            .collect();

        // Stable: equal relevance keeps frequency/recency order.
        results.sort_by(|a, b| {
            let a = a.relevance_score.unwrap_or(0.0);
            b.relevance_score.unwrap_or(0.0).total_cmp(&a)
        });
        Ok(results)
    }

    /// Search by the error code found in `query`, or by its keywords when it
    /// names no code. A `message` filter only applies to code searches.
    pub fn lookup(
        &self,
        query: &str,
        message: Option<&str>,
    ) -> Result<Vec<ErrorSearchResult>> {
        match (classifier::extract_error_code(query), message) {
            (Some(code), message) => self.search_error(&code, message),
            (None, None) => self.search_similar_errors(query),
            (None, Some(_)) => Err(Error::Config(format!(
                "a message filter needs an error code in the query: {query:?}"
            ))),
        }
    }

    /// The most frequent errors, most recent first among equals.
    pub fn list_common_errors(&self, limit: usize) -> Result<Vec<ErrorRecord>> {
        self.ranked_where(|_| true, limit)
    }

    /// Serialize every record as a pretty JSON array, most frequent first.
    /// `anonymize` drops file paths.
    pub fn export_errors(&self, anonymize: bool) -> Result<String> {
        let mut records = self.all_records()?;
        records.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));
        if anonymize {
            for record in &mut records {
                record.file_path = None;
            }
        }
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Merge a JSON array of records into the store.
    ///
    /// A payload that is not a JSON array fails the whole call. Individual
    /// records that cannot be applied are counted in `errors` and skipped.
    pub fn import_errors(&self, json: &str) -> Result<ImportSummary> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| Error::MalformedImport(e.to_string()))?;

        let mut summary = ImportSummary::default();
        for (idx, value) in values.into_iter().enumerate() {
            match self.import_one(value) {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.imported += 1,
                Err(e) => {
                    tracing::warn!(record = idx, error = %e, "failed to import record");
                    summary.errors += 1;
                }
            }
        }
        tracing::info!(
            imported = summary.imported,
            updated = summary.updated,
            errors = summary.errors,
            "error import finished"
        );
        Ok(summary)
    }

    /// Apply one imported record. Returns whether an existing record was
    /// updated.
    fn import_one(&self, value: serde_json::Value) -> Result<bool> {
        let incoming: ImportRecord = serde_json::from_value(value)
            .map_err(|e| Error::InvalidRecord(e.to_string()))?;
        if incoming.occurrence_count == 0 {
            return Err(Error::InvalidRecord(
                "occurrence_count must be at least 1".into(),
            ));
        }
        if incoming.occurrence_count > MAX_IMPORTED_COUNT {
            return Err(Error::InvalidRecord(format!(
                "occurrence_count {} is out of range",
                incoming.occurrence_count
            )));
        }
        let first_seen = normalize_timestamp(&incoming.first_seen)?;
        let last_seen = normalize_timestamp(&incoming.last_seen)?;
        if first_seen > last_seen {
            return Err(Error::InvalidRecord(
                "first_seen is later than last_seen".into(),
            ));
        }

        self.with_db(|db| {
            let txn = db.begin_write()?;
            let updated = {
                let mut identity = txn.open_table(IDENTITY)?;
                let mut records = txn.open_table(RECORDS)?;
                let key = (
                    incoming.error_code.as_str(),
                    incoming.error_message.as_str(),
                );
                let existing = identity.get(key)?.map(|v| v.value());

                match existing {
                    Some(id) => {
                        let mut record = load_record(&records, id)?;
                        record.occurrence_count =
                            record.occurrence_count.max(incoming.occurrence_count);
                        record.solution =
                            non_empty(incoming.solution).or(record.solution);
                        record.related_docs = non_empty(incoming.related_docs)
                            .or(record.related_docs);
                        record.first_seen = record.first_seen.min(first_seen);
                        record.last_seen = record.last_seen.max(last_seen);
                        save_record(&mut records, &record)?;
                        true
                    }
                    None => {
                        let mut meta = txn.open_table(META)?;
                        let id = allocate_id(&mut meta)?;
                        identity.insert(key, id)?;
                        let record = ErrorRecord {
                            id,
                            error_code: incoming.error_code.clone(),
                            error_message: incoming.error_message.clone(),
                            file_path: non_empty(incoming.file_path),
                            solution: non_empty(incoming.solution),
                            related_docs: non_empty(incoming.related_docs),
                            occurrence_count: incoming.occurrence_count,
                            first_seen,
                            last_seen,
                        };
                        save_record(&mut records, &record)?;
                        false
                    }
                }
            };
            txn.commit()?;
            Ok(updated)
        })
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let records = self.all_records()?;
        Ok(StoreStats {
            total_errors: records.len(),
            total_occurrences: records
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.occurrence_count)),
            store_location: self.path.display().to_string(),
        })
    }
}

impl std::fmt::Debug for ErrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn load_record(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<ErrorRecord> {
    let bytes = table.get(id)?.ok_or_else(|| Error::NotFound {
        kind: "error record",
        name: id.to_string(),
    })?;
    Ok(serde_json::from_slice(bytes.value())?)
}

fn save_record(
    table: &mut redb::Table<u64, &'static [u8]>,
    record: &ErrorRecord,
) -> Result<()> {
    let bytes = serde_json::to_vec(record)?;
    table.insert(record.id, bytes.as_slice())?;
    Ok(())
}

fn allocate_id(meta: &mut redb::Table<&'static str, u64>) -> Result<u64> {
    let id = meta.get(NEXT_ID)?.map(|v| v.value()).unwrap_or(1);
    meta.insert(NEXT_ID, id + 1)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn test_store() -> (tempfile::TempDir, ErrorStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ErrorStore::new(tmp.path().join("errors.redb"));
        (tmp, store)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn undeclared() -> NewError {
        NewError::new("E512", "undeclared identifier 'ResultCode'")
    }

    #[test]
    fn opens_lazily() {
        let (_tmp, store) = test_store();
        assert!(!store.is_open());
        assert!(!store.path().exists());

        store.stats().unwrap();
        assert!(store.is_open());
        assert!(store.path().exists());
    }

    #[test]
    fn insert_then_increment() {
        let (_tmp, store) = test_store();

        let first = store
            .add_error_at(undeclared().with_solution("Use ResultRetcode()"), at(0))
            .unwrap();
        assert_eq!(first.occurrence_count, 1);
        assert_eq!(first.first_seen, first.last_seen);

        let second = store
            .add_error_at(undeclared().with_solution("Use ResultRetcode()"), at(60))
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(second.solution.as_deref(), Some("Use ResultRetcode()"));
        assert_eq!(second.first_seen, first.first_seen);
        assert_eq!(second.last_seen, timestamp(at(60)));
    }

    #[test]
    fn repeated_logging_counts_every_call() {
        let (_tmp, store) = test_store();
        for i in 0..5 {
            store.add_error_at(undeclared(), at(i)).unwrap();
        }

        let records = store.list_common_errors(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].occurrence_count, 5);
        assert_eq!(records[0].first_seen, timestamp(at(0)));
        assert_eq!(records[0].last_seen, timestamp(at(4)));
    }

    #[test]
    fn nullable_fields_coalesce() {
        let (_tmp, store) = test_store();
        store
            .add_error_at(
                undeclared()
                    .with_solution("old fix")
                    .with_file_path("Experts/a.mq5")
                    .with_related_docs(r#"["ctrade.htm"]"#),
                at(0),
            )
            .unwrap();

        // Absent or blank values keep what is stored.
        let kept = store
            .add_error_at(undeclared().with_solution("  "), at(1))
            .unwrap();
        assert_eq!(kept.solution.as_deref(), Some("old fix"));
        assert_eq!(kept.file_path.as_deref(), Some("Experts/a.mq5"));

        let replaced = store
            .add_error_at(undeclared().with_solution("new fix"), at(2))
            .unwrap();
        assert_eq!(replaced.solution.as_deref(), Some("new fix"));
        assert_eq!(replaced.related_doc_list(), vec!["ctrade.htm"]);
    }

    #[test]
    fn identity_is_code_and_message() {
        let (_tmp, store) = test_store();
        let a = store.add_error(NewError::new("E512", "msg one")).unwrap();
        let b = store.add_error(NewError::new("E512", "msg two")).unwrap();
        let c = store.add_error(NewError::new("E308", "msg one")).unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(store.stats().unwrap().total_errors, 3);
    }

    #[test]
    fn search_by_code_orders_by_count_then_recency() {
        let (_tmp, store) = test_store();
        store.add_error_at(NewError::new("E512", "rare"), at(0)).unwrap();
        store.add_error_at(NewError::new("E512", "old"), at(1)).unwrap();
        store.add_error_at(NewError::new("E512", "old"), at(2)).unwrap();
        store.add_error_at(NewError::new("E512", "new"), at(3)).unwrap();
        store.add_error_at(NewError::new("E512", "new"), at(4)).unwrap();
        store.add_error_at(NewError::new("E308", "other"), at(5)).unwrap();

        let results = store.search_error("E512", None).unwrap();
        let messages: Vec<&str> = results
            .iter()
            .map(|r| r.record.error_message.as_str())
            .collect();

        assert_eq!(messages, vec!["new", "old", "rare"]);
        assert!(results.iter().all(|r| r.relevance_score.is_none()));
    }

    #[test]
    fn search_by_code_and_message_substring() {
        let (_tmp, store) = test_store();
        store.add_error(undeclared()).unwrap();
        store
            .add_error(NewError::new("E512", "undeclared identifier 'Ask'"))
            .unwrap();

        let results = store.search_error("E512", Some("'Ask'")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.error_message, "undeclared identifier 'Ask'");

        // Message matching is case-sensitive.
        assert!(store.search_error("E512", Some("'ask'")).unwrap().is_empty());
    }

    #[test]
    fn search_results_capped() {
        let (_tmp, store) = test_store();
        for i in 0..15 {
            store.add_error(NewError::new("E100", format!("message {i}"))).unwrap();
        }
        assert_eq!(store.search_error("E100", None).unwrap().len(), SEARCH_LIMIT);
        assert_eq!(store.list_common_errors(4).unwrap().len(), 4);
    }

    #[test]
    fn similar_search_requires_every_term() {
        let (_tmp, store) = test_store();
        store
            .add_error(undeclared().with_solution("Use ResultRetcode() instead"))
            .unwrap();
        store
            .add_error(NewError::new("E308", "implicit conversion from number"))
            .unwrap();

        let results = store.search_similar_errors("Undeclared RESULTRETCODE").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.error_code, "E512");
        assert_eq!(results[0].relevance_score, Some(1.0));

        assert!(
            store
                .search_similar_errors("undeclared conversion")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn similar_search_ties_break_by_frequency() {
        let (_tmp, store) = test_store();
        store.add_error_at(NewError::new("E1", "array out of range"), at(0)).unwrap();
        store.add_error_at(NewError::new("E2", "array out of range!"), at(1)).unwrap();
        store.add_error_at(NewError::new("E2", "array out of range!"), at(2)).unwrap();

        let results = store.search_similar_errors("array range").unwrap();
        let codes: Vec<&str> =
            results.iter().map(|r| r.record.error_code.as_str()).collect();

        assert_eq!(codes, vec!["E2", "E1"]);
        for r in &results {
            let score = r.relevance_score.unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn similar_search_short_terms_return_nothing() {
        let (_tmp, store) = test_store();
        assert!(store.search_similar_errors("to").unwrap().is_empty());
        assert!(store.search_similar_errors("  a  of ").unwrap().is_empty());
        // Storage was never touched.
        assert!(!store.is_open());
    }

    #[test]
    fn export_sorted_and_anonymized() {
        let (_tmp, store) = test_store();
        store
            .add_error(NewError::new("E1", "once").with_file_path("/secret/a.mq5"))
            .unwrap();
        store.add_error(NewError::new("E2", "twice")).unwrap();
        store.add_error(NewError::new("E2", "twice")).unwrap();

        let plain: Vec<ErrorRecord> =
            serde_json::from_str(&store.export_errors(false).unwrap()).unwrap();
        assert_eq!(plain[0].error_code, "E2");
        assert_eq!(plain[1].file_path.as_deref(), Some("/secret/a.mq5"));

        let anonymized = store.export_errors(true).unwrap();
        assert!(!anonymized.contains("file_path"));
        assert!(!anonymized.contains("/secret/a.mq5"));
    }

    #[test]
    fn export_import_roundtrip_updates_everything() {
        let (_tmp, store) = test_store();
        store.add_error(undeclared()).unwrap();
        store.add_error(undeclared()).unwrap();
        store
            .add_error(NewError::new("E308", "conversion").with_solution("cast"))
            .unwrap();
        let before = store.stats().unwrap();

        let exported = store.export_errors(false).unwrap();
        let summary = store.import_errors(&exported).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                imported: 0,
                updated: 2,
                errors: 0
            }
        );
        assert_eq!(store.stats().unwrap(), before);
    }

    #[test]
    fn import_into_empty_store_inserts() {
        let (_tmp, source) = test_store();
        source
            .add_error_at(undeclared().with_file_path("a.mq5"), at(0))
            .unwrap();
        let exported = source.export_errors(false).unwrap();

        let (_tmp2, target) = test_store();
        let summary = target.import_errors(&exported).unwrap();
        assert_eq!(summary.imported, 1);

        let records = target.list_common_errors(10).unwrap();
        assert_eq!(records[0].file_path.as_deref(), Some("a.mq5"));
        assert_eq!(records[0].first_seen, timestamp(at(0)));
    }

    #[test]
    fn import_merge_rules() {
        let (_tmp, store) = test_store();
        for i in 0..3 {
            store
                .add_error_at(undeclared().with_solution("mine"), at(100 + i))
                .unwrap();
        }

        let payload = serde_json::json!([
            {
                "error_code": "E512",
                "error_message": "undeclared identifier 'ResultCode'",
                "solution": "theirs",
                "occurrence_count": 2,
                "first_seen": timestamp(at(0)),
                "last_seen": timestamp(at(50)),
            }
        ]);
        let summary = store.import_errors(&payload.to_string()).unwrap();
        assert_eq!(summary.updated, 1);

        let record = &store.list_common_errors(1).unwrap()[0];
        // Larger count wins, earliest first_seen, latest last_seen.
        assert_eq!(record.occurrence_count, 3);
        assert_eq!(record.solution.as_deref(), Some("theirs"));
        assert_eq!(record.first_seen, timestamp(at(0)));
        assert_eq!(record.last_seen, timestamp(at(102)));
    }

    #[test]
    fn import_tolerates_bad_records() {
        let (_tmp, store) = test_store();
        let payload = serde_json::json!([
            { "error_code": "E1", "error_message": "missing timestamps" },
            {
                "error_code": "E2",
                "error_message": "fine",
                "occurrence_count": 4,
                "first_seen": "2024-01-01T00:00:00+00:00",
                "last_seen": "2024-02-01T00:00:00Z",
            },
            {
                "error_code": "E3",
                "error_message": "reversed",
                "first_seen": "2024-03-01T00:00:00Z",
                "last_seen": "2024-01-01T00:00:00Z",
            },
            42,
        ]);

        let summary = store.import_errors(&payload.to_string()).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 1,
                updated: 0,
                errors: 3
            }
        );

        let record = &store.search_error("E2", None).unwrap()[0].record;
        assert_eq!(record.occurrence_count, 4);
        assert_eq!(record.first_seen, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn occurrence_counts_never_wrap() {
        let (_tmp, store) = test_store();
        let record = |code: &str, count: u64| {
            serde_json::json!({
                "error_code": code,
                "error_message": "m",
                "occurrence_count": count,
                "first_seen": "2024-01-01T00:00:00Z",
                "last_seen": "2024-01-01T00:00:00Z",
            })
        };
        let payload = serde_json::json!([
            record("E1", u64::MAX),
            record("E2", MAX_IMPORTED_COUNT),
            record("E3", MAX_IMPORTED_COUNT),
            record("E4", MAX_IMPORTED_COUNT),
        ]);

        let summary = store.import_errors(&payload.to_string()).unwrap();
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.errors, 1);
        assert!(store.search_error("E1", None).unwrap().is_empty());

        let bumped = store.add_error(NewError::new("E2", "m")).unwrap();
        assert_eq!(bumped.occurrence_count, MAX_IMPORTED_COUNT + 1);
        assert_eq!(store.stats().unwrap().total_occurrences, u64::MAX);
    }

    #[test]
    fn lookup_by_code_or_keywords() {
        let (_tmp, store) = test_store();
        store.add_error(undeclared()).unwrap();
        store
            .add_error(NewError::new("E308", "implicit conversion"))
            .unwrap();

        let by_code = store.lookup("E512 something", Some("ResultCode")).unwrap();
        assert_eq!(by_code.len(), 1);
        assert_eq!(by_code[0].record.error_code, "E512");

        let by_words = store.lookup("implicit conversion", None).unwrap();
        assert_eq!(by_words[0].record.error_code, "E308");

        let err = store
            .lookup("implicit conversion", Some("implicit"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_payload_is_fatal() {
        let (_tmp, store) = test_store();
        for payload in ["not json", r#"{"error_code": "E1"}"#] {
            let err = store.import_errors(payload).unwrap_err();
            assert!(matches!(err, Error::MalformedImport(_)), "{payload}");
        }
        assert_eq!(store.stats().unwrap().total_errors, 0);
    }

    #[test]
    fn stats_sum_occurrences() {
        let (_tmp, store) = test_store();
        store.add_error(NewError::new("E1", "a")).unwrap();
        store.add_error(NewError::new("E1", "a")).unwrap();
        store.add_error(NewError::new("E2", "b")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_errors, 2);
        assert_eq!(stats.total_occurrences, 3);
        assert_eq!(stats.average_occurrences(), 1.5);
        assert!(stats.store_location.ends_with("errors.redb"));
    }

    #[test]
    fn close_releases_and_reopens() {
        let (_tmp, store) = test_store();
        store.add_error(undeclared()).unwrap();
        store.close().unwrap();
        assert!(!store.is_open());

        // A second handle can open the file once the first let go.
        let other = ErrorStore::new(store.path());
        assert_eq!(other.stats().unwrap().total_errors, 1);
        other.close().unwrap();

        assert_eq!(store.list_common_errors(10).unwrap()[0].occurrence_count, 1);
    }

    #[test]
    fn related_doc_list_tolerates_plain_strings() {
        let mut record = store_record();
        record.related_docs = Some(r#"["a.htm", "b.htm"]"#.into());
        assert_eq!(record.related_doc_list(), vec!["a.htm", "b.htm"]);

        record.related_docs = Some("ctrade.htm".into());
        assert_eq!(record.related_doc_list(), vec!["ctrade.htm"]);

        record.related_docs = None;
        assert!(record.related_doc_list().is_empty());
    }

    fn store_record() -> ErrorRecord {
        ErrorRecord {
            id: 1,
            error_code: "E1".into(),
            error_message: "m".into(),
            file_path: None,
            solution: None,
            related_docs: None,
            occurrence_count: 1,
            first_seen: timestamp(at(0)),
            last_seen: timestamp(at(0)),
        }
    }
}
