//! In-memory lookup index over the documentation collections.
//!
//! Keys are lowercased file stems. Each file also contributes synonym keys
//! (class-name-stripped variants, topic aliases and per-book prefixes) so
//! that the ranker can treat every key uniformly.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{data_dir::DocRoots, error::Result, walker};

/// A documentation collection shipped next to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Collection {
    /// The official language reference.
    Help,
    AlgoBook,
    NeuralNetworksBook,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Help,
        Collection::AlgoBook,
        Collection::NeuralNetworksBook,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Collection::Help => "MQL5_HELP",
            Collection::AlgoBook => "MQL5_Algo_Book",
            Collection::NeuralNetworksBook => "Neural_Networks_Book",
        }
    }

    fn key_prefix(self) -> Option<&'static str> {
        match self {
            Collection::Help => None,
            Collection::AlgoBook => Some("algo_"),
            Collection::NeuralNetworksBook => Some("nn_"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Location of one indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocEntry {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub collection: Collection,
}

impl DocEntry {
    pub fn is_markdown(&self) -> bool {
        self.abs_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md"))
    }
}

const ONNX_ALIASES: &[&str] = &["onnx", "onnx_guide", "ml", "ai"];

/// Lowercased file name with any documentation extension removed.
pub fn lookup_key(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    for ext in [".html", ".htm", ".md"] {
        if let Some(stem) = lower.strip_suffix(ext) {
            return stem.to_string();
        }
    }
    lower
}

/// Insertion-ordered mapping from lookup key to document.
#[derive(Debug, Default)]
pub struct DocIndex {
    entries: Vec<(String, DocEntry)>,
    positions: HashMap<String, usize>,
    names: HashMap<String, DocEntry>,
}

impl DocIndex {
    /// Walk every collection root and index the documents found there.
    pub fn build(roots: &DocRoots) -> Result<Self> {
        let matcher = walker::doc_matcher()?;
        let mut index = Self::default();

        for (collection, root) in roots.iter() {
            let files = walker::discover_files(root, &matcher)?;
            tracing::debug!(
                collection = %collection,
                files = files.len(),
                "indexing collection"
            );
            for file in files {
                index.add(*collection, &file.relative_path, file.absolute_path);
            }
        }

        tracing::info!(
            keys = index.len(),
            names = index.names.len(),
            "documentation index built"
        );
        Ok(index)
    }

    /// Register one document under its primary key and all synonyms.
    pub fn add(
        &mut self,
        collection: Collection,
        rel_path: &Path,
        abs_path: PathBuf,
    ) {
        let file_name = rel_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = lookup_key(&file_name);
        let entry = DocEntry {
            abs_path,
            rel_path: rel_path.to_string_lossy().to_string(),
            collection,
        };

        self.insert(stem.clone(), entry.clone());
        self.names
            .entry(stem.clone())
            .or_insert_with(|| entry.clone());

        if stem.starts_with('c') && stem.chars().count() > 2 {
            self.insert(stem[1..].to_string(), entry.clone());
        }

        if stem.contains("onnx") {
            for alias in ONNX_ALIASES {
                self.insert((*alias).to_string(), entry.clone());
            }
        }

        if let Some(prefix) = collection.key_prefix() {
            self.insert(format!("{prefix}{stem}"), entry);
        }
    }

    fn insert(&mut self, key: String, entry: DocEntry) {
        match self.positions.get(&key) {
            Some(&pos) => self.entries[pos].1 = entry,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&DocEntry> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// Look up by file name only, ignoring synonym keys.
    pub fn get_by_name(&self, name: &str) -> Option<&DocEntry> {
        self.names.get(name)
    }

    /// All keys in first-insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DocEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }
}
