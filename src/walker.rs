use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// A discovered documentation file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the collection root directory.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

/// File name patterns picked up by the indexer.
pub const DOC_PATTERNS: &[&str] = &["*.htm", "*.html", "*.md"];

/// Compile [`DOC_PATTERNS`] into a case-insensitive matcher.
pub fn doc_matcher() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DOC_PATTERNS {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                Error::Config(format!("invalid glob pattern {pattern}: {e}"))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {e}")))
}

/// Recursively walk a directory and discover documentation files.
///
/// Skips hidden files/directories (names starting with `.`) and only
/// returns files whose name matches `matcher`.
pub fn discover_files(
    root: &Path,
    matcher: &GlobSet,
) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, matcher, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    matcher: &GlobSet,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), matcher, results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            if resolved.is_file() && matcher.is_match(&file_name) {
                results.push(make_discovered(root, &entry.path(), &resolved));
            }
        } else if file_type.is_file() && matcher.is_match(&file_name) {
            let abs = entry.path().canonicalize()?;
            results.push(make_discovered(root, &entry.path(), &abs));
        }
    }

    Ok(())
}

fn make_discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: &Path,
) -> DiscoveredFile {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();

    DiscoveredFile {
        relative_path,
        absolute_path: absolute_path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[DiscoveredFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative_path.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discovers_html_and_markdown() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ordersend.htm"), "<p>x</p>").unwrap();
        std::fs::write(tmp.path().join("guide.md"), "# Guide").unwrap();
        std::fs::write(tmp.path().join("page.html"), "<p>y</p>").unwrap();
        std::fs::write(tmp.path().join("image.png"), "binary").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "plain").unwrap();

        let files = discover_files(tmp.path(), &doc_matcher().unwrap()).unwrap();

        assert_eq!(names(&files), vec!["guide.md", "ordersend.htm", "page.html"]);
    }

    #[test]
    fn extension_match_ignores_case() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("CTrade.HTM"), "<p>x</p>").unwrap();

        let files = discover_files(tmp.path(), &doc_matcher().unwrap()).unwrap();
        assert_eq!(names(&files), vec!["CTrade.HTM"]);
    }

    #[test]
    fn skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let hidden = tmp.path().join(".cache");
        std::fs::create_dir(&hidden).unwrap();
        std::fs::write(hidden.join("stale.htm"), "old").unwrap();
        std::fs::write(tmp.path().join(".draft.md"), "secret").unwrap();
        std::fs::write(tmp.path().join("visible.md"), "hello").unwrap();

        let files = discover_files(tmp.path(), &doc_matcher().unwrap()).unwrap();
        assert_eq!(names(&files), vec!["visible.md"]);
    }

    #[test]
    fn recurses_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("trading");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("ordersend.htm"), "deep").unwrap();
        std::fs::write(tmp.path().join("index.htm"), "top").unwrap();

        let files = discover_files(tmp.path(), &doc_matcher().unwrap()).unwrap();
        let paths = names(&files);

        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"index.htm".to_string()));
        assert!(paths.contains(&"trading/ordersend.htm".to_string()));
        assert!(files.iter().all(|f| f.absolute_path.is_absolute()));
    }

    #[test]
    fn empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let files = discover_files(tmp.path(), &doc_matcher().unwrap()).unwrap();
        assert!(files.is_empty());
    }
}
