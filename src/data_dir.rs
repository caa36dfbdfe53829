use std::path::{Path, PathBuf};

use crate::{
    doc_index::Collection,
    error::{Error, Result},
};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The MQLHELP_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/mqlhelp/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("MQLHELP_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("mqlhelp")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn errors_db(&self) -> PathBuf {
        self.root.join("errors.redb")
    }
}

/// The documentation collections that were found on disk.
#[derive(Debug, Clone, Default)]
pub struct DocRoots {
    roots: Vec<(Collection, PathBuf)>,
}

impl DocRoots {
    /// Resolve the documentation base directory from, in order of priority:
    /// 1. An explicit path (from --docs-dir)
    /// 2. The MQLHELP_DOCS_DIR environment variable
    /// 3. The parent of the directory holding the running executable
    ///
    /// Only collection sub-directories that exist are kept.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let base = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("MQLHELP_DOCS_DIR") {
            PathBuf::from(val)
        } else {
            let exe = std::env::current_exe()?;
            exe.parent()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "cannot derive docs directory from {}",
                        exe.display()
                    ))
                })?
        };

        Ok(Self::under(&base))
    }

    /// Collect the collection directories present under `base`.
    pub fn under(base: &Path) -> Self {
        let roots = Collection::ALL
            .iter()
            .map(|c| (*c, base.join(c.dir_name())))
            .filter(|(_, path)| path.is_dir())
            .collect();
        Self { roots }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Collection, PathBuf)> {
        self.roots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// One-line summary for startup logs.
    pub fn describe(&self) -> String {
        if self.roots.is_empty() {
            return "(no documentation directories)".to_string();
        }
        self.roots
            .iter()
            .map(|(c, path)| format!("{}:{}", c.dir_name(), path.display()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}
