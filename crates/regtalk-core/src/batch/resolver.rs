//! Batch file lookup

use std::path::{Path, PathBuf};

use super::BatchError;

/// Extension tried when a token names a batch file without one
pub const BATCH_FILE_EXTENSION: &str = "txt";

/// Contents of a batch file found for a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Stable identity of the file, used for cycle detection
    pub key: String,
    pub contents: String,
}

/// Finds batch files named by tokens
pub trait FileResolver {
    /// Return the file named by `name`, or `None` if there is no such file
    fn resolve(&self, name: &str) -> Result<Option<ResolvedFile>, BatchError>;
}

/// Resolver that never finds a file
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFiles;

impl FileResolver for NoFiles {
    fn resolve(&self, _name: &str) -> Result<Option<ResolvedFile>, BatchError> {
        Ok(None)
    }
}

/// Resolves names relative to a base directory, with or without `.txt`
#[derive(Debug, Clone)]
pub struct DirResolver {
    base_dir: PathBuf,
}

impl DirResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolver rooted at the current working directory
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    fn candidates(&self, name: &str) -> [PathBuf; 2] {
        [
            self.base_dir.join(name),
            self.base_dir
                .join(format!("{}.{}", name, BATCH_FILE_EXTENSION)),
        ]
    }
}

impl FileResolver for DirResolver {
    fn resolve(&self, name: &str) -> Result<Option<ResolvedFile>, BatchError> {
        if name.is_empty() {
            return Ok(None);
        }

        let Some(path) = self.candidates(name).into_iter().find(|p| p.is_file()) else {
            return Ok(None);
        };

        let contents = read_batch_file(&path)?;
        let key = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string();
        tracing::debug!("resolved batch file {} for '{}'", key, name);
        Ok(Some(ResolvedFile { key, contents }))
    }
}

/// Read a batch file with encoding fallback (UTF-8 first, then lossy)
fn read_batch_file(path: &Path) -> Result<String, BatchError> {
    let bytes = std::fs::read(path).map_err(|e| BatchError::FileRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
