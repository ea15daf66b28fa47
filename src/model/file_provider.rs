//! Fetching called workflow files

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::workflows::{File, FileReference};

#[derive(Error, Debug)]
pub enum FileProviderError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of workflow files referenced by `uses:`
#[async_trait]
pub trait FileProvider: Send + Sync {
    async fn get_file_content(&self, reference: &FileReference) -> Result<File, FileProviderError>;
}

/// Resolves local references against a repository checkout on disk.
/// Remote references are not found.
#[derive(Debug, Clone)]
pub struct DirectoryFileProvider {
    root: PathBuf,
}

impl DirectoryFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileProvider for DirectoryFileProvider {
    async fn get_file_content(&self, reference: &FileReference) -> Result<File, FileProviderError> {
        let FileReference::Local { path } = reference else {
            return Err(FileProviderError::NotFound(reference.to_string()));
        };

        let not_found = || FileProviderError::NotFound(reference.to_string());
        let io_error = |path: &Path, source: std::io::Error| match source.kind() {
            std::io::ErrorKind::NotFound => not_found(),
            _ => FileProviderError::Io {
                path: path.display().to_string(),
                source,
            },
        };

        // symlinks and `..` are resolved before checking the file is under the root
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|source| io_error(&self.root, source))?;
        let joined = self.root.join(path);
        let full_path = tokio::fs::canonicalize(&joined)
            .await
            .map_err(|source| io_error(&joined, source))?;
        if !full_path.starts_with(&root) {
            warn!(path = %full_path.display(), "workflow reference leaves the repository root");
            return Err(not_found());
        }

        debug!(path = %full_path.display(), "reading workflow file");
        let content = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|source| io_error(&full_path, source))?;

        Ok(File::new(reference.to_string(), content))
    }
}

/// Files held in memory, keyed by their reference (`./path` or
/// `owner/repo/path@ref`)
#[derive(Debug, Clone, Default)]
pub struct InMemoryFileProvider {
    files: HashMap<String, String>,
}

impl InMemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, reference: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(reference.into(), content.into());
        self
    }
}

#[async_trait]
impl FileProvider for InMemoryFileProvider {
    async fn get_file_content(&self, reference: &FileReference) -> Result<File, FileProviderError> {
        let name = reference.to_string();
        match self.files.get(&name) {
            Some(content) => Ok(File::new(name, content.clone())),
            None => Err(FileProviderError::NotFound(name)),
        }
    }
}
