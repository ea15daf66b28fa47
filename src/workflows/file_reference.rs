//! References to workflow files from `uses:`

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileReference {
    /// `./.github/workflows/build.yml`, relative to the repository root
    Local { path: String },
    /// `owner/repo/.github/workflows/build.yml@ref`
    Remote {
        owner: String,
        repository: String,
        path: String,
        version: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileReferenceError {
    #[error("Invalid workflow reference '{0}': a path is required")]
    MissingPath(String),

    #[error("Invalid workflow reference '{0}': expected 'owner/repo/path@ref'")]
    MissingVersion(String),

    #[error("Invalid workflow reference '{0}': expected 'owner/repo/path@ref'")]
    MissingOwner(String),

    #[error("Invalid workflow reference '{0}': the path must stay inside the repository")]
    OutsideRepository(String),
}

impl FileReference {
    pub fn parse(reference: &str) -> Result<Self, FileReferenceError> {
        if let Some(path) = reference.strip_prefix("./") {
            if path.is_empty() {
                return Err(FileReferenceError::MissingPath(reference.to_string()));
            }
            if escapes_root(path) {
                return Err(FileReferenceError::OutsideRepository(reference.to_string()));
            }
            return Ok(FileReference::Local {
                path: path.to_string(),
            });
        }

        let (remote_path, version) = reference
            .split_once('@')
            .filter(|(_, version)| !version.is_empty())
            .ok_or_else(|| FileReferenceError::MissingVersion(reference.to_string()))?;

        let mut segments = remote_path.split('/').filter(|s| !s.is_empty());
        let (owner, repository) = match (segments.next(), segments.next()) {
            (Some(owner), Some(repository)) => (owner, repository),
            _ => return Err(FileReferenceError::MissingOwner(reference.to_string())),
        };
        let path = segments.collect::<Vec<_>>().join("/");
        if path.is_empty() {
            return Err(FileReferenceError::MissingPath(reference.to_string()));
        }
        if escapes_root(&path) {
            return Err(FileReferenceError::OutsideRepository(reference.to_string()));
        }

        Ok(FileReference::Remote {
            owner: owner.to_string(),
            repository: repository.to_string(),
            path,
            version: version.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        match self {
            FileReference::Local { path } | FileReference::Remote { path, .. } => path,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, FileReference::Local { .. })
    }
}

/// Absolute paths and `..` segments could leave the repository.
fn escapes_root(path: &str) -> bool {
    path.starts_with('/') || path.split(['/', '\\']).any(|segment| segment == "..")
}

/// The identifier used as the file name of a fetched workflow
impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileReference::Local { path } => write!(f, "./{}", path),
            FileReference::Remote {
                owner,
                repository,
                path,
                version,
            } => write!(f, "{}/{}/{}@{}", owner, repository, path, version),
        }
    }
}
