//! Locating saved models on disk or in a versioned store

use crate::config::{TransferLearningConfig, ValidationError};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Revision used when a repository locator names none
pub const DEFAULT_REVISION: &str = "HEAD";

/// Where a saved model lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocator {
    /// A model directory on local disk
    Disk(PathBuf),
    /// A model directory inside a versioned repository
    Repository {
        url: String,
        rev: Option<String>,
        path_in_repo: PathBuf,
    },
}

impl ArtifactLocator {
    /// Locator described by a transfer-learning section
    ///
    /// A `repo_url` selects the repository form; the in-repo path is
    /// `model_path_in_repo`, falling back to `pre_trained_model_path`.
    pub fn from_transfer_config(config: &TransferLearningConfig) -> Result<Self> {
        match (&config.repo_url, &config.pre_trained_model_path) {
            (Some(url), path) => {
                let path_in_repo = config
                    .model_path_in_repo
                    .as_ref()
                    .map(PathBuf::from)
                    .or_else(|| path.clone())
                    .unwrap_or_default();
                Ok(Self::Repository {
                    url: url.clone(),
                    rev: config.rev.clone(),
                    path_in_repo,
                })
            }
            (None, Some(path)) => Ok(Self::Disk(path.clone())),
            (None, None) => Err(ValidationError::MissingPretrainedLocator.into()),
        }
    }
}

/// A versioned store that materialises repository artifacts locally
pub trait ArtifactStore {
    /// Local directory holding `path_in_repo` of `url` at `rev`
    fn fetch(&self, url: &str, rev: Option<&str>, path_in_repo: &Path) -> Result<PathBuf>;
}

/// Store backed by a local mirror directory
///
/// Artifacts live under `<root>/<sha256 of url>/<rev>/<path_in_repo>`.
#[derive(Debug, Clone)]
pub struct LocalMirrorStore {
    root: PathBuf,
}

impl LocalMirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mirror directory of one repository revision
    pub fn revision_dir(&self, url: &str, rev: Option<&str>) -> PathBuf {
        self.root
            .join(url_digest(url))
            .join(rev.unwrap_or(DEFAULT_REVISION))
    }
}

impl ArtifactStore for LocalMirrorStore {
    fn fetch(&self, url: &str, rev: Option<&str>, path_in_repo: &Path) -> Result<PathBuf> {
        let dir = self.revision_dir(url, rev).join(path_in_repo);
        if !dir.is_dir() {
            return Err(Error::Artifact(format!(
                "'{}' at revision '{}' of {url} is not mirrored under {}",
                path_in_repo.display(),
                rev.unwrap_or(DEFAULT_REVISION),
                self.root.display()
            )));
        }
        debug!(url, dir = %dir.display(), "artifact resolved from mirror");
        Ok(dir)
    }
}

fn url_digest(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Resolve `locator` to a local model directory
///
/// Repository locators need a `store`.
pub fn resolve_artifact(
    locator: &ArtifactLocator,
    store: Option<&dyn ArtifactStore>,
) -> Result<PathBuf> {
    match locator {
        ArtifactLocator::Disk(path) => {
            if path.is_dir() {
                Ok(path.clone())
            } else {
                Err(Error::Artifact(format!(
                    "no model directory at {}",
                    path.display()
                )))
            }
        }
        ArtifactLocator::Repository {
            url,
            rev,
            path_in_repo,
        } => {
            let store = store.ok_or_else(|| {
                Error::Artifact(format!("no artifact store configured to fetch from {url}"))
            })?;
            store.fetch(url, rev.as_deref(), path_in_repo)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locator_prefers_repository() {
        let config = TransferLearningConfig {
            pre_trained_model_path: Some("models/base".into()),
            repo_url: Some("https://example.org/models.git".to_string()),
            rev: Some("v1".to_string()),
            ..Default::default()
        };
        let locator = ArtifactLocator::from_transfer_config(&config).unwrap();
        assert_eq!(
            locator,
            ArtifactLocator::Repository {
                url: "https://example.org/models.git".to_string(),
                rev: Some("v1".to_string()),
                path_in_repo: PathBuf::from("models/base"),
            }
        );
    }

    #[test]
    fn test_locator_requires_a_location() {
        let result = ArtifactLocator::from_transfer_config(&TransferLearningConfig::default());
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::MissingPretrainedLocator))
        ));
    }

    #[test]
    fn test_mirror_layout() {
        let root = TempDir::new().unwrap();
        let store = LocalMirrorStore::new(root.path());
        let url = "https://example.org/models.git";

        let missing = store.fetch(url, Some("v1"), Path::new("base"));
        assert!(matches!(missing, Err(Error::Artifact(_))));

        let dir = store.revision_dir(url, Some("v1")).join("base");
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(store.fetch(url, Some("v1"), Path::new("base")).unwrap(), dir);
        assert_eq!(
            store.revision_dir(url, None).file_name().unwrap(),
            DEFAULT_REVISION
        );
        // 64 hex chars of SHA-256
        let digest = store.revision_dir(url, None);
        let digest = digest.parent().unwrap().file_name().unwrap();
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_repository_needs_store() {
        let locator = ArtifactLocator::Repository {
            url: "u".to_string(),
            rev: None,
            path_in_repo: PathBuf::new(),
        };
        assert!(matches!(
            resolve_artifact(&locator, None),
            Err(Error::Artifact(_))
        ));
    }
}
