//! HuggingFace Hub artifact store

use super::artifact::{ArtifactStore, DEFAULT_REVISION};
use super::{MODEL_CONFIG_FILE, MODULE_CHECKPOINT_FILE};
use crate::error::{Error, Result};
use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fetches saved models from HuggingFace Hub model repositories
pub struct HubStore {
    token: Option<String>,
    cache_dir: PathBuf,
}

impl HubStore {
    /// Store using `HF_TOKEN` or `~/.huggingface/token` when present
    pub fn new() -> Self {
        Self {
            token: resolve_token(),
            cache_dir: default_cache_dir(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    fn api(&self) -> Result<Api> {
        ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_token(self.token.clone())
            .build()
            .map_err(|e| Error::Artifact(format!("failed to initialise hub client: {e}")))
    }
}

impl Default for HubStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for HubStore {
    fn fetch(&self, url: &str, rev: Option<&str>, path_in_repo: &Path) -> Result<PathBuf> {
        let repo_id = parse_repo_id(url)?;
        let revision = match rev {
            None | Some(DEFAULT_REVISION) => "main",
            Some(rev) => rev,
        };
        let repo = self.api()?.repo(Repo::with_revision(
            repo_id.clone(),
            RepoType::Model,
            revision.to_string(),
        ));

        let mut dir = None;
        for file in [MODEL_CONFIG_FILE, MODULE_CHECKPOINT_FILE] {
            let remote = path_in_repo.join(file);
            let remote = remote.to_string_lossy().replace('\\', "/");
            let local = repo.get(&remote).map_err(|e| {
                Error::Artifact(format!("failed to fetch {remote} from {repo_id}@{revision}: {e}"))
            })?;
            dir = local.parent().map(Path::to_path_buf);
        }
        info!(repo = %repo_id, revision, "fetched model from hub");
        dir.ok_or_else(|| Error::Artifact(format!("empty download from {repo_id}")))
    }
}

/// `org/name` from a bare id or a `https://huggingface.co/org/name` URL
fn parse_repo_id(url: &str) -> Result<String> {
    let id = url
        .trim_start_matches("https://huggingface.co/")
        .trim_end_matches('/');
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::Artifact(format!("invalid hub repository: {url}")));
    }
    Ok(id.to_string())
}

/// `HF_TOKEN`, then `~/.huggingface/token`
fn resolve_token() -> Option<String> {
    if let Ok(token) = std::env::var("HF_TOKEN") {
        if !token.is_empty() {
            return Some(token);
        }
    }
    let path = dirs::home_dir()?.join(".huggingface").join("token");
    let token = std::fs::read_to_string(path).ok()?.trim().to_string();
    (!token.is_empty()).then_some(token)
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("huggingface")
        .join("hub")
}
