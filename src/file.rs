//! Model artifact resolution.
//!
//! A tagger repository ships two files: the ONNX classifier and the CSV with
//! its tag vocabulary. An `ArtifactStore` turns a repository id into local
//! paths for both, downloading them first when needed.

use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::{Path, PathBuf};

use crate::error::{Result, TaggerError};

pub const MODEL_FILENAME: &str = "model.onnx";
pub const LABEL_FILENAME: &str = "selected_tags.csv";

const MODEL_ROOT: &str = "models";

/// Local paths of the two files a tagger model consists of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub vocabulary: PathBuf,
    pub weights: PathBuf,
}

/// Resolves a repository id to local model files.
///
/// Implementations must be idempotent: fetching the same repository twice
/// must not download anything the second time.
pub trait ArtifactStore: Send {
    fn fetch(&self, repo_id: &str) -> Result<ModelArtifacts>;
}

/// Downloads models from the Hugging Face Hub into the local hub cache.
pub struct HubStore {
    api: Api,
}

impl HubStore {
    /// Uses the default hub cache (`~/.cache/huggingface/hub`, or `HF_HOME`).
    pub fn new() -> Result<Self> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| TaggerError::artifact("<hub>", e))?;
        Ok(Self { api })
    }

    pub fn with_cache_dir<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .with_cache_dir(cache_dir.as_ref().to_path_buf())
            .build()
            .map_err(|e| TaggerError::artifact("<hub>", e))?;
        Ok(Self { api })
    }

    fn get(&self, repo_id: &str, file_name: &str) -> Result<PathBuf> {
        tracing::debug!("Resolving {}/{}", repo_id, file_name);
        self.api
            .model(repo_id.to_string())
            .get(file_name)
            .map_err(|e| TaggerError::artifact(repo_id, format!("{}: {}", file_name, e)))
    }
}

impl ArtifactStore for HubStore {
    fn fetch(&self, repo_id: &str) -> Result<ModelArtifacts> {
        let vocabulary = self.get(repo_id, LABEL_FILENAME)?;
        let weights = self.get(repo_id, MODEL_FILENAME)?;
        Ok(ModelArtifacts {
            vocabulary,
            weights,
        })
    }
}

/// Serves models that were already placed on disk as `<root>/<repo_id>/<file>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn get_file_path(&self, repo_id: &str, file_name: &str) -> PathBuf {
        self.root.join(repo_id).join(file_name)
    }

    fn get(&self, repo_id: &str, file_name: &str) -> Result<PathBuf> {
        let path = self.get_file_path(repo_id, file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(TaggerError::artifact(
                repo_id,
                format!("{} not found", path.display()),
            ))
        }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new(MODEL_ROOT)
    }
}

impl ArtifactStore for LocalStore {
    fn fetch(&self, repo_id: &str) -> Result<ModelArtifacts> {
        Ok(ModelArtifacts {
            vocabulary: self.get(repo_id, LABEL_FILENAME)?,
            weights: self.get(repo_id, MODEL_FILENAME)?,
        })
    }
}
