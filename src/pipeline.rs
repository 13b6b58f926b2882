//! This module provides the `Tagger`, the single entry point for captioning
//! an image with a WD tagger model.
//!
//! A `Tagger` owns one model slot. The first request for a repository fetches
//! its artifacts, parses the vocabulary and opens the classifier; later
//! requests for the same repository reuse it, and a request for a different
//! repository replaces it. Calls are synchronous and need `&mut self`, so
//! sharing one tagger across threads requires external serialization.

use std::path::PathBuf;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::{
    error::{Result, TaggerError},
    file::{ArtifactStore, HubStore},
    processor::ImagePreprocessor,
    selector::{self, CategoryFilter, SelectOptions, Selection},
    tagger::{Classifier, ClassifierLoader, OnnxLoader},
    tags::TagVocabulary,
};

/// Model used when a request names a model the table does not know.
pub const DEFAULT_MODEL: &str = "vitv3";

/// Repository used when the table has no entry for `DEFAULT_MODEL` either.
pub const DEFAULT_REPO: &str = "SmilingWolf/wd-vit-tagger-v3";

/// Maps short model names to artifact repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTable {
    models: IndexMap<String, String>,
}

impl Default for ModelTable {
    fn default() -> Self {
        let models = [
            ("swinv3", "SmilingWolf/wd-swinv2-tagger-v3"),
            (DEFAULT_MODEL, DEFAULT_REPO),
            ("vitv3-large", "SmilingWolf/wd-vit-large-tagger-v3"),
            ("convnextv3", "SmilingWolf/wd-convnext-tagger-v3"),
        ]
        .into_iter()
        .map(|(name, repo)| (name.to_string(), repo.to_string()))
        .collect();
        Self { models }
    }
}

impl ModelTable {
    /// Adds or replaces the repository for `name`.
    pub fn insert(&mut self, name: &str, repo_id: &str) {
        self.models.insert(name.to_string(), repo_id.to_string());
    }

    /// Looks up `name` as given, then lower-cased.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.models
            .get(name)
            .or_else(|| self.models.get(&name.to_lowercase()))
            .map(String::as_str)
    }

    /// Resolves `name`, falling back to the default model.
    pub fn resolve(&self, name: &str) -> &str {
        self.get(name)
            .or_else(|| self.get(DEFAULT_MODEL))
            .unwrap_or(DEFAULT_REPO)
    }

    /// Known model names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

/// Everything needed to caption one image.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionRequest {
    pub image_path: PathBuf,
    pub model_name: String,
    pub include_general: bool,
    pub include_rating: bool,
    pub include_character: bool,
    pub general_threshold: f32,
    pub character_threshold: f32,
    pub general_mcut: bool,
    pub character_mcut: bool,
}

impl CaptionRequest {
    /// A request with the labeling tool's defaults.
    pub fn new<P: Into<PathBuf>>(image_path: P) -> Self {
        Self {
            image_path: image_path.into(),
            model_name: DEFAULT_MODEL.to_string(),
            include_general: true,
            include_rating: true,
            include_character: true,
            general_threshold: 0.35,
            character_threshold: 0.85,
            general_mcut: false,
            character_mcut: false,
        }
    }

    /// Per-category filters for the selector.
    pub fn select_options(&self) -> SelectOptions {
        SelectOptions {
            general: CategoryFilter {
                threshold: self.general_threshold,
                mcut: self.general_mcut,
            },
            character: CategoryFilter {
                threshold: self.character_threshold,
                mcut: self.character_mcut,
            },
        }
    }

    /// Joins the requested sections of `selection`, skipping empty ones.
    pub fn assemble(&self, selection: &Selection) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);
        if self.include_character {
            parts.push(selection.character.keys().join(", "));
        }
        if self.include_general {
            parts.push(selection.general_caption.clone());
        }
        if self.include_rating {
            if let Some(rating) = selection.top_rating() {
                parts.push(rating.to_string());
            }
        }
        parts.retain(|p| !p.is_empty());
        parts.join(", ")
    }
}

/// The model currently held by a `Tagger`.
pub struct LoadedModel {
    pub repo_id: String,
    pub vocabulary: TagVocabulary,
    classifier: Box<dyn Classifier>,
}

impl LoadedModel {
    /// Square input side expected by the classifier.
    pub fn input_size(&self) -> u32 {
        self.classifier.input_size()
    }
}

/// Captions images with WD tagger models.
pub struct Tagger {
    models: ModelTable,
    store: Box<dyn ArtifactStore>,
    loader: Box<dyn ClassifierLoader>,
    loaded: Option<LoadedModel>,
}

impl Tagger {
    /// A tagger with the default model table and no model loaded.
    pub fn new(store: Box<dyn ArtifactStore>, loader: Box<dyn ClassifierLoader>) -> Self {
        Self {
            models: ModelTable::default(),
            store,
            loader,
            loaded: None,
        }
    }

    /// A tagger downloading models from the Hugging Face Hub and running them with ONNX Runtime.
    pub fn from_hub() -> Result<Self> {
        Ok(Self::new(Box::new(HubStore::new()?), Box::new(OnnxLoader::default())))
    }

    /// Replaces the model table.
    pub fn with_models(mut self, models: ModelTable) -> Self {
        self.models = models;
        self
    }

    /// The model table used to resolve request names.
    pub fn models(&self) -> &ModelTable {
        &self.models
    }

    /// The model currently held, if any.
    pub fn loaded(&self) -> Option<&LoadedModel> {
        self.loaded.as_ref()
    }

    /// Makes `repo_id` the loaded model, reusing the current one when it matches.
    pub fn load_model(&mut self, repo_id: &str) -> Result<&mut LoadedModel> {
        let cached = matches!(&self.loaded, Some(model) if model.repo_id == repo_id);
        if !cached {
            if let Some(previous) = &self.loaded {
                tracing::info!("Switching model from {} to {}", previous.repo_id, repo_id);
            }
            // Drop the old session before opening the next one.
            self.loaded = None;

            tracing::info!("Loading model {}", repo_id);
            let artifacts = self.store.fetch(repo_id)?;
            let vocabulary = TagVocabulary::load(&artifacts.vocabulary)?;
            let classifier = self.loader.load(&artifacts.weights)?;
            tracing::info!(
                "Model {} ready ({} tags, input {}px)",
                repo_id,
                vocabulary.len(),
                classifier.input_size()
            );

            return Ok(self.loaded.insert(LoadedModel {
                repo_id: repo_id.to_string(),
                vocabulary,
                classifier,
            }));
        }

        self.loaded
            .as_mut()
            .ok_or_else(|| TaggerError::inference("No model loaded"))
    }

    /// Runs the model on the request's image and selects tags, without assembling a caption.
    pub fn predict(&mut self, request: &CaptionRequest) -> Result<Selection> {
        let repo_id = self.models.resolve(&request.model_name).to_string();
        let model = self.load_model(&repo_id)?;

        let preprocessor = ImagePreprocessor::new(model.input_size());
        let tensor = preprocessor.prepare(&request.image_path)?;
        tracing::debug!("Running {} on {}", repo_id, request.image_path.display());

        let probs = model.classifier.predict(tensor)?;
        selector::select(&probs, &model.vocabulary, &request.select_options())
    }

    /// Captions one image.
    pub fn tag_image(&mut self, request: &CaptionRequest) -> Result<String> {
        let selection = self.predict(request)?;
        Ok(request.assemble(&selection))
    }
}
