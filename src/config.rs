use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, TaggerError},
    pipeline::{CaptionRequest, DEFAULT_MODEL},
};

/// Persisted defaults for captioning requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerSettings {
    pub model: String,
    pub general: bool,
    pub rating: bool,
    pub character: bool,
    pub general_threshold: f32,
    pub character_threshold: f32,
    pub general_mcut: bool,
    pub character_mcut: bool,
    /// Hub cache directory; the hub default is used when unset.
    pub cache_dir: Option<PathBuf>,
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            general: true,
            rating: true,
            character: true,
            general_threshold: 0.35,
            character_threshold: 0.85,
            general_mcut: false,
            character_mcut: false,
            cache_dir: None,
        }
    }
}

impl TaggerSettings {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let json = fs::read_to_string(config_path)?;
        let settings: TaggerSettings =
            serde_json::from_str(&json).map_err(|e| TaggerError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, config_path: P) -> Result<()> {
        self.validate()?;
        let json =
            serde_json::to_string_pretty(self).map_err(|e| TaggerError::Config(e.to_string()))?;
        fs::write(config_path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("general_threshold", self.general_threshold),
            ("character_threshold", self.character_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TaggerError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Builds a request for `image_path` from these settings.
    pub fn request<P: Into<PathBuf>>(&self, image_path: P) -> CaptionRequest {
        CaptionRequest {
            image_path: image_path.into(),
            model_name: self.model.clone(),
            include_general: self.general,
            include_rating: self.rating,
            include_character: self.character,
            general_threshold: self.general_threshold,
            character_threshold: self.character_threshold,
            general_mcut: self.general_mcut,
            character_mcut: self.character_mcut,
        }
    }
}
