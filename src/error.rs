//! # Error Handling
//!
//! This module defines the error type for the `wdcap` library.
//!
//! Every failure inside a tagging request surfaces as a `TaggerError` carrying
//! the error kind and the underlying message, so a front end can show it to a
//! human without further context. Nothing is retried inside the library; the
//! first failure aborts the request and no caption is produced.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaggerError {
    /// The model repository could not be fetched (unknown repository or no network).
    #[error("Model artifacts unavailable for {repo_id}: {message}")]
    ArtifactUnavailable { repo_id: String, message: String },

    /// The tag vocabulary file is missing required columns or has bad rows.
    #[error("Malformed tag vocabulary {path}: {message}")]
    MalformedVocabulary { path: PathBuf, message: String },

    /// The input file could not be decoded as an image.
    #[error("Failed to decode image {path}: {message}")]
    ImageDecode { path: PathBuf, message: String },

    /// The inference runtime failed or produced an unexpected shape.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaggerError {
    pub(crate) fn artifact(repo_id: &str, message: impl ToString) -> Self {
        Self::ArtifactUnavailable {
            repo_id: repo_id.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn vocabulary(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::MalformedVocabulary {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn inference(message: impl ToString) -> Self {
        Self::InferenceFailed(message.to_string())
    }
}

impl From<ort::Error> for TaggerError {
    fn from(e: ort::Error) -> Self {
        Self::InferenceFailed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaggerError>;
