//! Commonly used types, re-exported for `use wdcap::prelude::*`.

pub use crate::{
    config::TaggerSettings,
    dataset::{caption_path, is_labeled, list_images, read_caption, write_caption},
    error::{Result, TaggerError},
    file::{ArtifactStore, HubStore, LocalStore, ModelArtifacts},
    pipeline::{CaptionRequest, ModelTable, Tagger},
    processor::ImagePreprocessor,
    selector::{Prediction, Selection},
    tagger::{Classifier, ClassifierLoader, Device, OnnxClassifier, OnnxLoader},
    tags::{TagCategory, TagVocabulary},
};
