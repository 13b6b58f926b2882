//! # wdcap
//!
//! wdcap is a library for captioning images with WD tagger models. It loads a
//! multi-label ONNX classifier, runs it on one image at a time and turns the
//! per-tag probabilities into a comma-separated caption.
//!
//! ## Features
//!
//! - **One entry point**: `Tagger::tag_image` takes a `CaptionRequest` and returns the caption.
//! - **ONNX Runtime**: Powered by `ort`, with optional CUDA, TensorRT and CoreML providers.
//! - **Model cache**: Artifacts come from the Hugging Face Hub (`hf-hub`) or a local directory.
//! - **Tag selection**: Fixed thresholds or adaptive MCut cutoffs per category.
//!
//! ## Modules
//!
//! - `pipeline`: The `Tagger` facade, caption requests and the model table.
//! - `file`: Resolving model repositories to local files.
//! - `tags`: The tag vocabulary and its categories.
//! - `processor`: Turning images into model input tensors.
//! - `tagger`: The classifier abstraction and its ONNX implementation.
//! - `selector`: Thresholding and caption formatting.
//! - `dataset`: Caption files stored next to images.
//! - `config`: Persisted tagging defaults.
//! - `error`: The error type for the library.
//! - `prelude`: A collection of the most commonly used types.

pub mod config;
pub mod dataset;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod prelude;

pub mod processor;
pub mod selector;
pub mod tagger;
pub mod tags;
