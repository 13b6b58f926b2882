//! This module provides the classifier side of the tagger: running a model on
//! a preprocessed image tensor and returning one probability per tag.
//!
//! It includes functionality for:
//! - Selecting execution providers (e.g., CPU, CUDA) for ONNX Runtime.
//! - Loading ONNX tagger models and reading their declared input size.
//! - Running single-image predictions.
//!
//! The `Classifier` and `ClassifierLoader` traits keep the rest of the crate
//! independent of the inference runtime.

use std::path::Path;

use ndarray::{Array, Axis, Ix4};
use ort::{execution_providers::CPUExecutionProvider, session::Session, value::Tensor};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;

#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;

use crate::error::{Result, TaggerError};

/// Represents the execution device for the ONNX model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    /// Use the CPU for inference.
    Cpu,
    /// Use the CUDA execution provider.
    #[cfg(feature = "cuda")]
    Cuda(i32),
    /// Use the TensorRT execution provider.
    #[cfg(feature = "tensorrt")]
    TensorRT(i32),
    /// Use the CoreML execution provider (for macOS).
    #[cfg(feature = "coreml")]
    CoreML,
}

impl Device {
    pub fn cpu() -> Vec<Self> {
        vec![Self::Cpu]
    }

    #[cfg(feature = "cuda")]
    pub fn cuda_devices(device_ids: Vec<i32>) -> Vec<Self> {
        device_ids.into_iter().map(Self::Cuda).collect()
    }

    #[cfg(feature = "tensorrt")]
    pub fn tensorrt_devices(device_ids: Vec<i32>) -> Vec<Self> {
        device_ids.into_iter().map(Self::TensorRT).collect()
    }

    #[cfg(feature = "coreml")]
    pub fn coreml() -> Vec<Self> {
        vec![Self::CoreML]
    }
}

/// Initializes the ONNX Runtime environment with a list of execution providers.
///
/// Call once before loading any `OnnxClassifier`. Without it, sessions run
/// on the default CPU provider.
pub fn init(devices: Vec<Device>) -> Result<()> {
    let mut providers = Vec::new();
    for device in devices {
        let provider = match device {
            Device::Cpu => CPUExecutionProvider::default().build(),
            #[cfg(feature = "cuda")]
            Device::Cuda(device_id) => CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            #[cfg(feature = "tensorrt")]
            Device::TensorRT(device_id) => TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            #[cfg(feature = "coreml")]
            Device::CoreML => CoreMLExecutionProvider::default().build(),
        };
        providers.push(provider);
    }

    ort::init().with_execution_providers(providers).commit()?;
    Ok(())
}

/// A multi-label image classifier.
pub trait Classifier: Send {
    /// Side length of the square input the classifier expects.
    fn input_size(&self) -> u32;

    /// Runs one forward pass on a `[1, size, size, 3]` tensor.
    fn predict(&mut self, input: Array<f32, Ix4>) -> Result<Vec<f32>>;
}

/// Opens a classifier from its weights file.
pub trait ClassifierLoader: Send {
    fn load(&self, weights: &Path) -> Result<Box<dyn Classifier>>;
}

/// A wrapper around an ONNX Runtime session for a tagger model.
#[derive(Debug)]
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output_name: String,
    input_size: u32,
}

impl OnnxClassifier {
    /// Loads a model from a local `.onnx` file using `threads` intra-op threads.
    pub fn load<P: AsRef<Path>>(model_path: P, threads: usize) -> Result<Self> {
        let session = Session::builder()
            .and_then(|b| b.with_inter_threads(1))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path.as_ref()))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| TaggerError::inference("Model has no inputs"))?;
        let shape: Vec<i64> = input
            .input_type
            .tensor_shape()
            .ok_or_else(|| TaggerError::inference("Model input is not a tensor"))?
            .iter()
            .copied()
            .collect();
        let input_size = square_input_size(&shape)?;
        let input_name = input.name.clone();

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| TaggerError::inference("Model has no outputs"))?;

        tracing::debug!(
            "Loaded {} (input {:?} {:?}, output {:?})",
            model_path.as_ref().display(),
            input_name,
            shape,
            output_name
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            input_size,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn predict(&mut self, input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let preds = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;

        preds
            .axis_iter(Axis(0))
            .next()
            .map(|row| row.iter().copied().collect())
            .ok_or_else(|| TaggerError::inference("Model returned an empty batch"))
    }
}

/// Loads `OnnxClassifier`s with a fixed thread budget.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    pub threads: usize,
}

impl Default for OnnxLoader {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
        }
    }
}

impl ClassifierLoader for OnnxLoader {
    fn load(&self, weights: &Path) -> Result<Box<dyn Classifier>> {
        Ok(Box::new(OnnxClassifier::load(weights, self.threads)?))
    }
}

/// Reads the side length from an NHWC input shape `[batch, height, width, 3]`.
pub fn square_input_size(shape: &[i64]) -> Result<u32> {
    match shape {
        [_, height, width, _] if height == width && *height > 0 => u32::try_from(*height)
            .map_err(|_| TaggerError::inference(format!("Input size {} out of range", height))),
        [_, height, width, _] => Err(TaggerError::inference(format!(
            "Model input must be square, got {}x{}",
            height, width
        ))),
        _ => Err(TaggerError::inference(format!(
            "Unexpected model input shape {:?}",
            shape
        ))),
    }
}
