//! TorchScript implementations of the classification and headless models.

use std::path::Path;
use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use tch::{CModule, Device, Kind, Tensor};

use crate::core::inference::{ClassificationModel, FeatureModel, Vocabulary};
use crate::core::normalize::{NormalizedTensor, INPUT_CHANNELS, INPUT_SIZE};
use crate::error::{AppError, Result};

/// A loaded TorchScript module.
///
/// Calls into a module are serialized by a lock owned by the module itself,
/// so the classifier and the embedder never wait on each other.
struct TorchModule {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchModule {
    fn load(path: &Path) -> Result<Self> {
        let device = Device::cuda_if_available();
        let mut module = CModule::load_on_device(path, device).map_err(|e| {
            AppError::Config(format!("cannot load model {}: {}", path.display(), e))
        })?;
        module.set_eval();
        log::info!("Loaded {} on {:?}", path.display(), device);

        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }

    /// Forward pass; the result is a float tensor on the CPU.
    fn forward(&self, input: &NormalizedTensor) -> Result<Tensor> {
        let side = INPUT_SIZE as i64;
        let input = Tensor::of_slice(&input.to_vec())
            .reshape(&[1, side, side, INPUT_CHANNELS as i64])
            .permute(&[0, 3, 1, 2])
            .contiguous()
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| AppError::InferenceFailure("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[input]))?;

        Ok(output.to_kind(Kind::Float).to_device(Device::Cpu))
    }
}

fn to_array(tensor: &Tensor) -> Result<ArrayD<f32>> {
    let shape: Vec<usize> = tensor.size().iter().map(|&d| d as usize).collect();
    let numel = tensor.numel();
    let mut data = vec![0f32; numel];
    tensor.f_copy_data(&mut data, numel)?;

    ArrayD::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| AppError::InferenceFailure(format!("unexpected output shape: {}", e)))
}

/// Full network with its classification head.
pub struct TorchClassifier {
    inner: TorchModule,
    vocabulary: Vocabulary,
    apply_softmax: bool,
}

impl TorchClassifier {
    /// Load a TorchScript classifier.
    ///
    /// Set `apply_softmax` when the exported module returns logits.
    pub fn load<P: AsRef<Path>>(path: P, vocabulary: Vocabulary, apply_softmax: bool) -> Result<Self> {
        Ok(Self {
            inner: TorchModule::load(path.as_ref())?,
            vocabulary,
            apply_softmax,
        })
    }
}

impl std::fmt::Debug for TorchClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorchClassifier")
            .field("device", &self.inner.device)
            .field("classes", &self.vocabulary.len())
            .field("apply_softmax", &self.apply_softmax)
            .finish()
    }
}

impl ClassificationModel for TorchClassifier {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>> {
        let mut output = self.inner.forward(input)?;
        if self.apply_softmax {
            output = output.softmax(-1, Kind::Float);
        }
        let scores = to_array(&output)?;
        Ok(scores.iter().copied().collect())
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// Network without its classification head.
pub struct TorchEmbedder {
    inner: TorchModule,
}

impl TorchEmbedder {
    /// Load a headless TorchScript module.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: TorchModule::load(path.as_ref())?,
        })
    }
}

impl std::fmt::Debug for TorchEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorchEmbedder")
            .field("device", &self.inner.device)
            .finish()
    }
}

impl FeatureModel for TorchEmbedder {
    fn activations(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>> {
        let output = self.inner.forward(input)?;
        to_array(&output)
    }
}
