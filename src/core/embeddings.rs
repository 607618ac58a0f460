use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array1, ArrayD, Axis};

use crate::core::inference::FeatureModel;
use crate::core::normalize::NormalizedTensor;
use crate::error::{AppError, Result};

/// A pooled embedding, one value per channel of the headless network.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Components in channel order.
    pub fn iter(&self) -> impl Iterator<Item = &f32> + '_ {
        self.0.iter()
    }

    /// Components as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// How an activation map becomes a flat vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Average every axis except batch and `channel_axis`.
    Average {
        /// Axis of the activation map holding channels (batch is axis 0).
        channel_axis: usize,
    },
    /// The network already pools; flatten the map as is.
    Flatten,
}

impl Default for Pooling {
    /// Channels-first maps, as produced by TorchScript exports.
    fn default() -> Self {
        Self::Average { channel_axis: 1 }
    }
}

/// Parses `average`, `average:<axis>` or `flatten`.
impl FromStr for Pooling {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        let (name, axis) = match value.split_once(':') {
            Some((name, axis)) => (name, Some(axis)),
            None => (value.as_str(), None),
        };

        match (name, axis) {
            ("average" | "avg", None) => Ok(Self::default()),
            ("average" | "avg", Some(axis)) => match axis.parse::<usize>() {
                Ok(channel_axis) if channel_axis > 0 => Ok(Self::Average { channel_axis }),
                _ => Err(AppError::Config(format!(
                    "channel axis must be a positive integer, got '{}'",
                    axis
                ))),
            },
            ("flatten", None) => Ok(Self::Flatten),
            _ => Err(AppError::Config(format!("unknown pooling '{}'", value))),
        }
    }
}

/// Runs the network in headless mode and pools the result.
#[derive(Clone)]
pub struct EmbeddingExtractor {
    model: Arc<dyn FeatureModel>,
    pooling: Pooling,
    dimension: Option<usize>,
}

impl std::fmt::Debug for EmbeddingExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingExtractor")
            .field("pooling", &self.pooling)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingExtractor {
    /// Wrap a shared feature model.
    pub fn new(model: Arc<dyn FeatureModel>, pooling: Pooling) -> Self {
        Self {
            model,
            pooling,
            dimension: None,
        }
    }

    /// Require every embedding to have exactly `dimension` components.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Compute the embedding of a normalized image.
    pub fn embed(&self, input: &NormalizedTensor) -> Result<FeatureVector> {
        let activations = self.model.activations(input)?;
        let shape = activations.shape().to_vec();

        let pooled = match self.pooling {
            Pooling::Average { channel_axis } => global_average_pool(activations, channel_axis)?,
            Pooling::Flatten => flatten(activations)?,
        };

        if let Some(expected) = self.dimension {
            if pooled.len() != expected {
                return Err(AppError::DimensionMismatch {
                    left: expected,
                    right: pooled.len(),
                });
            }
        }

        log::debug!("Pooled activation map {:?} into {} features", shape, pooled.len());
        Ok(FeatureVector(pooled.to_vec()))
    }
}

fn check_batch(map: &ArrayD<f32>) -> Result<()> {
    match map.shape().first() {
        Some(1) => Ok(()),
        _ => Err(AppError::InferenceFailure(format!(
            "expected an activation map with batch size 1, got shape {:?}",
            map.shape()
        ))),
    }
}

/// Mean of each channel over all spatial positions.
pub fn global_average_pool(map: ArrayD<f32>, channel_axis: usize) -> Result<Array1<f32>> {
    check_batch(&map)?;
    if channel_axis == 0 || channel_axis >= map.ndim() {
        return Err(AppError::InferenceFailure(format!(
            "channel axis {} is invalid for shape {:?}",
            channel_axis,
            map.shape()
        )));
    }

    let map = map.index_axis_move(Axis(0), 0);
    map.axis_iter(Axis(channel_axis - 1))
        .map(|plane| {
            plane.mean().ok_or_else(|| {
                AppError::InferenceFailure("activation map has no spatial extent".to_string())
            })
        })
        .collect()
}

fn flatten(map: ArrayD<f32>) -> Result<Array1<f32>> {
    check_batch(&map)?;
    if map.is_empty() {
        return Err(AppError::InferenceFailure("empty activation map".to_string()));
    }
    Ok(map.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::ImageNormalizer;
    use image::{DynamicImage, RgbImage};
    use ndarray::IxDyn;

    struct FixedMap(ArrayD<f32>);

    impl FeatureModel for FixedMap {
        fn activations(&self, _input: &NormalizedTensor) -> Result<ArrayD<f32>> {
            Ok(self.0.clone())
        }
    }

    fn tensor() -> NormalizedTensor {
        ImageNormalizer::default()
            .normalize(&DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
            .unwrap()
    }

    fn nchw() -> ArrayD<f32> {
        // Two channels over a 2x2 grid: channel 0 averages 2.5, channel 1 averages 10
        ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 2]), vec![1.0, 2.0, 3.0, 4.0, 10.0, 10.0, 10.0, 10.0])
            .unwrap()
    }

    #[test]
    fn test_average_pool_channels_first() {
        let pooled = global_average_pool(nchw(), 1).unwrap();
        assert_eq!(pooled.to_vec(), vec![2.5, 10.0]);
    }

    #[test]
    fn test_average_pool_channels_last() {
        let nhwc = ArrayD::from_shape_vec(IxDyn(&[1, 2, 1, 3]), vec![1.0, 2.0, 3.0, 3.0, 4.0, 5.0])
            .unwrap();
        let pooled = global_average_pool(nhwc, 3).unwrap();
        assert_eq!(pooled.to_vec(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_malformed_maps() {
        let batch_of_two = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 1, 1]));
        assert!(matches!(
            global_average_pool(batch_of_two, 1),
            Err(AppError::InferenceFailure(_))
        ));
        assert!(matches!(global_average_pool(nchw(), 0), Err(AppError::InferenceFailure(_))));
        assert!(matches!(global_average_pool(nchw(), 4), Err(AppError::InferenceFailure(_))));

        let no_spatial = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 0, 0]));
        assert!(matches!(
            global_average_pool(no_spatial, 1),
            Err(AppError::InferenceFailure(_))
        ));
    }

    #[test]
    fn test_flatten_prepooled_output() {
        let map = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![0.5, 0.0, 1.5, 2.0]).unwrap();
        let extractor = EmbeddingExtractor::new(Arc::new(FixedMap(map)), Pooling::Flatten);
        let features = extractor.embed(&tensor()).unwrap();
        assert_eq!(features.iter().copied().collect::<Vec<_>>(), vec![0.5, 0.0, 1.5, 2.0]);
    }

    #[test]
    fn test_expected_dimension() {
        let extractor =
            EmbeddingExtractor::new(Arc::new(FixedMap(nchw())), Pooling::default()).with_dimension(2);
        assert_eq!(extractor.embed(&tensor()).unwrap().len(), 2);

        let extractor =
            EmbeddingExtractor::new(Arc::new(FixedMap(nchw())), Pooling::default()).with_dimension(1280);
        assert!(matches!(
            extractor.embed(&tensor()),
            Err(AppError::DimensionMismatch { left: 1280, right: 2 })
        ));
    }

    #[test]
    fn test_pooling_from_str() {
        assert_eq!("average".parse::<Pooling>().unwrap(), Pooling::default());
        assert_eq!(
            " AVG:3 ".parse::<Pooling>().unwrap(),
            Pooling::Average { channel_axis: 3 }
        );
        assert_eq!("flatten".parse::<Pooling>().unwrap(), Pooling::Flatten);

        for bad in ["max", "average:0", "average:x", "flatten:1"] {
            assert!(matches!(bad.parse::<Pooling>(), Err(AppError::Config(_))));
        }
    }
}
