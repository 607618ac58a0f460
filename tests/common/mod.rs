//! Deterministic stand-ins for the pretrained network.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imagepair::{
    Analyzer, ClassificationModel, ClassifierAdapter, EmbeddingExtractor, FeatureModel,
    ImageNormalizer, NormalizedTensor, Pooling, Result, Vocabulary,
};
use ndarray::{ArrayD, Axis, IxDyn};

pub const LABELS: [&str; 3] = ["red", "green", "blue"];

fn channel_means(input: &NormalizedTensor) -> [f32; 3] {
    let view = input.view();
    let mut means = [0.0; 3];
    for (c, mean) in means.iter_mut().enumerate() {
        *mean = view.index_axis(Axis(3), c).mean().unwrap_or(0.0);
    }
    means
}

/// Probability proportional to how strongly each channel is present.
pub struct ColorClassifier {
    vocabulary: Vocabulary,
}

impl ColorClassifier {
    pub fn new() -> Self {
        Self {
            vocabulary: Vocabulary::new(LABELS).unwrap(),
        }
    }
}

impl ClassificationModel for ColorClassifier {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>> {
        let weights: Vec<f32> = channel_means(input).iter().map(|m| m + 1.0 + 1e-3).collect();
        let total: f32 = weights.iter().sum();
        Ok(weights.iter().map(|w| w / total).collect())
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }
}

/// A 1x6x2x2 activation map: per-quadrant channel means and their squares.
pub struct QuadrantFeatures;

impl FeatureModel for QuadrantFeatures {
    fn activations(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>> {
        let view = input.view();
        let half = view.shape()[1] / 2;
        let mut map: ArrayD<f32> = ArrayD::zeros(IxDyn(&[1, 6, 2, 2]));

        for qy in 0..2 {
            for qx in 0..2 {
                let quadrant = view.slice(ndarray::s![
                    0,
                    qy * half..(qy + 1) * half,
                    qx * half..(qx + 1) * half,
                    ..
                ]);
                for c in 0..3 {
                    let mean = quadrant.index_axis(Axis(2), c).mean().unwrap_or(0.0) + 1.5;
                    map[IxDyn(&[0, c, qy, qx])] = mean;
                    map[IxDyn(&[0, c + 3, qy, qx])] = mean * mean;
                }
            }
        }

        Ok(map)
    }
}

/// Channel count depends on image brightness, so two images can disagree.
pub struct UnstableFeatures;

impl FeatureModel for UnstableFeatures {
    fn activations(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>> {
        let means = channel_means(input);
        let channels = if means.iter().sum::<f32>() > 0.0 { 4 } else { 3 };
        Ok(ArrayD::from_elem(IxDyn(&[1, channels, 1, 1]), 1.0))
    }
}

/// Wraps a model and keeps a copy of every tensor it is handed.
pub struct Recording<M> {
    inner: M,
    seen: Mutex<Vec<Vec<f32>>>,
}

impl<M> Recording<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Vec<f32>> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, input: &NormalizedTensor) {
        self.seen.lock().unwrap().push(input.to_vec());
    }
}

impl<M: ClassificationModel> ClassificationModel for Recording<M> {
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>> {
        self.record(input);
        self.inner.predict(input)
    }

    fn vocabulary(&self) -> &Vocabulary {
        self.inner.vocabulary()
    }
}

impl<M: FeatureModel> FeatureModel for Recording<M> {
    fn activations(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>> {
        self.record(input);
        self.inner.activations(input)
    }
}

pub fn analyzer_with(features: Arc<dyn FeatureModel>) -> Analyzer {
    Analyzer::new(
        ImageNormalizer::default(),
        ClassifierAdapter::new(Arc::new(ColorClassifier::new())),
        EmbeddingExtractor::new(features, Pooling::default()),
    )
}

pub fn analyzer() -> Analyzer {
    analyzer_with(Arc::new(QuadrantFeatures))
}

pub fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([
            (x as f32 * 255.0 / width as f32) as u8,
            (y as f32 * 255.0 / height as f32) as u8,
            128,
        ]);
    }
    DynamicImage::ImageRgb8(img)
}

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
    buffer.into_inner()
}
