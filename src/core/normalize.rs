use std::str::FromStr;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

use crate::error::{AppError, Result};

/// Side length of the square network input.
pub const INPUT_SIZE: u32 = 224;
/// Number of colour channels in the network input.
pub const INPUT_CHANNELS: usize = 3;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode raw bytes into an image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(AppError::InvalidImage("empty input".to_string()));
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Per-pixel transform matching the distribution the network was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelScaling {
    /// `x / 127.5 - 1`, mapping every channel into `[-1, 1]` (MobileNet "tf" mode).
    #[default]
    Symmetric,
    /// `(x / 255 - mean) / std` with the ImageNet channel statistics.
    ImageNet,
}

impl PixelScaling {
    fn apply(self, value: u8, channel: usize) -> f32 {
        match self {
            Self::Symmetric => value as f32 / 127.5 - 1.0,
            Self::ImageNet => {
                (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
        }
    }
}

impl FromStr for PixelScaling {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symmetric" | "tf" => Ok(Self::Symmetric),
            "imagenet" | "torch" => Ok(Self::ImageNet),
            other => Err(AppError::Config(format!("unknown pixel scaling '{}'", other))),
        }
    }
}

/// A single-image batch laid out as `[1, height, width, channel]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Borrow the array.
    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Values in row-major order, channel fastest.
    pub fn iter(&self) -> impl Iterator<Item = &f32> + '_ {
        self.data.iter()
    }

    /// Copy the values out in row-major order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Turns arbitrary images into network input tensors.
///
/// One normalizer is shared by the classification and embedding paths, so
/// both always see identically prepared input.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    scaling: PixelScaling,
    filter: FilterType,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(PixelScaling::default())
    }
}

impl ImageNormalizer {
    /// Create a normalizer using bicubic resampling and the given pixel transform.
    pub fn new(scaling: PixelScaling) -> Self {
        Self {
            scaling,
            filter: FilterType::CatmullRom,
        }
    }

    /// The pixel transform this normalizer applies.
    pub fn scaling(&self) -> PixelScaling {
        self.scaling
    }

    /// Resize to 224x224, convert to RGB and scale each channel.
    pub fn normalize(&self, img: &DynamicImage) -> Result<NormalizedTensor> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(AppError::InvalidImage(format!(
                "cannot resample a {}x{} image",
                width, height
            )));
        }

        let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, self.filter);
        let rgb = resized.to_rgb8();

        let side = INPUT_SIZE as usize;
        let scaling = self.scaling;
        let data = Array4::from_shape_fn((1, side, side, INPUT_CHANNELS), |(_, y, x, c)| {
            scaling.apply(rgb.get_pixel(x as u32, y as u32)[c], c)
        });

        Ok(NormalizedTensor { data })
    }

    /// Decode bytes and normalize the result.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<NormalizedTensor> {
        let img = decode_image(bytes)?;
        self.normalize(&img)
    }
}
