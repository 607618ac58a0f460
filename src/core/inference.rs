//! Contract of the pretrained network the pipeline runs against.
//!
//! The network is loaded once at startup and shared read-only between
//! requests, so every implementation must be `Send + Sync`. Implementations
//! that cannot be called concurrently guard themselves with their own lock.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::ArrayD;

use crate::core::normalize::NormalizedTensor;
use crate::error::{AppError, Result};

/// Classification mode: image in, probability distribution out.
pub trait ClassificationModel: Send + Sync {
    /// Run the full network and return one probability per vocabulary entry,
    /// in the network's native class order.
    fn predict(&self, input: &NormalizedTensor) -> Result<Vec<f32>>;

    /// Label table the distribution is indexed by.
    fn vocabulary(&self) -> &Vocabulary;
}

/// Headless mode: image in, activation map out.
pub trait FeatureModel: Send + Sync {
    /// Run the network without its classification head.
    ///
    /// The returned map has a leading batch axis of length 1.
    fn activations(&self, input: &NormalizedTensor) -> Result<ArrayD<f32>>;
}

/// Class index to label lookup, fixed when the model is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from labels in class-index order.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(AppError::Config("vocabulary is empty".to_string()));
        }
        Ok(Self { labels })
    }

    /// Parse one label per line. Blank lines are skipped.
    pub fn from_lines(text: &str) -> Result<Self> {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    /// Parse a Keras class index: `{"0": ["n01440764", "tench"], ...}`.
    ///
    /// The human-readable name is the last element of each entry. Indices must
    /// cover `0..n` without gaps.
    pub fn from_class_index_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(text)?;

        let mut indexed = BTreeMap::new();
        for (key, entry) in raw {
            let index: usize = key
                .parse()
                .map_err(|_| AppError::Config(format!("class index '{}' is not a number", key)))?;
            let name = entry
                .last()
                .ok_or_else(|| AppError::Config(format!("class {} has no label", index)))?;
            indexed.insert(index, name.clone());
        }

        for (expected, index) in indexed.keys().enumerate() {
            if *index != expected {
                return Err(AppError::Config(format!(
                    "class index is missing entry {}",
                    expected
                )));
            }
        }

        Self::new(indexed.into_values())
    }

    /// Load from a `.json` class index or a plain text label list.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read vocabulary {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let vocabulary = if is_json {
            Self::from_class_index_json(&text).map_err(|e| match e {
                AppError::Json(err) => AppError::Config(format!(
                    "malformed class index {}: {}",
                    path.display(),
                    err
                )),
                other => other,
            })?
        } else {
            Self::from_lines(&text)?
        };

        log::debug!("Loaded {} labels from {}", vocabulary.len(), path.display());
        Ok(vocabulary)
    }

    /// Label for a class index.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the vocabulary has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether `label` belongs to this vocabulary.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
