use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::analysis::Analyzer;
use crate::core::embeddings::Pooling;
use crate::core::normalize::PixelScaling;
use crate::error::{AppError, Result};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_upload_size: usize,
    /// TorchScript export of the full classification network
    pub classifier_model: PathBuf,
    /// TorchScript export of the headless network
    pub embedding_model: PathBuf,
    /// Label table for the classifier (`.json` class index or one label per line)
    pub labels: PathBuf,
    /// Pixel transform the networks were trained with
    pub pixel_scaling: PixelScaling,
    /// Apply softmax to classifier output (for modules that return logits)
    pub apply_softmax: bool,
    /// Expected embedding length, checked on every image when set
    pub embedding_dim: Option<usize>,
    /// How the headless network's activation map is reduced to a vector
    pub pooling: Pooling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            max_upload_size: 16 * 1024 * 1024, // 16MB
            classifier_model: PathBuf::from("models/mobilenet_v2.pt"),
            embedding_model: PathBuf::from("models/mobilenet_v2_headless.pt"),
            labels: PathBuf::from("models/imagenet_class_index.json"),
            // torchvision exports: mean/std inputs, logits out
            pixel_scaling: PixelScaling::ImageNet,
            apply_softmax: true,
            embedding_dim: None,
            pooling: Pooling::default(),
        }
    }
}

fn env_value<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(AppError::Config(format!("{}: {}", key, e))),
    }
}

impl Config {
    /// Defaults overridden by `IMAGEPAIR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_value("IMAGEPAIR_HOST")? {
            config.host = host;
        }
        if let Some(port) = env_value("IMAGEPAIR_PORT")? {
            config.port = port;
        }
        if let Some(size) = env_value("IMAGEPAIR_MAX_UPLOAD_SIZE")? {
            config.max_upload_size = size;
        }
        if let Some(path) = env_value("IMAGEPAIR_CLASSIFIER_MODEL")? {
            config.classifier_model = path;
        }
        if let Some(path) = env_value("IMAGEPAIR_EMBEDDING_MODEL")? {
            config.embedding_model = path;
        }
        if let Some(path) = env_value("IMAGEPAIR_LABELS")? {
            config.labels = path;
        }
        if let Some(scaling) = env_value("IMAGEPAIR_PIXEL_SCALING")? {
            config.pixel_scaling = scaling;
        }
        if let Some(apply) = env_value("IMAGEPAIR_APPLY_SOFTMAX")? {
            config.apply_softmax = apply;
        }
        config.embedding_dim = env_value("IMAGEPAIR_EMBEDDING_DIM")?;
        if let Some(pooling) = env_value("IMAGEPAIR_POOLING")? {
            config.pooling = pooling;
        }

        if config.max_upload_size == 0 {
            return Err(AppError::Config("IMAGEPAIR_MAX_UPLOAD_SIZE must be positive".to_string()));
        }

        Ok(config)
    }

    /// Socket address the server binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Application state that can be shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Shared analysis pipeline; its models are loaded once and never mutated
    pub analyzer: Arc<Analyzer>,
    /// When the state was created
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create the shared state around an already loaded analyzer
    pub fn new(config: Config, analyzer: Analyzer) -> Arc<Self> {
        Arc::new(Self {
            config,
            analyzer: Arc::new(analyzer),
            started_at: Utc::now(),
        })
    }
}
