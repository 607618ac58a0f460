#![doc(html_root_url = "https://docs.rs/imagepair/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # ImagePair
//!
//! Image classification and pairwise visual similarity on top of a
//! pretrained convolutional network.
//!
//! ## Features
//!
//! - **Classification**: top-1 label and confidence for any decodable image
//! - **Comparison**: cosine similarity of pooled embeddings, with a short verdict
//! - **Deterministic preprocessing**: one normalizer shared by both inference paths
//! - **Web API**: multipart endpoints for one or two images
//! - **TorchScript backend**: behind the `torch` feature
//!
//! ## Quick Start
//!
//! Basic usage with the TorchScript backend:
//! ```rust,ignore
//! use imagepair::{load_analyzer, Config, Result};
//!
//! fn main() -> Result<()> {
//!     let analyzer = load_analyzer(&Config::default())?;
//!     let first = image::open("wolf.jpg")?;
//!     let second = image::open("husky.jpg")?;
//!     let result = analyzer.compare_two(&first, &second)?;
//!     println!("{}", result.comparison.analysis);
//!     Ok(())
//! }
//! ```

// Internal modules
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;

#[allow(dead_code, missing_docs, unreachable_pub)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        analysis::Analyzer,
        classifier::ClassifierAdapter,
        embeddings::{EmbeddingExtractor, FeatureVector, Pooling},
        inference::{ClassificationModel, FeatureModel, Vocabulary},
        normalize::{decode_image, ImageNormalizer, NormalizedTensor, PixelScaling},
        similarity::{cosine_similarity, SIMILARITY_THRESHOLD},
    },
    error::{AppError, Result},
    models::results::{AnalysisResult, LabelResult, SimilarityResult},
    state::{AppState, Config},
};

#[cfg(feature = "web")]
pub use crate::api::{classify, create_router, health_check, predict};

#[cfg(feature = "torch")]
pub use crate::core::torch::{TorchClassifier, TorchEmbedder};

/// Initialize the application with default settings
///
/// Loads a `.env` file when present and sets up logging. It should be called
/// early in the application startup process.
///
/// # Errors
///
/// Returns an error if logging initialization fails.
///
/// # Example
///
/// ```no_run
/// use imagepair::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    // Initialize logging with sensible defaults
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger already initialized: {}", e)))?;

    if dotenv_loaded {
        log::debug!("Loaded environment from .env");
    }
    log::info!("Initializing ImagePair {}", built_info::PKG_VERSION);
    Ok(())
}

/// Build the analysis pipeline from the models named in `config`
///
/// Both networks and the label table are loaded here, once. The returned
/// analyzer is meant to be shared for the lifetime of the process.
///
/// # Errors
///
/// Returns a configuration error if a model or the vocabulary cannot be loaded.
#[cfg(feature = "torch")]
pub fn load_analyzer(config: &Config) -> Result<Analyzer> {
    use std::sync::Arc;

    let vocabulary = Vocabulary::from_path(&config.labels)?;
    let classifier = TorchClassifier::load(&config.classifier_model, vocabulary, config.apply_softmax)?;
    let embedder = TorchEmbedder::load(&config.embedding_model)?;

    let mut extractor = EmbeddingExtractor::new(Arc::new(embedder), config.pooling);
    if let Some(dimension) = config.embedding_dim {
        extractor = extractor.with_dimension(dimension);
    }

    Ok(Analyzer::new(
        ImageNormalizer::new(config.pixel_scaling),
        ClassifierAdapter::new(Arc::new(classifier)),
        extractor,
    ))
}

/// Build the analysis pipeline from the models named in `config`
///
/// # Errors
///
/// Always fails: this build has no inference backend. Enable the `torch` feature.
#[cfg(not(feature = "torch"))]
pub fn load_analyzer(_config: &Config) -> Result<Analyzer> {
    Err(AppError::Config(
        "no inference backend compiled in; rebuild with `--features torch`".to_string(),
    ))
}
