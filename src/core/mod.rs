//! Core image analysis pipeline

/// Composes normalization, classification and similarity per request.
pub mod analysis;
/// Top-1 decoding of classification output.
pub mod classifier;
/// Pooled feature vectors from the headless network.
pub mod embeddings;
/// Contract of the pretrained network and its label table.
pub mod inference;
/// Image decoding and input tensor preparation.
pub mod normalize;
/// Cosine similarity and the similarity verdict.
pub mod similarity;
/// TorchScript backend for the inference traits.
#[cfg(feature = "torch")]
pub mod torch;
