use serde::{Deserialize, Serialize};

/// Top-1 classification of a single image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LabelResult {
    /// Human-readable label from the model vocabulary.
    pub label: String,
    /// Raw probability the model assigned to `label`, in `[0, 1]`.
    pub confidence: f32,
}

/// Similarity verdict between two images.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimilarityResult {
    /// Cosine similarity of the two feature vectors, in `[-1, 1]`.
    #[serde(rename = "similarity_score")]
    pub score: f64,
    /// Sentence describing the score and both labels.
    pub analysis: String,
}

/// Result of analysing a pair of images.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Classification of the first image.
    pub image1_result: LabelResult,
    /// Classification of the second image.
    pub image2_result: LabelResult,
    /// Similarity between the two images.
    pub comparison: SimilarityResult,
}

impl AnalysisResult {
    /// Serializes the result to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
