use image::DynamicImage;

use crate::core::classifier::ClassifierAdapter;
use crate::core::embeddings::EmbeddingExtractor;
use crate::core::normalize::{decode_image, ImageNormalizer};
use crate::core::similarity;
use crate::error::Result;
use crate::models::results::{AnalysisResult, LabelResult};

/// Classifies single images and compares pairs of images.
///
/// The analyzer holds no per-request state. The models behind it are shared
/// and read-only, so one instance can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct Analyzer {
    normalizer: ImageNormalizer,
    classifier: ClassifierAdapter,
    extractor: EmbeddingExtractor,
}

impl Analyzer {
    /// Assemble an analyzer. The normalizer feeds both the classifier and the extractor.
    pub fn new(
        normalizer: ImageNormalizer,
        classifier: ClassifierAdapter,
        extractor: EmbeddingExtractor,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            extractor,
        }
    }

    /// The classification adapter.
    pub fn classifier(&self) -> &ClassifierAdapter {
        &self.classifier
    }

    /// Top-1 label of a single image.
    pub fn classify_one(&self, img: &DynamicImage) -> Result<LabelResult> {
        let tensor = self.normalizer.normalize(img)?;
        self.classifier.classify(&tensor)
    }

    /// Labels for both images plus their similarity.
    ///
    /// Any failure aborts the whole comparison.
    pub fn compare_two(&self, first: &DynamicImage, second: &DynamicImage) -> Result<AnalysisResult> {
        self.run_comparison(first, second).map_err(|e| {
            if e.is_invariant_violation() {
                log::error!("Embedding pipeline invariant violated: {}", e);
            }
            e
        })
    }

    fn run_comparison(&self, first: &DynamicImage, second: &DynamicImage) -> Result<AnalysisResult> {
        let first_tensor = self.normalizer.normalize(first)?;
        let second_tensor = self.normalizer.normalize(second)?;

        let image1_result = self.classifier.classify(&first_tensor)?;
        let image2_result = self.classifier.classify(&second_tensor)?;

        let first_features = self.extractor.embed(&first_tensor)?;
        let second_features = self.extractor.embed(&second_tensor)?;

        let comparison = similarity::compare(
            &image1_result.label,
            &image2_result.label,
            &first_features,
            &second_features,
        )?;
        log::debug!("Similarity score {:.4}", comparison.score);

        Ok(AnalysisResult {
            image1_result,
            image2_result,
            comparison,
        })
    }

    /// Decode and classify raw image bytes.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<LabelResult> {
        let img = decode_image(bytes)?;
        self.classify_one(&img)
    }

    /// Decode and compare two raw images.
    pub fn compare_bytes(&self, first: &[u8], second: &[u8]) -> Result<AnalysisResult> {
        let first = decode_image(first)?;
        let second = decode_image(second)?;
        self.compare_two(&first, &second)
    }
}
