use crate::core::embeddings::FeatureVector;
use crate::error::{AppError, Result};
use crate::models::results::SimilarityResult;

/// Scores strictly above this count as visually similar.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Cosine similarity of two equal-length vectors, clamped to `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(AppError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    for (name, norm) in [("first", norm_a), ("second", norm_b)] {
        if !norm.is_finite() {
            return Err(AppError::DegenerateVector(format!("{} vector is not finite", name)));
        }
        if norm == 0.0 {
            return Err(AppError::DegenerateVector(format!("{} vector has zero norm", name)));
        }
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Sentence summarising a similarity score and the labels of both images.
pub fn describe(label_a: &str, label_b: &str, score: f64) -> String {
    let mut analysis = format!("The images are {:.2}% similar.", score * 100.0);
    if label_a == label_b && score > SIMILARITY_THRESHOLD {
        analysis.push_str(&format!(" Both are identified as '{}'.", label_a));
    } else if score > SIMILARITY_THRESHOLD {
        analysis.push_str(&format!(
            " They are visually similar, but identified as '{}' and '{}'.",
            label_a, label_b
        ));
    } else {
        analysis.push_str(&format!(
            " They are identified as '{}' and '{}'.",
            label_a, label_b
        ));
    }
    analysis
}

/// Compare two embeddings and describe the result using both labels.
pub fn compare(
    label_a: &str,
    label_b: &str,
    a: &FeatureVector,
    b: &FeatureVector,
) -> Result<SimilarityResult> {
    let score = cosine_similarity(a.as_slice(), b.as_slice())?;

    Ok(SimilarityResult {
        score,
        analysis: describe(label_a, label_b, score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-12);
        assert!((cosine_similarity(&[2.0, 2.0], &[5.0, 5.0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric() {
        let a = [0.3, 1.7, 0.0, 4.2];
        let b = [1.1, 0.2, 3.3, 0.9];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(matches!(
            cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(AppError::DimensionMismatch { left: 3, right: 2 })
        ));

        let a = FeatureVector::from(vec![1.0; 1280]);
        let b = FeatureVector::from(vec![1.0; 1024]);
        assert!(matches!(
            compare("wolf", "wolf", &a, &b),
            Err(AppError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_degenerate_vectors() {
        assert!(matches!(
            cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]),
            Err(AppError::DegenerateVector(_))
        ));
        assert!(matches!(
            cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]),
            Err(AppError::DegenerateVector(_))
        ));
        assert!(matches!(
            cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 2.0]),
            Err(AppError::DegenerateVector(_))
        ));
        assert!(matches!(cosine_similarity(&[], &[]), Err(AppError::DegenerateVector(_))));
    }

    #[test]
    fn test_same_label_above_threshold() {
        assert_eq!(
            describe("wolf", "wolf", 0.95),
            "The images are 95.00% similar. Both are identified as 'wolf'."
        );
    }

    #[test]
    fn test_different_labels_above_threshold() {
        assert_eq!(
            describe("wolf", "fox", 0.85),
            "The images are 85.00% similar. They are visually similar, but identified as 'wolf' and 'fox'."
        );
    }

    #[test]
    fn test_below_threshold() {
        assert_eq!(
            describe("wolf", "car", 0.10),
            "The images are 10.00% similar. They are identified as 'wolf' and 'car'."
        );
        assert_eq!(
            describe("wolf", "wolf", 0.5),
            "The images are 50.00% similar. They are identified as 'wolf' and 'wolf'."
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        // 5x0 against 4x3: dot 20, norms 5 and 5
        let score = cosine_similarity(&[5.0, 0.0], &[4.0, 3.0]).unwrap();
        assert_eq!(score, 0.8);

        assert_eq!(
            describe("wolf", "wolf", score),
            "The images are 80.00% similar. They are identified as 'wolf' and 'wolf'."
        );
        assert_eq!(
            describe("wolf", "fox", score),
            "The images are 80.00% similar. They are identified as 'wolf' and 'fox'."
        );
    }

    #[test]
    fn test_compare_carries_raw_score() {
        let a = FeatureVector::from(vec![5.0, 0.0]);
        let b = FeatureVector::from(vec![4.0, 3.0]);
        let result = compare("wolf", "fox", &a, &b).unwrap();
        assert_eq!(result.score, 0.8);
        assert!(result.analysis.starts_with("The images are 80.00% similar."));
    }
}
