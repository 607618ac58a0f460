use std::sync::Arc;

use crate::core::inference::{ClassificationModel, Vocabulary};
use crate::core::normalize::NormalizedTensor;
use crate::error::{AppError, Result};
use crate::models::results::LabelResult;

/// Runs the network in classification mode and keeps the top-1 prediction.
#[derive(Clone)]
pub struct ClassifierAdapter {
    model: Arc<dyn ClassificationModel>,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("classes", &self.model.vocabulary().len())
            .finish()
    }
}

impl ClassifierAdapter {
    /// Wrap a shared classification model.
    pub fn new(model: Arc<dyn ClassificationModel>) -> Self {
        Self { model }
    }

    /// Label table of the underlying model.
    pub fn vocabulary(&self) -> &Vocabulary {
        self.model.vocabulary()
    }

    /// Classify a normalized image.
    pub fn classify(&self, input: &NormalizedTensor) -> Result<LabelResult> {
        let distribution = self.model.predict(input)?;
        let result = decode_top1(&distribution, self.model.vocabulary())?;
        log::debug!("Top-1 prediction: {} ({:.4})", result.label, result.confidence);
        Ok(result)
    }
}

/// Pick the most probable class. On ties the earliest index wins.
pub fn decode_top1(distribution: &[f32], vocabulary: &Vocabulary) -> Result<LabelResult> {
    if distribution.len() != vocabulary.len() {
        return Err(AppError::InferenceFailure(format!(
            "model returned {} scores for {} classes",
            distribution.len(),
            vocabulary.len()
        )));
    }

    let mut best: Option<(usize, f32)> = None;
    for (index, &p) in distribution.iter().enumerate() {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(AppError::InferenceFailure(format!(
                "class {} has probability {} outside [0, 1]",
                index, p
            )));
        }
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((index, p)),
        }
    }

    let (index, confidence) = best
        .ok_or_else(|| AppError::InferenceFailure("model returned no scores".to_string()))?;
    let label = vocabulary
        .label(index)
        .ok_or_else(|| AppError::InferenceFailure(format!("no label for class {}", index)))?;

    Ok(LabelResult {
        label: label.to_string(),
        confidence,
    })
}
