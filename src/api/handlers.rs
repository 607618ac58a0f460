use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::results::{AnalysisResult, LabelResult},
    AppState,
};

/// Read every named multipart field into memory.
async fn collect_fields(mut multipart: Multipart) -> Result<HashMap<String, Bytes>> {
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = match field.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let content = field.bytes().await?;
        fields.insert(name, content);
    }

    Ok(fields)
}

fn log_outcome<T>(request_id: Uuid, result: &Result<T>) {
    match result {
        Ok(_) => log::info!("[{}] done", request_id),
        Err(e) if e.is_invariant_violation() => log::error!("[{}] {}", request_id, e),
        Err(e) => log::warn!("[{}] {}", request_id, e),
    }
}

/// Classify two uploaded images (`file1`, `file2`) and compare them.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisResult>> {
    let request_id = Uuid::new_v4();
    let mut fields = collect_fields(multipart).await?;

    let (first, second) = match (fields.remove("file1"), fields.remove("file2")) {
        (Some(first), Some(second)) => (first, second),
        _ => return Err(AppError::InvalidInput("Two files are required".to_string())),
    };
    log::info!(
        "[{}] comparing images of {} and {} bytes",
        request_id,
        first.len(),
        second.len()
    );

    // Inference is CPU bound; keep it off the async workers
    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.compare_bytes(&first, &second)).await?;
    log_outcome(request_id, &result);

    Ok(Json(result?))
}

/// Classify a single uploaded image (`file`, or `file1`).
pub async fn classify(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LabelResult>> {
    let request_id = Uuid::new_v4();
    let mut fields = collect_fields(multipart).await?;

    let image = fields
        .remove("file")
        .or_else(|| fields.remove("file1"))
        .ok_or_else(|| AppError::InvalidInput("A file is required".to_string()))?;
    log::info!("[{}] classifying image of {} bytes", request_id, image.len());

    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.classify_bytes(&image)).await?;
    log_outcome(request_id, &result);

    Ok(Json(result?))
}
