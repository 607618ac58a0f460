use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{built_info, AppState};

/// Body of the health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Build timestamp
    pub built_at: &'static str,
    /// When the models finished loading
    pub started_at: DateTime<Utc>,
    /// Size of the classifier vocabulary
    pub classes: usize,
}

impl HealthResponse {
    pub(crate) fn new(state: &AppState) -> Self {
        Self {
            status: "ok",
            version: built_info::PKG_VERSION,
            built_at: built_info::BUILT_TIME_UTC,
            started_at: state.started_at,
            classes: state.analyzer.classifier().vocabulary().len(),
        }
    }
}
