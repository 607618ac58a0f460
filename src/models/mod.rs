//! Data models for analysis results

/// Result records returned by the analysis pipeline.
pub mod results;
