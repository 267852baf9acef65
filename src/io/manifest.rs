//! Run manifest JSON.
//!
//! Written next to the result tables so a set of outputs can always be traced
//! back to the configuration, inputs and skips that produced it.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CategorizeConfig, SkippedUnit};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub input_changes: PathBuf,
    pub output_changes: PathBuf,
    pub config: CategorizeConfig,
    pub result_rows: usize,
    pub skipped_units: usize,
    pub skipped: Vec<SkippedUnit>,
}

impl RunManifest {
    pub fn new(
        input_changes: &Path,
        output_changes: &Path,
        config: &CategorizeConfig,
        result_rows: usize,
        skipped: &[SkippedUnit],
    ) -> Self {
        Self {
            tool: "pairs".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            input_changes: input_changes.to_path_buf(),
            output_changes: output_changes.to_path_buf(),
            config: config.clone(),
            result_rows,
            skipped_units: skipped.len(),
            skipped: skipped.to_vec(),
        }
    }
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create manifest '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), manifest)
        .map_err(|e| AppError::new(2, format!("Failed to write manifest '{}': {e}", path.display())))
}
