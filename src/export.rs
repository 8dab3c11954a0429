use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Result, ValidationError};
use crate::result::{HttpMethod, ValidationResult};
use crate::summary::RunSummary;

/// Exported form of one result
#[derive(Debug, Serialize)]
pub struct ExportedResult<'a> {
    pub endpoint_id: usize,
    pub path: &'a str,
    pub method: HttpMethod,
    pub success: bool,
    pub response_code: Option<u16>,
    /// Seconds
    pub response_time: Option<f64>,
    pub errors: Vec<&'a str>,
    pub warnings: &'a [String],
}

impl<'a> From<&'a ValidationResult> for ExportedResult<'a> {
    fn from(result: &'a ValidationResult) -> Self {
        Self {
            endpoint_id: result.endpoint_id,
            path: &result.path,
            method: result.method,
            success: result.success(),
            response_code: result.response_code,
            response_time: result.response_time.map(|t| t.as_secs_f64()),
            errors: result.errors.iter().map(|e| e.message.as_str()).collect(),
            warnings: &result.warnings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: &'a RunSummary,
    pub results: Vec<ExportedResult<'a>>,
}

impl<'a> ExportDocument<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            generated_at: Utc::now(),
            summary,
            results: summary
                .results
                .iter()
                .map(|result| ExportedResult::from(result.as_ref()))
                .collect(),
        }
    }
}

/// Pretty-printed JSON document for a summary
pub fn render(summary: &RunSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportDocument::new(summary))
}

/// Write the detailed results to `path`
pub async fn export_results(summary: &RunSummary, path: &Path) -> Result<()> {
    let export_error = |details: String| ValidationError::Export {
        path: path.to_path_buf(),
        details,
    };

    let document = render(summary).map_err(|e| export_error(e.to_string()))?;
    tokio::fs::write(path, document)
        .await
        .map_err(|e| export_error(e.to_string()))?;

    info!("Detailed results exported to {}", path.display());
    Ok(())
}
