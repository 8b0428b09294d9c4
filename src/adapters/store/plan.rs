//! Re-entry plan hand-off file
//!
//! The next entry task picks the plan up as JSON.

use std::path::Path;
use thiserror::Error;

use crate::domain::ReentryPlan;

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("Failed to access plan file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to encode plan: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub fn save_plan<P: AsRef<Path>>(path: P, plan: &ReentryPlan) -> Result<(), PlanFileError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(plan)?;
    std::fs::write(path, json)?;
    tracing::info!("Re-entry plan written to {}", path.display());
    Ok(())
}

pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<ReentryPlan, PlanFileError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
