//! Sequence serialization with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.
//! Loading always goes through [`Sequence::reconstruct`], so a file that
//! breaks a timeline invariant is rejected instead of edited.

use cutline_core::{CutlineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::sequence::Sequence;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned sequence file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceFile {
    /// Schema version for migration.
    pub version: u32,
    /// Application version that wrote this file.
    pub app_version: String,
    pub sequence: Sequence,
}

impl SequenceFile {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            sequence,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CutlineError::Serialization(format!("Failed to serialize sequence: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| CutlineError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CURRENT_VERSION {
            return Err(CutlineError::Serialization(format!(
                "Sequence file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;
        let mut file: Self = serde_json::from_value(migrated)
            .map_err(|e| CutlineError::Serialization(format!("Failed to parse sequence: {}", e)))?;
        file.sequence = file.sequence.reconstruct()?;
        debug!(
            version,
            tracks = file.sequence.tracks().count(),
            "sequence loaded"
        );
        Ok(file)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), duration = %self.sequence.duration(), "sequence saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 files hold a bare sequence.
                if data.get("version").is_none() {
                    data = serde_json::json!({
                        "version": 1,
                        "app_version": "0.1.0",
                        "sequence": data,
                    });
                }
                version = 1;
            }
            _ => {
                return Err(CutlineError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
