//! Editing preferences.

use cutline_core::{CutlineError, Pts, Result};
use serde::{Deserialize, Serialize};

/// Knobs that change how edit operations behave.
///
/// Missing fields take their defaults when loading, so older settings files
/// keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// Length asked for when a transition is created without one.
    pub default_transition_length: Pts,
    /// Shift-trim the neighbours of a cut to free the material a new
    /// transition needs, instead of making it shorter.
    pub make_room_for_transitions: bool,
    /// Snap drags to the playhead.
    pub snap_to_cursor: bool,
    /// Snap drags to clip edges.
    pub snap_to_clips: bool,
    /// Snap distance in pixels (divided by zoom).
    pub snap_distance_px: f32,
    /// Undo history depth.
    pub undo_depth: usize,
    /// Threads of the render worker.
    pub worker_threads: usize,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            default_transition_length: 24,
            make_room_for_transitions: false,
            snap_to_cursor: true,
            snap_to_clips: true,
            snap_distance_px: 8.0,
            undo_depth: 200,
            worker_threads: num_cpus::get().clamp(1, 8),
        }
    }
}

impl EditConfig {
    /// Parse settings from JSON.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| CutlineError::Serialization(format!("Invalid edit settings: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CutlineError::Serialization(format!("Failed to serialize settings: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_transition_length <= 0 {
            return Err(CutlineError::InvalidParameter(format!(
                "default transition length {} must be positive",
                self.default_transition_length
            )));
        }
        if self.undo_depth == 0 || self.worker_threads == 0 {
            return Err(CutlineError::InvalidParameter(
                "undo depth and worker threads must be at least 1".into(),
            ));
        }
        if self.snap_distance_px.is_nan() || self.snap_distance_px < 0.0 {
            return Err(CutlineError::InvalidParameter(format!(
                "snap distance {} must not be negative",
                self.snap_distance_px
            )));
        }
        Ok(())
    }
}
