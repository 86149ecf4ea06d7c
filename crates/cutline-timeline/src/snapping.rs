//! Snapping engine for timeline interactions.

use cutline_core::Pts;
use std::collections::BTreeSet;

use crate::clip::ClipId;
use crate::config::EditConfig;
use crate::sequence::Sequence;

/// A point on the timeline that can be snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapPoint {
    pub pts: Pts,
    pub kind: SnapKind,
}

/// Kind of snap point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    ClipEdge,
    Cursor,
}

/// Engine for computing snap targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SnappingEngine {
    pub snap_to_cursor: bool,
    pub snap_to_clips: bool,
    /// Snap distance in pixels (will be divided by zoom).
    pub snap_distance_px: f32,
}

impl SnappingEngine {
    pub fn new() -> Self {
        Self::from_config(&EditConfig::default())
    }

    pub fn from_config(config: &EditConfig) -> Self {
        Self {
            snap_to_cursor: config.snap_to_cursor,
            snap_to_clips: config.snap_to_clips,
            snap_distance_px: config.snap_distance_px,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.snap_to_cursor || self.snap_to_clips
    }

    /// Collect the snap points of `sequence`, skipping the edges of the
    /// clips in `exclude` (e.g. the ones being dragged).
    pub fn collect_snap_points(
        &self,
        sequence: &Sequence,
        cursor: Pts,
        exclude: &BTreeSet<ClipId>,
    ) -> Vec<SnapPoint> {
        let mut points = Vec::new();
        if self.snap_to_cursor {
            points.push(SnapPoint {
                pts: cursor,
                kind: SnapKind::Cursor,
            });
        }
        if self.snap_to_clips {
            for track in sequence.tracks() {
                for (left, clip) in track.visible_clips() {
                    if clip.is_empty_clip() || exclude.contains(&clip.id) {
                        continue;
                    }
                    for pts in [left, left + clip.length()] {
                        points.push(SnapPoint {
                            pts,
                            kind: SnapKind::ClipEdge,
                        });
                    }
                }
            }
        }
        points.sort_unstable_by_key(|point| point.pts);
        points.dedup_by_key(|point| point.pts);
        points
    }

    /// Snap threshold in ticks; `zoom` is pixels per tick.
    fn threshold(&self, zoom: f32) -> Option<f64> {
        (self.is_enabled() && zoom > 0.0).then(|| f64::from(self.snap_distance_px / zoom))
    }

    /// Find the closest snap point within snap distance.
    /// Returns the snapped position, or None if no snap found.
    pub fn find_snap(&self, pts: Pts, points: &[SnapPoint], zoom: f32) -> Option<Pts> {
        let threshold = self.threshold(zoom)?;
        points
            .iter()
            .map(|point| (point.pts, (point.pts - pts).abs()))
            .filter(|(_, distance)| *distance as f64 <= threshold)
            .min_by_key(|(_, distance)| *distance)
            .map(|(snapped, _)| snapped)
    }

    /// Correction to add to a drag so the nearest of `edges` lands on a
    /// snap point, or 0 if none is close enough.
    pub fn snap_edges(&self, edges: &[Pts], points: &[SnapPoint], zoom: f32) -> Pts {
        edges
            .iter()
            .filter_map(|edge| self.find_snap(*edge, points, zoom).map(|snapped| snapped - edge))
            .min_by_key(|correction| correction.abs())
            .unwrap_or(0)
    }
}

impl Default for SnappingEngine {
    fn default() -> Self {
        Self::new()
    }
}
