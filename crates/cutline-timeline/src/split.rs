//! Splitting every track at the cursor.

use cutline_core::{Pts, Result};
use tracing::debug;

use crate::clip::ClipId;
use crate::delete::plan_delete;
use crate::edit::ClipEdit;
use crate::sequence::Sequence;
use crate::trim::TrimSide;

/// Cut every track at `pts`. Returns `None` if `pts` is already a cut
/// everywhere.
///
/// Linked clips split in both tracks stay linked piece by piece.
pub fn split_at(sequence: &mut Sequence, pts: Pts) -> Result<Option<ClipEdit>> {
    let mut edit = ClipEdit::new("Split");
    for track in sequence.track_ids() {
        edit.split(sequence, track, pts);
    }
    if edit.is_empty() {
        return Ok(None);
    }
    edit.finalize(sequence);
    Ok(Some(edit))
}

/// Why [`split_and_trim`] refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRefusal {
    /// A track already has a cut at the cursor.
    CutAtCursor,
    /// The cursor is inside a transition.
    Transition,
    /// The clip to trim has a transition on the removed side.
    TransitionAtEdge,
    /// No track has a clip at the cursor.
    NothingToTrim,
}

/// Check whether [`split_and_trim`] can run at `pts`.
pub fn check_split_and_trim(
    sequence: &Sequence,
    pts: Pts,
    side: TrimSide,
) -> std::result::Result<(), SplitRefusal> {
    let mut found = false;
    for track in sequence.tracks() {
        let Some(index) = track.index_at(pts) else {
            continue;
        };
        if track.left_pts(index) == pts {
            return Err(SplitRefusal::CutAtCursor);
        }
        let clip = &track.clips()[index];
        if clip.is_transition() {
            return Err(SplitRefusal::Transition);
        }
        let blocked = match side {
            TrimSide::Begin => track.in_transition(index).is_some(),
            TrimSide::End => track.out_transition(index).is_some(),
        };
        if blocked {
            return Err(SplitRefusal::TransitionAtEdge);
        }
        found |= clip.is_source();
    }
    if found {
        Ok(())
    } else {
        Err(SplitRefusal::NothingToTrim)
    }
}

/// Split at `pts`, then shift-delete the part of each clip before the
/// cursor (`Begin`) or after it (`End`).
pub fn split_and_trim(sequence: &mut Sequence, pts: Pts, side: TrimSide) -> Result<Option<ClipEdit>> {
    if let Err(refusal) = check_split_and_trim(sequence, pts, side) {
        debug!(pts, ?side, ?refusal, "split and trim refused");
        return Ok(None);
    }
    let mut edit = ClipEdit::new(match side {
        TrimSide::Begin => "Trim Begin To Cursor",
        TrimSide::End => "Trim End From Cursor",
    });
    for track in sequence.track_ids() {
        edit.split(sequence, track, pts);
    }
    let probe = match side {
        TrimSide::Begin => pts - 1,
        TrimSide::End => pts,
    };
    let selection: Vec<ClipId> = sequence
        .tracks()
        .filter_map(|track| track.clip_at(probe))
        .filter(|clip| clip.is_source())
        .map(|clip| clip.id)
        .collect();
    if let Err(e) = plan_delete(&mut edit, sequence, &selection, true) {
        edit.revert(sequence);
        return Err(e);
    }
    edit.finalize(sequence);
    Ok(Some(edit))
}
