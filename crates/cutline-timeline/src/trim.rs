//! Trimming clip and transition edges.
//!
//! A normal trim changes one clip (and its link partner) and fills or eats
//! the gap next to the trimmed edge, so nothing else moves. A shift trim
//! keeps the trimmed edge in place and moves everything after it, in every
//! track, by the trimmed amount.
//!
//! Requests beyond the legal range are clamped, never rejected.

use cutline_core::{CutlineError, Pts, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;
use uuid::Uuid;

use crate::clip::{Clip, ClipId, ClipKind};
use crate::edit::{shift_room, ClipEdit};
use crate::sequence::Sequence;
use crate::track::Track;

/// Which edge of a clip is trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrimSide {
    Begin,
    End,
}

/// Trim `clip` and return the applied edit, or `None` if nothing changed.
///
/// `amount` moves the edge to the right when positive, so a positive begin
/// trim shortens the clip and a positive end trim lengthens it.
pub fn trim(
    sequence: &mut Sequence,
    clip: ClipId,
    side: TrimSide,
    amount: Pts,
    shift: bool,
) -> Result<Option<ClipEdit>> {
    if amount == 0 {
        return Ok(None);
    }
    let mut edit = ClipEdit::new(if shift { "Shift Trim" } else { "Trim" });
    match plan_trim(&mut edit, sequence, clip, side, amount, shift) {
        Ok(0) => {
            edit.revert(sequence);
            Ok(None)
        }
        Ok(_) => {
            edit.finalize(sequence);
            Ok(Some(edit))
        }
        Err(e) => {
            edit.revert(sequence);
            Err(e)
        }
    }
}

/// Legal range of `amount` for [`trim`].
pub fn trim_limits(
    sequence: &Sequence,
    clip: ClipId,
    side: TrimSide,
    shift: bool,
) -> Result<(Pts, Pts)> {
    let location = sequence.require_clip(clip)?;
    let track = sequence.require_track(location.track)?;
    if let ClipKind::Transition(_) = track.clips()[location.index].kind {
        return transition_limits(sequence, clip, side);
    }
    if shift || blocking_transitions(sequence, clip, side).is_empty() {
        return clip_limits(sequence, clip, sequence.link_of(clip), side, shift);
    }
    // Limits after the blocking transitions are given back.
    let mut scratch = sequence.clone();
    let mut edit = ClipEdit::new("Trim");
    unapply_blocking(&mut edit, &mut scratch, clip, side);
    let current = edit
        .current(clip)
        .ok_or_else(|| CutlineError::Internal(format!("{clip} lost while unapplying")))?;
    let partner = sequence.link_of(clip).and_then(|p| edit.current(p));
    clip_limits(&scratch, current, partner, side, false)
}

/// Plan a trim into `edit`, returning the amount actually applied.
pub(crate) fn plan_trim(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    clip: ClipId,
    side: TrimSide,
    amount: Pts,
    shift: bool,
) -> Result<Pts> {
    if amount == 0 {
        return Ok(0);
    }
    let location = sequence.require_clip(clip)?;
    let kind = sequence.require_track(location.track)?.clips()[location.index]
        .kind
        .clone();
    match kind {
        ClipKind::Transition(_) => return plan_transition_trim(edit, sequence, clip, side, amount),
        ClipKind::Empty(_) if !shift => return Ok(0),
        _ => {}
    }

    let original_partner = sequence.link_of(clip);
    if !shift {
        unapply_blocking(edit, sequence, clip, side);
    }
    let clip = edit
        .current(clip)
        .ok_or_else(|| CutlineError::Internal(format!("{clip} lost while unapplying")))?;
    let partner = original_partner.and_then(|p| edit.current(p));

    let (lower, upper) = clip_limits(sequence, clip, partner, side, shift)?;
    let applied = if lower > upper {
        0
    } else {
        amount.clamp(lower, upper)
    };
    if applied != amount {
        debug!(%clip, requested = amount, applied, lower, upper, "trim clamped");
    }
    if applied == 0 {
        return Ok(0);
    }

    if shift {
        let pts = edge_pts(sequence, clip, side)?;
        let mut tracks: SmallVec<[Uuid; 2]> = SmallVec::new();
        for id in std::iter::once(clip).chain(partner) {
            tracks.push(sequence.require_clip(id)?.track);
            trim_in_place(edit, sequence, id, side, applied)?;
        }
        let shift_by = match side {
            TrimSide::Begin => -applied,
            TrimSide::End => applied,
        };
        edit.shift_all_tracks(sequence, &tracks, pts, shift_by);
    } else {
        for id in std::iter::once(clip).chain(partner) {
            trim_with_gap(edit, sequence, id, side, applied)?;
        }
    }
    Ok(applied)
}

// ── Limits ──────────────────────────────────────────────────────

fn edge_limits(track: &Track, index: usize, side: TrimSide, shift: bool) -> (Pts, Pts) {
    match side {
        TrimSide::Begin => {
            let lower = track.min_adjust_begin(index);
            let upper = track.max_adjust_begin(index);
            if shift {
                (lower, upper)
            } else {
                (lower.max(track.left_empty_area(index)), upper)
            }
        }
        TrimSide::End => {
            let lower = track.min_adjust_end(index);
            let upper = track.max_adjust_end(index);
            if shift {
                (lower, upper)
            } else {
                (lower, upper.min(track.right_empty_area(index)))
            }
        }
    }
}

fn edge_pts(sequence: &Sequence, clip: ClipId, side: TrimSide) -> Result<Pts> {
    let location = sequence.require_clip(clip)?;
    let track = sequence.require_track(location.track)?;
    Ok(match side {
        TrimSide::Begin => track.left_pts(location.index),
        TrimSide::End => track.right_pts(location.index),
    })
}

fn clip_limits(
    sequence: &Sequence,
    clip: ClipId,
    partner: Option<ClipId>,
    side: TrimSide,
    shift: bool,
) -> Result<(Pts, Pts)> {
    let mut lower = Pts::MIN;
    let mut upper = Pts::MAX;
    let mut tracks: SmallVec<[Uuid; 2]> = SmallVec::new();
    for id in std::iter::once(clip).chain(partner) {
        let location = sequence.require_clip(id)?;
        let track = sequence.require_track(location.track)?;
        let (low, high) = edge_limits(track, location.index, side, shift);
        lower = lower.max(low);
        upper = upper.min(high);
        tracks.push(track.id);
    }
    if shift {
        let pts = edge_pts(sequence, clip, side)?;
        for track in sequence.tracks().filter(|t| !tracks.contains(&t.id)) {
            let (low, high) = shift_room(track, pts);
            match side {
                TrimSide::Begin => {
                    lower = lower.max(-high);
                    upper = upper.min(-low);
                }
                TrimSide::End => {
                    lower = lower.max(low);
                    upper = upper.min(high);
                }
            }
        }
    }
    Ok((lower, upper))
}

/// In-out transitions on the trimmed side of `clip` or its partner.
fn blocking_transitions(sequence: &Sequence, clip: ClipId, side: TrimSide) -> Vec<ClipId> {
    std::iter::once(clip)
        .chain(sequence.link_of(clip))
        .filter_map(|id| {
            let location = sequence.locate(id)?;
            let track = sequence.track(location.track)?;
            let index = match side {
                TrimSide::Begin => track.in_transition(location.index)?,
                TrimSide::End => track.out_transition(location.index)?,
            };
            let transition = &track.clips()[index];
            transition
                .as_transition()
                .filter(|t| t.is_in_out())
                .map(|_| transition.id)
        })
        .collect()
}

/// An in-out transition pins the trimmed edge; give it back first.
fn unapply_blocking(edit: &mut ClipEdit, sequence: &mut Sequence, clip: ClipId, side: TrimSide) {
    for transition in blocking_transitions(sequence, clip, side) {
        if sequence.locate(transition).is_some() {
            edit.unapply_transition(sequence, transition);
        }
    }
}

// ── Applying ────────────────────────────────────────────────────

fn adjusted(sequence: &mut Sequence, clip: &Clip, side: TrimSide, amount: Pts) -> Clip {
    let mut trimmed = sequence.replica(clip);
    match side {
        TrimSide::Begin => trimmed.adjust_begin(amount),
        TrimSide::End => trimmed.adjust_end(amount),
    }
    trimmed
}

fn trim_in_place(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    clip: ClipId,
    side: TrimSide,
    amount: Pts,
) -> Result<()> {
    let original = sequence
        .clip(clip)
        .cloned()
        .ok_or_else(|| CutlineError::NotFound(format!("{clip}")))?;
    let trimmed = adjusted(sequence, &original, side, amount);
    edit.replace_clip(sequence, clip, vec![trimmed]);
    Ok(())
}

/// Trim one edge, leaving a gap behind or eating into the gap next to it.
///
/// An in-only transition before the clip (or out-only after it) travels
/// with the trimmed edge.
fn trim_with_gap(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    clip: ClipId,
    side: TrimSide,
    amount: Pts,
) -> Result<()> {
    let location = sequence.require_clip(clip)?;
    let track = sequence.require_track(location.track)?;
    let index = location.index;
    let clips = track.clips();
    let original = clips[index].clone();

    let (carried, gap) = match side {
        TrimSide::Begin => {
            let carried = index
                .checked_sub(1)
                .filter(|prev| matches!(&clips[*prev].kind, ClipKind::Transition(t) if t.is_in_only()));
            let outer = carried.unwrap_or(index).checked_sub(1);
            (carried, outer.filter(|i| clips[*i].is_empty_clip()))
        }
        TrimSide::End => {
            let carried = Some(index + 1)
                .filter(|next| matches!(clips.get(*next).map(|c| &c.kind), Some(ClipKind::Transition(t)) if t.is_out_only()));
            let outer = carried.unwrap_or(index) + 1;
            (carried, Some(outer).filter(|i| clips.get(*i).is_some_and(Clip::is_empty_clip)))
        }
    };
    let carried = carried.map(|i| clips[i].clone());
    let gap = gap.map(|i| clips[i].clone());

    let trimmed = adjusted(sequence, &original, side, amount);
    let carried_replica = carried.as_ref().map(|t| sequence.replica(t));
    let mut old_run = Vec::new();
    let mut new_run = Vec::new();
    match side {
        TrimSide::Begin if amount > 0 => {
            old_run.extend(carried.iter().map(|t| t.id));
            old_run.push(original.id);
            new_run.push(sequence.new_empty(amount));
            new_run.extend(carried_replica);
            new_run.push(trimmed);
        }
        TrimSide::Begin => {
            let gap = gap.ok_or_else(|| CutlineError::Internal(format!("no gap before {clip}")))?;
            old_run.push(gap.id);
            old_run.extend(carried.iter().map(|t| t.id));
            old_run.push(original.id);
            let rest = gap.length() + amount;
            if rest > 0 {
                new_run.push(sequence.new_empty(rest));
            }
            new_run.extend(carried_replica);
            new_run.push(trimmed);
        }
        TrimSide::End if amount < 0 => {
            old_run.push(original.id);
            old_run.extend(carried.iter().map(|t| t.id));
            new_run.push(trimmed);
            new_run.extend(carried_replica);
            new_run.push(sequence.new_empty(-amount));
        }
        TrimSide::End => {
            old_run.push(original.id);
            old_run.extend(carried.iter().map(|t| t.id));
            new_run.push(trimmed);
            new_run.extend(carried_replica);
            if let Some(gap) = gap {
                old_run.push(gap.id);
                let rest = gap.length() - amount;
                if rest > 0 {
                    new_run.push(sequence.new_empty(rest));
                }
            }
        }
    }
    edit.replace(sequence, location.track, &old_run, new_run);
    Ok(())
}

// ── Transition edges ────────────────────────────────────────────

/// Limits of a transition edge, including the mirrored transition at the
/// supplier's link partner.
fn transition_limits(sequence: &Sequence, transition: ClipId, side: TrimSide) -> Result<(Pts, Pts)> {
    let mut lower = Pts::MIN;
    let mut upper = Pts::MAX;
    for id in std::iter::once(transition).chain(mirror_transition(sequence, transition, side)) {
        let location = sequence.require_clip(id)?;
        let track = sequence.require_track(location.track)?;
        let (low, high) = match side {
            TrimSide::Begin => (
                track.min_adjust_begin(location.index),
                track.max_adjust_begin(location.index),
            ),
            TrimSide::End => (
                track.min_adjust_end(location.index),
                track.max_adjust_end(location.index),
            ),
        };
        lower = lower.max(low);
        upper = upper.min(high);
    }
    Ok((lower, upper))
}

/// Transition at the link partner of the clip supplying `side`.
fn mirror_transition(sequence: &Sequence, transition: ClipId, side: TrimSide) -> Option<ClipId> {
    let location = sequence.locate(transition)?;
    let track = sequence.track(location.track)?;
    let supplier = match side {
        TrimSide::Begin => track.get(location.index.checked_sub(1)?)?,
        TrimSide::End => track.get(location.index + 1)?,
    };
    let partner = sequence.link_of(supplier.id)?;
    let partner_location = sequence.locate(partner)?;
    let partner_track = sequence.track(partner_location.track)?;
    let index = match side {
        TrimSide::Begin => partner_track.out_transition(partner_location.index)?,
        TrimSide::End => partner_track.in_transition(partner_location.index)?,
    };
    Some(partner_track.clips()[index].id)
}

fn plan_transition_trim(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    transition: ClipId,
    side: TrimSide,
    amount: Pts,
) -> Result<Pts> {
    let (lower, upper) = transition_limits(sequence, transition, side)?;
    let applied = if lower > upper { 0 } else { amount.clamp(lower, upper) };
    if applied != amount {
        debug!(%transition, requested = amount, applied, "transition trim clamped");
    }
    if applied == 0 {
        return Ok(0);
    }
    let mirror = mirror_transition(sequence, transition, side);
    for id in std::iter::once(transition).chain(mirror) {
        move_transition_edge(edit, sequence, id, side, applied)?;
    }
    Ok(applied)
}

/// Move one edge of a transition, handing the difference to the clip on
/// that side. A transition left without length disappears.
fn move_transition_edge(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    transition: ClipId,
    side: TrimSide,
    amount: Pts,
) -> Result<()> {
    let location = sequence.require_clip(transition)?;
    let track = sequence.require_track(location.track)?;
    let original = track.clips()[location.index].clone();
    let neighbour_index = match side {
        TrimSide::Begin => location.index.checked_sub(1),
        TrimSide::End => Some(location.index + 1),
    };
    let neighbour = neighbour_index
        .and_then(|i| track.get(i))
        .cloned()
        .ok_or_else(|| CutlineError::Internal(format!("{transition} has no neighbour")))?;

    let mut moved = sequence.replica(&original);
    let mut adjusted_neighbour = sequence.replica(&neighbour);
    match side {
        TrimSide::Begin => {
            moved.adjust_begin(amount);
            adjusted_neighbour.adjust_end(amount);
        }
        TrimSide::End => {
            moved.adjust_end(amount);
            adjusted_neighbour.adjust_begin(amount);
        }
    }
    let keep = moved.length() > 0;
    let (old_run, new_run) = match side {
        TrimSide::Begin => (
            vec![neighbour.id, original.id],
            std::iter::once(adjusted_neighbour)
                .chain(keep.then_some(moved))
                .collect(),
        ),
        TrimSide::End => (
            vec![original.id, neighbour.id],
            keep.then_some(moved)
                .into_iter()
                .chain(std::iter::once(adjusted_neighbour))
                .collect(),
        ),
    };
    edit.replace(sequence, location.track, &old_run, new_run);
    Ok(())
}
