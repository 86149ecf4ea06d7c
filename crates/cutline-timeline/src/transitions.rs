//! Creating and removing transitions at cuts.
//!
//! A transition borrows hidden material from the clips on both sides of a
//! cut, so the track keeps its length. When either clip is linked, the cut
//! at the partners gets the matching transition in the same edit.

use cutline_core::{CutlineError, Pts, Result};
use tracing::debug;
use uuid::Uuid;

use crate::clip::{ClipId, SourceClip};
use crate::command::{Applied, EditCommand};
use crate::edit::ClipEdit;
use crate::sequence::Sequence;
use crate::track::Track;
use crate::transition::{distribute, TransitionKind};
use crate::trim::{plan_trim, TrimSide};

/// One cut that receives a transition.
///
/// `prev` is set when the transition takes its left side from that clip,
/// `next` when it takes its right side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Site {
    track: Uuid,
    prev: Option<ClipId>,
    next: Option<ClipId>,
}

/// Side lengths for a new transition and the cuts it lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub left: Pts,
    pub right: Pts,
    sites: Vec<Site>,
}

impl TransitionPlan {
    pub fn length(&self) -> Pts {
        self.left + self.right
    }

    /// Number of transitions the plan creates, mirrors included.
    pub fn transition_count(&self) -> usize {
        self.sites
            .iter()
            .filter(|site| {
                (site.prev.is_some() && self.left > 0) || (site.next.is_some() && self.right > 0)
            })
            .count()
    }
}

/// Clip indices on both sides of the cut at `pts`.
fn cut_neighbours(track: &Track, pts: Pts) -> Result<(Option<usize>, Option<usize>)> {
    if pts < 0 || pts > track.length() || !track.is_cut(pts) {
        return Err(CutlineError::InvalidParameter(format!(
            "{pts} is not a cut in track '{}'",
            track.name
        )));
    }
    let next = track.index_from(pts);
    let prev = next.checked_sub(1);
    Ok((prev, (next < track.len()).then_some(next)))
}

/// Whether neither side of a cut is already a transition.
fn cut_is_free(track: &Track, prev: Option<usize>, next: Option<usize>) -> bool {
    let is_transition = |index: Option<usize>| {
        index
            .and_then(|i| track.get(i))
            .is_some_and(|clip| clip.is_transition())
    };
    !is_transition(prev) && !is_transition(next)
}

fn source_id(track: &Track, index: Option<usize>) -> Option<ClipId> {
    index
        .and_then(|i| track.get(i))
        .filter(|clip| clip.is_source())
        .map(|clip| clip.id)
}

/// Most each side of a cut can give.
///
/// With source clips on both sides, the left side is bounded by the hidden
/// head of the next clip and the right side by the hidden tail of the
/// previous one, because both suppliers must cover the whole transition.
fn availability(track: &Track, prev: Option<usize>, next: Option<usize>) -> (Pts, Pts) {
    let source = |index: Option<usize>| index.and_then(|i| track.get(i)).and_then(|c| c.as_source());
    match (source(prev), source(next)) {
        (Some(a), Some(b)) => (a.length.min(b.head()), b.length.min(a.tail())),
        (Some(a), None) => (a.length, 0),
        (None, Some(b)) => (0, b.length),
        (None, None) => (0, 0),
    }
}

/// Work out a transition of `length` at the cut `pts` of `track`.
///
/// Returns `None` when the cut already has a transition or no side has
/// material to give.
pub fn plan_transition(
    sequence: &Sequence,
    track_id: Uuid,
    pts: Pts,
    length: Pts,
) -> Result<Option<TransitionPlan>> {
    if length <= 0 {
        return Err(CutlineError::InvalidParameter(format!(
            "transition length {length} must be positive"
        )));
    }
    let track = sequence.require_track(track_id)?;
    let (prev, next) = cut_neighbours(track, pts)?;
    if !cut_is_free(track, prev, next) {
        debug!(track = %track_id, pts, "cut already has a transition");
        return Ok(None);
    }
    let (mut available_left, mut available_right) = availability(track, prev, next);
    let prev_id = source_id(track, prev);
    let next_id = source_id(track, next);
    let mut sites = vec![Site {
        track: track_id,
        prev: prev_id,
        next: next_id,
    }];

    let prev_partner = prev_id.and_then(|id| sequence.link_of(id));
    let next_partner = next_id.and_then(|id| sequence.link_of(id));
    let paired = match (prev_partner, next_partner) {
        (Some(a), Some(b)) => adjacent(sequence, a, b),
        _ => None,
    };

    if let Some((partner_track, index)) = paired {
        let mirror = sequence.require_track(partner_track)?;
        if cut_is_free(mirror, Some(index), Some(index + 1)) {
            let (left, right) = availability(mirror, Some(index), Some(index + 1));
            available_left = available_left.min(left);
            available_right = available_right.min(right);
            sites.push(Site {
                track: partner_track,
                prev: prev_partner,
                next: next_partner,
            });
        } else {
            available_left = 0;
            available_right = 0;
        }
    } else {
        if let Some(partner) = prev_partner {
            let location = sequence.require_clip(partner)?;
            let mirror = sequence.require_track(location.track)?;
            let after = location.index + 1;
            if cut_is_free(mirror, None, (after < mirror.len()).then_some(after)) {
                available_left = available_left.min(mirror.clips()[location.index].length());
                sites.push(Site {
                    track: location.track,
                    prev: Some(partner),
                    next: None,
                });
            } else {
                available_left = 0;
            }
        }
        if let Some(partner) = next_partner {
            let location = sequence.require_clip(partner)?;
            let mirror = sequence.require_track(location.track)?;
            if cut_is_free(mirror, location.index.checked_sub(1), None) {
                available_right = available_right.min(mirror.clips()[location.index].length());
                sites.push(Site {
                    track: location.track,
                    prev: None,
                    next: Some(partner),
                });
            } else {
                available_right = 0;
            }
        }
    }

    let (left, right) = match (prev_id, next_id) {
        (Some(_), Some(_)) => distribute(length, available_left, available_right),
        // A lone side never takes more than its half.
        _ => (
            available_left.min(length / 2),
            available_right.min(length - length / 2),
        ),
    };
    if left + right == 0 {
        debug!(track = %track_id, pts, length, "no material for a transition");
        return Ok(None);
    }
    Ok(Some(TransitionPlan { left, right, sites }))
}

/// Track and index of `a` when `b` directly follows it.
fn adjacent(sequence: &Sequence, a: ClipId, b: ClipId) -> Option<(Uuid, usize)> {
    let first = sequence.locate(a)?;
    let second = sequence.locate(b)?;
    (first.track == second.track && second.index == first.index + 1)
        .then_some((first.track, first.index))
}

/// Insert the transitions of `plan`, returning the one at the requested cut.
fn apply_plan(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    plan: &TransitionPlan,
    kind: TransitionKind,
) -> Option<ClipId> {
    let mut created = None;
    for (index, site) in plan.sites.iter().enumerate() {
        let left = if site.prev.is_some() { plan.left } else { 0 };
        let right = if site.next.is_some() { plan.right } else { 0 };
        if left + right == 0 {
            continue;
        }
        let prev = site.prev.filter(|_| left > 0);
        let next = site.next.filter(|_| right > 0);
        let id = edit.make_transition(sequence, site.track, prev, next, left, right, kind);
        if index == 0 {
            created = id;
        }
    }
    created
}

/// Create a transition of up to `length` ticks at the cut `pts`.
///
/// Returns the applied edit, or `None` if the cut cannot take one.
pub fn create_transition(
    sequence: &mut Sequence,
    track: Uuid,
    pts: Pts,
    length: Pts,
    kind: TransitionKind,
) -> Result<Option<ClipEdit>> {
    let Some(plan) = plan_transition(sequence, track, pts, length)? else {
        return Ok(None);
    };
    let mut edit = ClipEdit::new("Create Transition");
    if apply_plan(&mut edit, sequence, &plan, kind).is_none() {
        edit.revert(sequence);
        return Err(CutlineError::Internal(format!(
            "transition at {pts} could not be inserted"
        )));
    }
    edit.finalize(sequence);
    debug!(%track, pts, left = plan.left, right = plan.right, "transition created");
    Ok(Some(edit))
}

/// Like [`create_transition`], but first shift-trims the clips at the cut
/// when they lack the hidden material for an even split of `length`.
///
/// The trims and the creation form one command.
pub fn create_transition_making_room(
    sequence: &mut Sequence,
    track: Uuid,
    pts: Pts,
    length: Pts,
    kind: TransitionKind,
) -> Result<Option<Applied>> {
    let current = sequence.require_track(track)?;
    let (prev, next) = cut_neighbours(current, pts)?;
    let source = |index: Option<usize>| index.and_then(|i| current.get(i)).filter(|c| c.is_source());
    let (Some(a), Some(b)) = (source(prev), source(next)) else {
        return Ok(create_transition(sequence, track, pts, length, kind)?.map(Applied::from));
    };
    let tail = a.as_source().map_or(0, SourceClip::tail);
    let head = b.as_source().map_or(0, SourceClip::head);
    let (a, b) = (a.id, b.id);

    let mut room = ClipEdit::new("Make Room");
    let b = match make_room(&mut room, sequence, (a, tail), (b, head), length) {
        Ok(b) => b,
        Err(e) => {
            room.revert(sequence);
            return Err(e);
        }
    };
    room.finalize(sequence);

    let created = sequence
        .clip_left(b)
        .ok_or_else(|| CutlineError::Internal(format!("{b} lost while making room")))
        .and_then(|cut| create_transition(sequence, track, cut, length, kind));
    let mut created = match created {
        Ok(Some(created)) => created,
        Ok(None) => {
            room.revert(sequence);
            return Ok(None);
        }
        Err(e) => {
            room.revert(sequence);
            return Err(e);
        }
    };
    if room.is_empty() {
        return Ok(Some(created.into()));
    }
    let mut changes = room.take_changes();
    changes.merge(created.take_changes());
    Ok(Some(Applied::new(
        EditCommand::Batch {
            name: "Create Transition".into(),
            commands: vec![room.into(), created.into()],
        },
        changes,
    )))
}

/// Shift-trim the clips around a cut until each holds the hidden material
/// for its half of `length`. Returns the handle of the clip after the cut.
fn make_room(
    room: &mut ClipEdit,
    sequence: &mut Sequence,
    (a, tail): (ClipId, Pts),
    (b, head): (ClipId, Pts),
    length: Pts,
) -> Result<ClipId> {
    let want_left = length / 2;
    let want_right = length - want_left;
    if want_right > tail {
        plan_trim(room, sequence, a, TrimSide::End, tail - want_right, true)?;
    }
    if want_left > head {
        let b = room.current(b).unwrap_or(b);
        plan_trim(room, sequence, b, TrimSide::Begin, want_left - head, true)?;
    }
    room.current(b)
        .ok_or_else(|| CutlineError::Internal(format!("{b} lost while making room")))
}

fn require_transition(sequence: &Sequence, transition: ClipId) -> Result<()> {
    match sequence.clip(transition) {
        Some(clip) if clip.is_transition() => Ok(()),
        Some(_) => Err(CutlineError::InvalidParameter(format!(
            "{transition} is not a transition"
        ))),
        None => Err(CutlineError::NotFound(format!("{transition}"))),
    }
}

/// Remove a transition and give its length back to the clips around it.
pub fn unapply_transition(sequence: &mut Sequence, transition: ClipId) -> Result<ClipEdit> {
    require_transition(sequence, transition)?;
    let mut edit = ClipEdit::new("Remove Transition");
    edit.unapply_transition(sequence, transition);
    edit.finalize(sequence);
    Ok(edit)
}

/// Replace a transition by a gap, leaving its neighbours as they are.
pub fn remove_transition(sequence: &mut Sequence, transition: ClipId) -> Result<ClipEdit> {
    require_transition(sequence, transition)?;
    let mut edit = ClipEdit::new("Delete Transition");
    edit.remove_transition(sequence, transition);
    edit.finalize(sequence);
    Ok(edit)
}
