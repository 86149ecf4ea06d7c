//! Deleting clips, optionally closing the gaps they leave.

use cutline_core::{CutlineError, Pts, Result};
use std::collections::BTreeSet;
use tracing::debug;

use crate::clip::{Clip, ClipId, ClipKind};
use crate::edit::ClipEdit;
use crate::sequence::Sequence;
use crate::track::Track;

/// Delete `selection` and return the applied edit, or `None` when the
/// selection holds nothing deletable.
///
/// Linked partners are deleted along with the selected clips. Selected
/// transitions, and transitions next to deleted clips, give their length
/// back before anything is removed. With `shift`, a deleted span is closed
/// when every track is free there.
pub fn delete_clips(
    sequence: &mut Sequence,
    selection: &[ClipId],
    shift: bool,
) -> Result<Option<ClipEdit>> {
    let mut edit = ClipEdit::new(if shift { "Shift Delete" } else { "Delete" });
    if !plan_delete(&mut edit, sequence, selection, shift)? {
        return Ok(None);
    }
    edit.finalize(sequence);
    Ok(Some(edit))
}

/// Plan a delete into `edit`. Returns whether there was anything to delete.
pub(crate) fn plan_delete(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    selection: &[ClipId],
    shift: bool,
) -> Result<bool> {
    let mut clips = BTreeSet::new();
    let mut transitions = BTreeSet::new();
    for &id in selection {
        let clip = sequence
            .clip(id)
            .ok_or_else(|| CutlineError::NotFound(format!("{id}")))?;
        match clip.kind {
            ClipKind::Transition(_) => {
                transitions.insert(id);
            }
            ClipKind::Source(_) => {
                clips.insert(id);
                clips.extend(sequence.link_of(id));
            }
            ClipKind::Empty(_) => {}
        }
    }
    if clips.is_empty() && transitions.is_empty() {
        return Ok(false);
    }
    for &id in &clips {
        transitions.extend(adjacent_transitions(sequence, id));
    }
    debug!(
        clips = clips.len(),
        transitions = transitions.len(),
        shift,
        "deleting"
    );

    for &transition in &transitions {
        if sequence.locate(transition).is_some() {
            edit.unapply_transition(sequence, transition);
        }
    }
    let current: Vec<ClipId> = clips.iter().flat_map(|id| edit.latest(*id)).collect();
    let spans: Vec<(Pts, Pts)> = current
        .iter()
        .filter_map(|id| {
            let left = sequence.clip_left(*id)?;
            let length = sequence.clip(*id).map(Clip::length)?;
            (length > 0).then_some((left, left + length))
        })
        .collect();
    edit.replace_with_empty(sequence, &current);

    if shift {
        let tracks = sequence.track_ids();
        edit.merge_empty_clips(sequence, &tracks);
        close_gaps(edit, sequence, spans);
    }
    Ok(true)
}

/// Transitions that take material from the clip `id`.
fn adjacent_transitions(sequence: &Sequence, id: ClipId) -> Vec<ClipId> {
    let Some(location) = sequence.locate(id) else {
        return Vec::new();
    };
    let Some(track) = sequence.track(location.track) else {
        return Vec::new();
    };
    [
        track.in_transition(location.index),
        track.out_transition(location.index),
    ]
    .into_iter()
    .flatten()
    .map(|index| track.clips()[index].id)
    .collect()
}

/// Merge overlapping spans.
fn union(mut spans: Vec<(Pts, Pts)>) -> Vec<(Pts, Pts)> {
    spans.sort_unstable();
    let mut merged: Vec<(Pts, Pts)> = Vec::with_capacity(spans.len());
    for (left, right) in spans {
        match merged.last_mut() {
            Some(last) if left <= last.1 => last.1 = last.1.max(right),
            _ => merged.push((left, right)),
        }
    }
    merged
}

/// Whether `[left, right)` of `track` is a single gap, or past its end.
///
/// A gap that would vanish completely between two transitions does not
/// count, since the transitions would end up next to each other.
fn is_free(track: &Track, left: Pts, right: Pts) -> bool {
    let end = right.min(track.length());
    if left >= end {
        return true;
    }
    let Some(index) = track.index_at(left) else {
        return true;
    };
    if !track.clips()[index].is_empty_clip() || track.right_pts(index) < end {
        return false;
    }
    let vanishes = track.left_pts(index) >= left && track.right_pts(index) <= end;
    let is_transition = |i: Option<usize>| i.and_then(|i| track.get(i)).is_some_and(Clip::is_transition);
    !(vanishes && is_transition(index.checked_sub(1)) && is_transition(Some(index + 1)))
}

/// Remove each span from every track where all tracks are free, latest
/// span first so earlier positions stay valid.
fn close_gaps(edit: &mut ClipEdit, sequence: &mut Sequence, spans: Vec<(Pts, Pts)>) {
    for (left, right) in union(spans).into_iter().rev() {
        if !sequence.tracks().all(|track| is_free(track, left, right)) {
            debug!(left, right, "gap kept: another track has content there");
            continue;
        }
        for track_id in sequence.track_ids() {
            let Some(track) = sequence.track(track_id) else {
                continue;
            };
            let end = right.min(track.length());
            if left >= end {
                continue;
            }
            let Some(gap) = track.clip_at(left).map(|gap| (gap.id, gap.length())) else {
                continue;
            };
            let rest = gap.1 - (end - left);
            let replacement = if rest > 0 {
                vec![sequence.new_empty(rest)]
            } else {
                Vec::new()
            };
            edit.replace_unmapped(sequence, track_id, &[gap.0], replacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{MediaSource, SourceClip};
    use crate::transitions::create_transition;
    use crate::transition::TransitionKind;
    use uuid::Uuid;

    fn media(offset: Pts, length: Pts) -> SourceClip {
        SourceClip::new(MediaSource::new("a.mov", 200), offset, length)
    }

    fn lengths(sequence: &Sequence, track: Uuid) -> Vec<Pts> {
        sequence
            .track(track)
            .unwrap()
            .clips()
            .iter()
            .map(Clip::length)
            .collect()
    }

    fn two_clips() -> (Sequence, Uuid, ClipId, ClipId) {
        let mut sequence = Sequence::new("Delete");
        let video = sequence.video_tracks()[0].id;
        let a = sequence.append_source(video, media(50, 100)).unwrap();
        let b = sequence.append_source(video, media(50, 100)).unwrap();
        (sequence, video, a, b)
    }

    #[test]
    fn test_delete_leaves_gap() {
        let (mut sequence, video, a, _) = two_clips();
        delete_clips(&mut sequence, &[a], false).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![100, 100]);
        assert!(sequence.track(video).unwrap().clips()[0].is_empty_clip());
    }

    #[test]
    fn test_shift_delete_closes_gap() {
        let (mut sequence, video, a, b) = two_clips();
        delete_clips(&mut sequence, &[a], true).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![100]);
        assert_eq!(sequence.track(video).unwrap().clips()[0].id, b);
    }

    #[test]
    fn test_shift_delete_of_last_clip_empties_track() {
        let (mut sequence, video, a, b) = two_clips();
        delete_clips(&mut sequence, &[a, b], true).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(sequence.track(video).unwrap().length(), 0);
    }

    #[test]
    fn test_shift_delete_blocked_by_unlinked_clip() {
        let (mut sequence, video, a, _) = two_clips();
        let audio = sequence.audio_tracks()[0].id;
        let other = sequence.append_source(audio, media(50, 100)).unwrap();
        delete_clips(&mut sequence, &[a], true).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![100, 100]);
        assert_eq!(lengths(&sequence, audio), vec![100]);
        assert_eq!(sequence.clip_left(other), Some(0));
    }

    #[test]
    fn test_linked_partner_deleted_too() {
        let mut sequence = Sequence::new("Delete");
        let video = sequence.video_tracks()[0].id;
        let audio = sequence.audio_tracks()[0].id;
        let (v, _) = sequence.append_linked(video, audio, media(0, 100)).unwrap();
        sequence.append_linked(video, audio, media(0, 50)).unwrap();
        delete_clips(&mut sequence, &[v], true).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![50]);
        assert_eq!(lengths(&sequence, audio), vec![50]);
        assert_eq!(sequence.links().len(), 1);
    }

    #[test]
    fn test_transition_donates_back_to_survivor() {
        let (mut sequence, video, _, _) = two_clips();
        create_transition(&mut sequence, video, 100, 20, TransitionKind::CrossFade).unwrap();
        let first = sequence.track(video).unwrap().clips()[0].id;
        delete_clips(&mut sequence, &[first], false).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![100, 100]);
    }

    #[test]
    fn test_selected_transition_is_unapplied() {
        let (mut sequence, video, _, _) = two_clips();
        create_transition(&mut sequence, video, 100, 20, TransitionKind::CrossFade).unwrap();
        let transition = sequence.track(video).unwrap().clips()[1].id;
        delete_clips(&mut sequence, &[transition], false).unwrap().unwrap();
        sequence.assert_invariants();
        assert_eq!(lengths(&sequence, video), vec![100, 100]);
    }

    #[test]
    fn test_nothing_to_delete() {
        let mut sequence = Sequence::new("Delete");
        let video = sequence.video_tracks()[0].id;
        let gap = sequence.append_gap(video, 10).unwrap();
        assert!(delete_clips(&mut sequence, &[gap], true).unwrap().is_none());
        assert!(delete_clips(&mut sequence, &[ClipId(999)], true).is_err());
    }

    #[test]
    fn test_delete_undo_restores() {
        let (mut sequence, _, a, _) = two_clips();
        let before = sequence.clone();
        let edit = delete_clips(&mut sequence, &[a], true).unwrap().unwrap();
        edit.inverse().apply(&mut sequence);
        assert_eq!(sequence, before);
    }

    #[test]
    fn test_union_merges_overlaps() {
        assert_eq!(union(vec![(5, 10), (0, 6), (20, 30)]), vec![(0, 10), (20, 30)]);
    }
}
