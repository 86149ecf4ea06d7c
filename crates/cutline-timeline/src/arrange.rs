//! Track housekeeping and explicit link editing.

use cutline_core::{CutlineError, Result};
use tracing::debug;
use uuid::Uuid;

use crate::clip::ClipId;
use crate::command::{Applied, EditCommand, PlacedTrack};
use crate::edit::ClipEdit;
use crate::sequence::Sequence;
use crate::track::{Track, TrackKind};

pub(crate) fn track_name(kind: TrackKind, number: usize) -> String {
    match kind {
        TrackKind::Video => format!("V{number}"),
        TrackKind::Audio => format!("A{number}"),
    }
}

/// Add an empty track of `kind` at `index` (clamped to the track count).
pub fn add_track(sequence: &mut Sequence, kind: TrackKind, index: usize) -> Applied {
    let count = sequence.tracks_of(kind).len();
    let placed = PlacedTrack {
        index: index.min(count),
        track: Track::new(kind, track_name(kind, count + 1)),
    };
    let command = EditCommand::AddTracks(vec![placed]);
    let changes = command.apply(sequence);
    Applied::new(command, changes)
}

/// Remove a track together with its clips.
///
/// Links from its clips to clips in other tracks are dropped. The last
/// track of a kind cannot be removed.
pub fn remove_track(sequence: &mut Sequence, track: Uuid) -> Result<Applied> {
    let (kind, index) = sequence
        .track_position(track)
        .ok_or_else(|| CutlineError::NotFound(format!("track {track}")))?;
    if sequence.tracks_of(kind).len() <= 1 {
        return Err(CutlineError::InvalidParameter(format!(
            "cannot remove the last {kind:?} track"
        )));
    }
    let clips: Vec<ClipId> = sequence
        .require_track(track)?
        .clips()
        .iter()
        .map(|clip| clip.id)
        .collect();

    let mut clear = ClipEdit::new("Remove Track");
    if !clips.is_empty() {
        clear.replace(sequence, track, &clips, Vec::new());
    }
    clear.finalize(sequence);
    let mut changes = clear.take_changes();

    let emptied = sequence.require_track(track)?.clone();
    let removal = EditCommand::RemoveTracks(vec![PlacedTrack {
        index,
        track: emptied,
    }]);
    changes.merge(removal.apply(sequence));
    Ok(Applied::new(
        EditCommand::Batch {
            name: "Remove Track".into(),
            commands: vec![clear.into(), removal],
        },
        changes,
    ))
}

/// Remove every track without clips or transitions, keeping at least one
/// track of each kind. Returns `None` when no track qualifies.
pub fn remove_empty_tracks(sequence: &mut Sequence) -> Option<Applied> {
    let mut removed = Vec::new();
    for kind in [TrackKind::Video, TrackKind::Audio] {
        let tracks = sequence.tracks_of(kind);
        let empty: Vec<usize> = tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| !track.has_content())
            .map(|(index, _)| index)
            .collect();
        let keep_one = empty.len() == tracks.len();
        // Highest index first, so undo re-inserts in ascending order.
        for &index in empty.iter().skip(usize::from(keep_one)).rev() {
            removed.push(PlacedTrack {
                index,
                track: tracks[index].clone(),
            });
        }
    }
    if removed.is_empty() {
        return None;
    }
    debug!(count = removed.len(), "removing empty tracks");
    let command = EditCommand::RemoveTracks(removed);
    let changes = command.apply(sequence);
    Some(Applied::new(command, changes))
}

/// Link two equally long source clips in different tracks.
///
/// Existing links of either clip are replaced.
pub fn link(sequence: &mut Sequence, a: ClipId, b: ClipId) -> Result<Applied> {
    sequence.check_linkable(a, b)?;
    let command = EditCommand::Links {
        name: "Link".into(),
        changes: sequence.links().link_changes(a, b),
    };
    let changes = command.apply(sequence);
    Ok(Applied::new(command, changes))
}

/// Unlink a clip from its partner. Returns `None` if it has none.
pub fn unlink(sequence: &mut Sequence, clip: ClipId) -> Result<Option<Applied>> {
    sequence.require_clip(clip)?;
    let changes = sequence.links().unlink_changes(clip);
    if changes.is_empty() {
        return Ok(None);
    }
    let command = EditCommand::Links {
        name: "Unlink".into(),
        changes,
    };
    let applied = command.apply(sequence);
    Ok(Some(Applied::new(command, applied)))
}
