//! Dragging clips to another time or track.
//!
//! A drag runs as a session: [`DragOperation::begin`] lifts nothing yet but
//! unapplies transitions that would lose a neighbour, [`DragOperation::move_to`]
//! follows the pointer (snapping and creating tracks on demand), and
//! [`DragOperation::commit`] or [`DragOperation::abort`] ends it.

use cutline_core::{CutlineError, Pts, Result};
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::arrange::track_name;
use crate::clip::{Clip, ClipId};
use crate::command::{Applied, EditCommand, PlacedTrack};
use crate::config::EditConfig;
use crate::edit::{covered_range, ClipEdit};
use crate::sequence::Sequence;
use crate::snapping::{SnapPoint, SnappingEngine};
use crate::track::{Track, TrackKind};

/// Where a drag points, relative to where it started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragTarget {
    pub delta: Pts,
    pub video_offset: isize,
    pub audio_offset: isize,
}

impl DragTarget {
    pub fn new(delta: Pts, video_offset: isize, audio_offset: isize) -> Self {
        Self {
            delta,
            video_offset,
            audio_offset,
        }
    }

    fn offset(&self, kind: TrackKind) -> isize {
        match kind {
            TrackKind::Video => self.video_offset,
            TrackKind::Audio => self.audio_offset,
        }
    }

    fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Room opened in every track before the dragged clips land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftInsert {
    pub pts: Pts,
    pub length: Pts,
}

/// Adjacent dragged clips of one track; they move as a block.
#[derive(Debug, Clone)]
struct DraggedGroup {
    kind: TrackKind,
    track_index: usize,
    source_track: Uuid,
    left: Pts,
    clips: Vec<Clip>,
}

impl DraggedGroup {
    fn length(&self) -> Pts {
        self.clips.iter().map(Clip::length).sum()
    }

    fn right(&self) -> Pts {
        self.left + self.length()
    }

    fn destination(&self, target: &DragTarget) -> Option<usize> {
        usize::try_from(self.track_index as isize + target.offset(self.kind)).ok()
    }
}

/// A drag in progress.
#[derive(Debug)]
pub struct DragOperation {
    edit: ClipEdit,
    groups: Vec<DraggedGroup>,
    snapping: SnappingEngine,
    snap_points: Vec<SnapPoint>,
    target: DragTarget,
    /// Tracks created for the current target, in creation order.
    speculative: Vec<PlacedTrack>,
}

impl DragOperation {
    /// Start dragging `selection` together with the link partners of its
    /// clips.
    ///
    /// Transitions whose suppliers all move go along. A transition between
    /// a dragged and a staying clip is unapplied right away.
    pub fn begin(
        sequence: &mut Sequence,
        selection: &[ClipId],
        cursor: Pts,
        config: &EditConfig,
    ) -> Result<Self> {
        let mut sources = BTreeSet::new();
        for &id in selection {
            let clip = sequence
                .clip(id)
                .ok_or_else(|| CutlineError::NotFound(format!("{id}")))?;
            if clip.is_source() {
                sources.insert(id);
                sources.extend(sequence.link_of(id));
            }
        }
        if sources.is_empty() {
            return Err(CutlineError::InvalidParameter("nothing to drag".into()));
        }

        let (carried, loose) = classify_transitions(sequence, &sources);
        let mut edit = ClipEdit::new("Move Clips");
        for transition in loose {
            if sequence.locate(transition).is_some() {
                edit.unapply_transition(sequence, transition);
            }
        }
        let mut dragged: BTreeSet<ClipId> =
            sources.iter().flat_map(|id| edit.latest(*id)).collect();
        dragged.extend(carried);

        let groups = collect_groups(sequence, &dragged);
        let snapping = SnappingEngine::from_config(config);
        let snap_points = snapping.collect_snap_points(sequence, cursor, &dragged);
        debug!(
            clips = dragged.len(),
            groups = groups.len(),
            unapplied = !edit.is_empty(),
            "drag started"
        );
        Ok(Self {
            edit,
            groups,
            snapping,
            snap_points,
            target: DragTarget::default(),
            speculative: Vec::new(),
        })
    }

    pub fn target(&self) -> DragTarget {
        self.target
    }

    /// Number of clips and transitions being dragged.
    pub fn dragged_count(&self) -> usize {
        self.groups.iter().map(|group| group.clips.len()).sum()
    }

    /// Follow the pointer to `target`; `zoom` is pixels per tick.
    ///
    /// Returns the target after snapping and clamping at the sequence
    /// start. Tracks past the last one are created as needed and dropped
    /// again when the drag leaves them.
    pub fn move_to(
        &mut self,
        sequence: &mut Sequence,
        target: DragTarget,
        zoom: f32,
    ) -> Result<DragTarget> {
        if let Some(group) = self.groups.iter().find(|g| g.destination(&target).is_none()) {
            return Err(CutlineError::InvalidParameter(format!(
                "no {:?} track {} positions below {}",
                group.kind,
                target.offset(group.kind).unsigned_abs(),
                group.track_index
            )));
        }
        let edges: Vec<Pts> = self
            .groups
            .iter()
            .flat_map(|group| [group.left + target.delta, group.right() + target.delta])
            .collect();
        let earliest = self.groups.iter().map(|group| group.left).min().unwrap_or(0);
        let delta = (target.delta + self.snapping.snap_edges(&edges, &self.snap_points, zoom))
            .max(-earliest);
        let snapped = DragTarget { delta, ..target };
        self.update_speculative_tracks(sequence, &snapped);
        self.target = snapped;
        Ok(snapped)
    }

    fn update_speculative_tracks(&mut self, sequence: &mut Sequence, target: &DragTarget) {
        for kind in [TrackKind::Video, TrackKind::Audio] {
            let needed = self
                .groups
                .iter()
                .filter(|group| group.kind == kind)
                .filter_map(|group| group.destination(target))
                .map(|index| index + 1)
                .max()
                .unwrap_or(0);
            loop {
                let existing = sequence.tracks_of(kind).len();
                if existing < needed {
                    let placed = PlacedTrack {
                        index: existing,
                        track: Track::new(kind, track_name(kind, existing + 1)),
                    };
                    debug!(track = %placed.track.name, "speculative track added");
                    EditCommand::AddTracks(vec![placed.clone()]).apply(sequence);
                    self.speculative.push(placed);
                    continue;
                }
                let last = self.speculative.iter().rposition(|p| p.track.kind == kind);
                match last {
                    Some(position) if existing > needed => {
                        let placed = self.speculative.remove(position);
                        debug!(track = %placed.track.name, "speculative track dropped");
                        EditCommand::RemoveTracks(vec![placed]).apply(sequence);
                    }
                    _ => break,
                }
            }
        }
    }

    /// Cancel the drag, restoring the sequence exactly.
    pub fn abort(mut self, sequence: &mut Sequence) {
        self.edit.revert(sequence);
        if !self.speculative.is_empty() {
            EditCommand::RemoveTracks(self.speculative.into_iter().rev().collect()).apply(sequence);
        }
        debug!("drag aborted");
    }

    /// Open `shift.length` ticks of room at `shift.pts` in every track,
    /// then drop.
    pub fn drop_with_shift(
        self,
        sequence: &mut Sequence,
        shift: ShiftInsert,
    ) -> Result<Option<Applied>> {
        self.commit(sequence, Some(shift))
    }

    /// Drop the clips at the current target, overwriting what is there.
    ///
    /// With `shift`, room is first opened in every track. Returns `None`
    /// when the drag ends where it started.
    pub fn commit(
        mut self,
        sequence: &mut Sequence,
        shift: Option<ShiftInsert>,
    ) -> Result<Option<Applied>> {
        if self.target.is_identity() && shift.is_none() {
            self.abort(sequence);
            return Ok(None);
        }
        if let Err(e) = self.plan_drop(sequence, shift) {
            self.abort(sequence);
            return Err(e);
        }
        self.edit.finalize(sequence);
        let mut changes = self.edit.take_changes();
        let clips = EditCommand::from(self.edit);
        let command = if self.speculative.is_empty() {
            clips
        } else {
            changes.mark_tracks_changed();
            EditCommand::Batch {
                name: "Move Clips".into(),
                commands: vec![EditCommand::AddTracks(self.speculative), clips],
            }
        };
        info!(
            delta = self.target.delta,
            video_offset = self.target.video_offset,
            audio_offset = self.target.audio_offset,
            "clips moved"
        );
        Ok(Some(Applied::new(command, changes)))
    }

    fn plan_drop(&mut self, sequence: &mut Sequence, shift: Option<ShiftInsert>) -> Result<()> {
        let target = self.target;
        for group in &self.groups {
            let ids: Vec<ClipId> = group.clips.iter().map(|clip| clip.id).collect();
            let length = group.length();
            let gap = if length > 0 {
                vec![sequence.new_empty(length)]
            } else {
                Vec::new()
            };
            self.edit.replace_unmapped(sequence, group.source_track, &ids, gap);
        }

        if let Some(insert) = shift.filter(|insert| insert.length > 0) {
            let tracks = sequence.track_ids();
            for &track in &tracks {
                self.edit.split(sequence, track, insert.pts);
            }
            self.edit.shift_tracks(sequence, &tracks, insert.pts, insert.length);
        }

        for group in &self.groups {
            let track = group
                .destination(&target)
                .and_then(|index| sequence.track_at(group.kind, index))
                .map(|track| track.id)
                .ok_or_else(|| {
                    CutlineError::NotFound(format!("{:?} track for drop", group.kind))
                })?;
            let mut replicas = Vec::with_capacity(group.clips.len());
            for clip in &group.clips {
                let replica = sequence.replica(clip);
                if clip.is_linkable() {
                    self.edit.record_replacement(clip.id, &[replica.id]);
                }
                replicas.push(replica);
            }
            place(&mut self.edit, sequence, track, group.left + target.delta, replicas)?;
        }
        Ok(())
    }
}

/// Split the transitions next to `sources` into those moving along and
/// those losing a supplier.
fn classify_transitions(
    sequence: &Sequence,
    sources: &BTreeSet<ClipId>,
) -> (BTreeSet<ClipId>, Vec<ClipId>) {
    let mut carried = BTreeSet::new();
    let mut loose = Vec::new();
    for &id in sources {
        let Some(location) = sequence.locate(id) else {
            continue;
        };
        let Some(track) = sequence.track(location.track) else {
            continue;
        };
        let sides = [
            track.in_transition(location.index),
            track.out_transition(location.index),
        ];
        for index in sides.into_iter().flatten() {
            let clip = &track.clips()[index];
            let Some(transition) = clip.as_transition() else {
                continue;
            };
            let moves = |neighbour: Option<&Clip>| neighbour.is_some_and(|c| sources.contains(&c.id));
            let prev = index.checked_sub(1).and_then(|i| track.get(i));
            let all_move = (transition.left == 0 || moves(prev))
                && (transition.right == 0 || moves(track.get(index + 1)));
            if all_move {
                carried.insert(clip.id);
            } else if !loose.contains(&clip.id) {
                loose.push(clip.id);
            }
        }
    }
    (carried, loose)
}

fn collect_groups(sequence: &Sequence, dragged: &BTreeSet<ClipId>) -> Vec<DraggedGroup> {
    let mut groups = Vec::new();
    for track in sequence.tracks() {
        let Some((kind, track_index)) = sequence.track_position(track.id) else {
            continue;
        };
        let mut current: Option<DraggedGroup> = None;
        for (index, clip) in track.clips().iter().enumerate() {
            if !dragged.contains(&clip.id) {
                groups.extend(current.take());
                continue;
            }
            match current.as_mut() {
                Some(group) => group.clips.push(clip.clone()),
                None => {
                    current = Some(DraggedGroup {
                        kind,
                        track_index,
                        source_track: track.id,
                        left: track.left_pts(index),
                        clips: vec![clip.clone()],
                    })
                }
            }
        }
        groups.extend(current);
    }
    groups
}

/// Put `clips` into `track` starting at `left`, overwriting what is there.
///
/// Overwritten clips lose their links. A transition next to the dropped
/// run is replaced by a gap when one of its suppliers is overwritten or
/// when it would touch a dropped transition.
fn place(
    edit: &mut ClipEdit,
    sequence: &mut Sequence,
    track_id: Uuid,
    left: Pts,
    clips: Vec<Clip>,
) -> Result<()> {
    let right = left + clips.iter().map(Clip::length).sum::<Pts>();
    let starts_with_transition = clips.first().is_some_and(Clip::is_transition);
    let ends_with_transition = clips.last().is_some_and(Clip::is_transition);

    if sequence.require_track(track_id)?.length() > left {
        edit.split(sequence, track_id, left);
        edit.split(sequence, track_id, right);
    }
    let track = sequence.require_track(track_id)?;
    let range = covered_range(track, left, right);
    let mut doomed = Vec::new();
    if let Some(prev) = range.start.checked_sub(1).and_then(|index| track.get(index)) {
        let fades_in = prev
            .as_transition()
            .is_some_and(|t| (t.right > 0 && !range.is_empty()) || starts_with_transition);
        if fades_in {
            doomed.push(prev.id);
        }
    }
    doomed.extend(
        track.clips()[range.clone()]
            .iter()
            .filter(|clip| clip.is_transition())
            .map(|clip| clip.id),
    );
    if let Some(next) = track.get(range.end) {
        if next
            .as_transition()
            .is_some_and(|t| t.left > 0 || ends_with_transition)
        {
            doomed.push(next.id);
        }
    }
    // Partners lose the same transitions; their orphaned suppliers go at finalize.
    for id in doomed {
        edit.remove_transition(sequence, id);
    }

    let track = sequence.require_track(track_id)?;
    let track_length = track.length();
    let range = covered_range(track, left, right);
    let old_run: Vec<ClipId> = track.clips()[range.clone()].iter().map(|clip| clip.id).collect();
    let overwritten: Vec<ClipId> = track.clips()[range.clone()]
        .iter()
        .filter(|clip| clip.is_linkable())
        .map(|clip| clip.id)
        .collect();
    let before = track.get(range.end).map(|clip| clip.id);

    let mut new_run = Vec::with_capacity(clips.len() + 1);
    if track_length < left {
        new_run.push(sequence.new_empty(left - track_length));
    }
    new_run.extend(clips);
    for id in overwritten {
        edit.record_replacement(id, &[]);
    }
    if old_run.is_empty() {
        edit.insert(sequence, track_id, before, new_run);
    } else {
        edit.replace_unmapped(sequence, track_id, &old_run, new_run);
    }
    Ok(())
}
