//! The replace engine.
//!
//! Every change to the clips of a sequence is a replacement of a contiguous
//! run of clips in one track by a new run. A [`ClipEdit`] plans its
//! replacements against the live sequence, so each step sees the result of
//! the ones before it, and records them as [`Move`]s. Replaying the moves
//! redoes the edit; replaying their inverses backwards undoes it.
//!
//! While planning, the edit remembers which clips stood in for which. Once
//! planning is done, [`ClipEdit::finalize`] cleans up the touched tracks and
//! moves the links of replaced clips onto their replacements.

use cutline_core::Pts;
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::clip::{Clip, ClipId, ClipKind};
use crate::event::ChangeSet;
use crate::link::{pair_replacements, LinkChange, ReplacementMap};
use crate::sequence::Sequence;
use crate::track::{Track, UNBOUNDED};
use crate::transition::{Transition, TransitionKind};

// ── Moves ───────────────────────────────────────────────────────

/// One replacement of a clip run in a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub track: Uuid,
    /// Clip directly after the replaced run, `None` at the track end.
    pub position: Option<ClipId>,
    pub remove: Vec<Clip>,
    pub add: Vec<Clip>,
}

impl Move {
    pub fn inverted(&self) -> Self {
        Self {
            track: self.track,
            position: self.position,
            remove: self.add.clone(),
            add: self.remove.clone(),
        }
    }
}

/// Index where the run of `mv` starts, if the track matches what it expects.
fn run_start(track: &Track, mv: &Move) -> Option<usize> {
    let start = match (mv.remove.first(), mv.position) {
        (Some(first), _) => track.index_of(first.id)?,
        (None, Some(position)) => track.index_of(position)?,
        (None, None) => track.len(),
    };
    let end = start + mv.remove.len();
    let run_matches = mv
        .remove
        .iter()
        .enumerate()
        .all(|(offset, clip)| track.get(start + offset).map(|c| c.id) == Some(clip.id));
    let position_matches = match mv.position {
        Some(position) => track.get(end).map(|c| c.id) == Some(position),
        None => end == track.len(),
    };
    (run_matches && position_matches).then_some(start)
}

/// Perform one move. A move whose clips are not where it expects them is
/// skipped, which keeps an edit from being applied twice.
fn apply_move(sequence: &mut Sequence, mv: &Move, changes: &mut ChangeSet) -> bool {
    let Some(track) = sequence.track_mut(mv.track) else {
        warn!(track = %mv.track, "replace skipped: track not found");
        return false;
    };
    let Some(start) = run_start(track, mv) else {
        warn!(
            track = %mv.track,
            removed = mv.remove.len(),
            added = mv.add.len(),
            "replace skipped: clips not where expected"
        );
        return false;
    };
    changes.touch(track);
    trace!(
        track = %mv.track,
        index = start,
        removed = mv.remove.len(),
        added = mv.add.len(),
        "replace"
    );
    track.splice(start..start + mv.remove.len(), mv.add.clone());
    true
}

// ── Shift helpers ───────────────────────────────────────────────

/// Gap that absorbs a shift of the content at or after `pts`.
///
/// `index` is the clip covering `pts`. The gap is either that clip or, when
/// `pts` is a cut, the clip ending there.
fn shift_gap(track: &Track, pts: Pts, index: usize) -> Option<usize> {
    if track.clips()[index].is_empty_clip() {
        return Some(index);
    }
    if track.left_pts(index) == pts {
        let prev = index.checked_sub(1)?;
        if track.clips()[prev].is_empty_clip() {
            return Some(prev);
        }
    }
    None
}

/// Whether a gap may be opened right before the clip at `index`.
fn is_free_cut(track: &Track, index: usize) -> bool {
    match &track.clips()[index].kind {
        ClipKind::Transition(transition) => transition.left == 0,
        _ => track.in_transition(index).is_none(),
    }
}

/// How far the content of `track` at or after `pts` may be shifted,
/// as `(most negative, most positive)`.
///
/// Shifting left eats into a gap touching `pts`; shifting right needs a gap
/// or a cut that no transition spans.
pub fn shift_room(track: &Track, pts: Pts) -> (Pts, Pts) {
    let Some(index) = track.index_at(pts) else {
        return (-UNBOUNDED, UNBOUNDED);
    };
    match shift_gap(track, pts, index) {
        Some(gap) => (-track.clips()[gap].length(), UNBOUNDED),
        None if track.left_pts(index) == pts && is_free_cut(track, index) => (0, UNBOUNDED),
        None => (0, 0),
    }
}

/// Handles of the clips starting in `[left, right)`, plus the clip after
/// them (`None` at the track end).
pub fn find_clips(track: &Track, left: Pts, right: Pts) -> (Vec<ClipId>, Option<ClipId>) {
    let range = covered_range(track, left, right);
    let run = track.clips()[range.clone()].iter().map(|clip| clip.id).collect();
    (run, track.get(range.end).map(|clip| clip.id))
}

/// Index range of the clips starting in `[left, right)`.
///
/// Zero-length clips at `left` keep supplying the transition before them
/// and are left out.
pub(crate) fn covered_range(track: &Track, left: Pts, right: Pts) -> Range<usize> {
    let first = track.index_from(left);
    let start = match track.get(first) {
        Some(clip) if clip.length() == 0 => track.next_visible(first).unwrap_or(track.len()),
        _ => first,
    };
    let end = (start..track.len())
        .find(|index| track.left_pts(*index) >= right)
        .unwrap_or(track.len());
    start..end
}

/// Transition of `clip`'s link partner on the given side.
fn linked_transition(sequence: &Sequence, clip: ClipId, outgoing: bool) -> Option<ClipId> {
    let partner = sequence.link_of(clip)?;
    let location = sequence.locate(partner)?;
    let track = sequence.track(location.track)?;
    let index = if outgoing {
        track.out_transition(location.index)?
    } else {
        track.in_transition(location.index)?
    };
    Some(track.clips()[index].id)
}

/// `transition` plus every transition mirroring it at linked clips.
///
/// Linked clips must keep equal lengths and equal transitions, so changing
/// one transition means changing all of these together.
pub fn transition_closure(sequence: &Sequence, transition: ClipId) -> Vec<ClipId> {
    let mut found = Vec::new();
    let mut seen = BTreeSet::new();
    let mut pending = vec![transition];
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(location) = sequence.locate(id) else {
            continue;
        };
        let Some(track) = sequence.track(location.track) else {
            continue;
        };
        let Some(current) = track.clips()[location.index].as_transition() else {
            continue;
        };
        found.push(id);
        if current.left > 0 {
            let prev = location.index.checked_sub(1).and_then(|i| track.get(i));
            if let Some(mirror) = prev.and_then(|prev| linked_transition(sequence, prev.id, true)) {
                pending.push(mirror);
            }
        }
        if current.right > 0 {
            let next = track.get(location.index + 1);
            if let Some(mirror) = next.and_then(|next| linked_transition(sequence, next.id, false)) {
                pending.push(mirror);
            }
        }
    }
    found
}

/// First run of gaps in `track` that must be merged or dropped.
fn empty_run_to_merge(track: &Track) -> Option<Range<usize>> {
    let clips = track.clips();
    let mut index = 0;
    while index < clips.len() {
        if !clips[index].is_empty_clip() {
            index += 1;
            continue;
        }
        let mut end = index + 1;
        while end < clips.len() && clips[end].is_empty_clip() {
            end += 1;
        }
        if end - index > 1 || clips[index].length() == 0 {
            return Some(index..end);
        }
        index = end;
    }
    None
}

// ── ClipEdit ────────────────────────────────────────────────────

/// A reversible change to the clips and links of a sequence.
#[derive(Debug, Clone, Default)]
pub struct ClipEdit {
    name: String,
    moves: Vec<Move>,
    links: Vec<LinkChange>,
    /// Planning state, dropped by `finalize`.
    replacements: ReplacementMap,
    /// Tracks touched while planning.
    changes: ChangeSet,
    finalized: bool,
}

impl ClipEdit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn link_changes(&self) -> &[LinkChange] {
        &self.links
    }

    /// True when the edit changes nothing.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.links.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Tracks touched while planning, handed over once.
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    // ── Planning primitives ───────────────────────────────────────

    fn do_move(&mut self, sequence: &mut Sequence, mv: Move) -> bool {
        debug_assert!(!self.finalized, "edit '{}' planned after finalize", self.name);
        if mv.remove.is_empty() && mv.add.is_empty() {
            return true;
        }
        if apply_move(sequence, &mv, &mut self.changes) {
            self.moves.push(mv);
            true
        } else {
            false
        }
    }

    fn build_move(
        sequence: &Sequence,
        track: Uuid,
        old_run: &[ClipId],
        new_run: Vec<Clip>,
    ) -> Option<Move> {
        let current = sequence.track(track)?;
        let start = current.index_of(*old_run.first()?)?;
        let end = start + old_run.len();
        let remove = current.clips().get(start..end)?.to_vec();
        if remove.iter().zip(old_run).any(|(clip, id)| clip.id != *id) {
            return None;
        }
        Some(Move {
            track,
            position: current.get(end).map(|clip| clip.id),
            remove,
            add: new_run,
        })
    }

    /// Replace the contiguous run `old_run` of `track` by `new_run`.
    ///
    /// The new run stands in for the first linkable clip of the old one
    /// when links are moved over at the end of the edit. Returns `false`
    /// and changes nothing if the run is not in the track.
    pub fn replace(
        &mut self,
        sequence: &mut Sequence,
        track: Uuid,
        old_run: &[ClipId],
        new_run: Vec<Clip>,
    ) -> bool {
        let Some(mv) = Self::build_move(sequence, track, old_run, new_run) else {
            debug!(edit = %self.name, %track, run = old_run.len(), "replace skipped: run not found");
            return false;
        };
        let removed: Vec<(ClipId, bool)> = mv
            .remove
            .iter()
            .map(|clip| (clip.id, clip.is_linkable()))
            .collect();
        let added: Vec<ClipId> = mv.add.iter().map(|clip| clip.id).collect();
        if !self.do_move(sequence, mv) {
            return false;
        }
        let mut stand_in = Some(added);
        for (original, linkable) in removed {
            let replacements = if linkable { stand_in.take() } else { None };
            self.replacements
                .record(original, replacements.as_deref().unwrap_or_default());
        }
        true
    }

    /// Replace one clip, wherever it is.
    pub fn replace_clip(
        &mut self,
        sequence: &mut Sequence,
        original: ClipId,
        replacements: Vec<Clip>,
    ) -> bool {
        match sequence.locate(original) {
            Some(location) => self.replace(sequence, location.track, &[original], replacements),
            None => {
                debug!(edit = %self.name, clip = %original, "replace skipped: clip not found");
                false
            }
        }
    }

    /// Replace a run without recording what stands in for it.
    pub(crate) fn replace_unmapped(
        &mut self,
        sequence: &mut Sequence,
        track: Uuid,
        old_run: &[ClipId],
        new_run: Vec<Clip>,
    ) -> bool {
        match Self::build_move(sequence, track, old_run, new_run) {
            Some(mv) => self.do_move(sequence, mv),
            None => false,
        }
    }

    /// Insert clips before `before`, or at the end of the track.
    pub fn insert(
        &mut self,
        sequence: &mut Sequence,
        track: Uuid,
        before: Option<ClipId>,
        clips: Vec<Clip>,
    ) -> bool {
        self.do_move(
            sequence,
            Move {
                track,
                position: before,
                remove: Vec::new(),
                add: clips,
            },
        )
    }

    /// Declare that `replacements` stand in for `original`.
    ///
    /// For edits that remove a clip and put its replacement somewhere else.
    pub(crate) fn record_replacement(&mut self, original: ClipId, replacements: &[ClipId]) {
        self.replacements.record(original, replacements);
    }

    /// Clips currently standing in for `id`.
    pub fn latest(&self, id: ClipId) -> Vec<ClipId> {
        self.replacements.latest(id)
    }

    /// The single clip standing in for `id`, if there is exactly one.
    pub fn current(&self, id: ClipId) -> Option<ClipId> {
        match self.latest(id).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    // ── Composite steps ───────────────────────────────────────────

    /// Make sure `pts` is a cut in `track`.
    ///
    /// A transition spanning `pts` is unapplied first.
    pub fn split(&mut self, sequence: &mut Sequence, track: Uuid, pts: Pts) -> bool {
        for _ in 0..2 {
            let Some(current) = sequence.track(track) else {
                return false;
            };
            let Some(index) = current.index_at(pts) else {
                return true;
            };
            let left = current.left_pts(index);
            if left == pts {
                return true;
            }
            let clip = current.clips()[index].clone();
            if clip.is_transition() {
                self.unapply_transition(sequence, clip.id);
                continue;
            }
            let head = pts - left;
            let mut first = sequence.replica(&clip);
            first.adjust_end(head - clip.length());
            let mut second = sequence.replica(&clip);
            second.adjust_begin(head);
            return self.replace_clip(sequence, clip.id, vec![first, second]);
        }
        false
    }

    /// Shift the content at or after `pts` in each of `tracks` by `amount`.
    ///
    /// Callers bound `amount` with [`shift_room`]; a track without room is
    /// left alone.
    pub fn shift_tracks(&mut self, sequence: &mut Sequence, tracks: &[Uuid], pts: Pts, amount: Pts) {
        if amount == 0 {
            return;
        }
        for &track_id in tracks {
            let Some(track) = sequence.track(track_id) else {
                continue;
            };
            let Some(index) = track.index_at(pts) else {
                continue;
            };
            if let Some(gap) = shift_gap(track, pts, index) {
                let gap = &track.clips()[gap];
                let (gap_id, length) = (gap.id, gap.length() + amount);
                if length < 0 {
                    warn!(track = %track_id, pts, amount, "shift skipped: gap too small");
                    continue;
                }
                let replacement = if length > 0 {
                    vec![sequence.new_empty(length)]
                } else {
                    Vec::new()
                };
                self.replace_unmapped(sequence, track_id, &[gap_id], replacement);
            } else if amount > 0 && track.left_pts(index) == pts && is_free_cut(track, index) {
                let before = track.clips()[index].id;
                let gap = sequence.new_empty(amount);
                self.insert(sequence, track_id, Some(before), vec![gap]);
            } else {
                warn!(track = %track_id, pts, amount, "shift skipped: no room");
            }
        }
    }

    /// Shift every track of the sequence except `except`.
    pub fn shift_all_tracks(&mut self, sequence: &mut Sequence, except: &[Uuid], pts: Pts, amount: Pts) {
        let tracks: Vec<Uuid> = sequence
            .track_ids()
            .into_iter()
            .filter(|id| !except.contains(id))
            .collect();
        self.shift_tracks(sequence, &tracks, pts, amount);
    }

    /// Insert a transition between `prev` and `next` in `track`, taking
    /// `left` ticks from `prev` and `right` ticks from `next`.
    ///
    /// The caller checks that both clips can give that much.
    #[allow(clippy::too_many_arguments)]
    pub fn make_transition(
        &mut self,
        sequence: &mut Sequence,
        track: Uuid,
        prev: Option<ClipId>,
        next: Option<ClipId>,
        left: Pts,
        right: Pts,
        kind: TransitionKind,
    ) -> Option<ClipId> {
        if left < 0 || right < 0 || left + right == 0 {
            return None;
        }
        let mut prev = prev;
        let mut next = next;
        if left > 0 {
            let original = sequence.clip(prev?)?.clone();
            let mut shortened = sequence.replica(&original);
            shortened.adjust_end(-left);
            prev = Some(shortened.id);
            if !self.replace_clip(sequence, original.id, vec![shortened]) {
                return None;
            }
        }
        if right > 0 {
            let original = sequence.clip(next?)?.clone();
            let mut shortened = sequence.replica(&original);
            shortened.adjust_begin(right);
            next = Some(shortened.id);
            if !self.replace_clip(sequence, original.id, vec![shortened]) {
                return None;
            }
        }
        let before = match prev {
            Some(prev) => {
                let current = sequence.track(track)?;
                let index = current.index_of(prev)?;
                current.get(index + 1).map(|clip| clip.id)
            }
            None => next,
        };
        let transition = sequence.new_clip(ClipKind::Transition(
            Transition::new(left, right).with_kind(kind),
        ));
        let id = transition.id;
        self.insert(sequence, track, before, vec![transition])
            .then_some(id)
    }

    fn unapply_one(&mut self, sequence: &mut Sequence, transition: ClipId) {
        let Some(location) = sequence.locate(transition) else {
            return;
        };
        let Some(track) = sequence.track(location.track) else {
            return;
        };
        let Some(sides) = track.clips()[location.index].as_transition().cloned() else {
            return;
        };
        let prev = (sides.left > 0)
            .then(|| location.index.checked_sub(1).and_then(|i| track.get(i)))
            .flatten()
            .cloned();
        let next = (sides.right > 0)
            .then(|| track.get(location.index + 1))
            .flatten()
            .cloned();
        if let Some(prev) = prev {
            let mut extended = sequence.replica(&prev);
            extended.adjust_end(sides.left);
            self.replace_clip(sequence, prev.id, vec![extended]);
        }
        if let Some(next) = next {
            let mut extended = sequence.replica(&next);
            extended.adjust_begin(-sides.right);
            self.replace_clip(sequence, next.id, vec![extended]);
        }
        self.replace_clip(sequence, transition, Vec::new());
    }

    /// Remove a transition and give its ticks back to the clips that
    /// supplied them, together with its mirrors at linked clips.
    pub fn unapply_transition(&mut self, sequence: &mut Sequence, transition: ClipId) {
        for id in transition_closure(sequence, transition) {
            self.unapply_one(sequence, id);
        }
    }

    /// Replace a transition and its mirrors by gaps.
    pub fn remove_transition(&mut self, sequence: &mut Sequence, transition: ClipId) {
        for id in transition_closure(sequence, transition) {
            self.replace_with_empty(sequence, &[id]);
        }
    }

    /// Replace each clip by a gap of the same length.
    pub fn replace_with_empty(&mut self, sequence: &mut Sequence, clips: &[ClipId]) {
        for &id in clips {
            let Some(length) = sequence.clip(id).map(Clip::length) else {
                continue;
            };
            let replacement = if length > 0 {
                vec![sequence.new_empty(length)]
            } else {
                Vec::new()
            };
            self.replace_clip(sequence, id, replacement);
        }
    }

    // ── Finalization ──────────────────────────────────────────────

    /// Finish planning: tidy the touched tracks and fix up links.
    pub fn finalize(&mut self, sequence: &mut Sequence) {
        if self.finalized {
            return;
        }
        let touched: Vec<Uuid> = self.changes.touched_tracks().collect();
        self.drop_orphaned_clips(sequence, &touched);
        self.merge_empty_clips(sequence, &touched);
        self.avoid_dangling_links(sequence);
        self.relink(sequence);
        self.replacements = ReplacementMap::default();
        self.finalized = true;
        debug!(
            edit = %self.name,
            moves = self.moves.len(),
            link_changes = self.links.len(),
            "edit finalized"
        );
    }

    /// Zero-length source clips only exist to supply a transition.
    fn drop_orphaned_clips(&mut self, sequence: &mut Sequence, tracks: &[Uuid]) {
        for &track_id in tracks {
            loop {
                let Some(track) = sequence.track(track_id) else {
                    break;
                };
                let orphan = track
                    .clips()
                    .iter()
                    .enumerate()
                    .find(|(index, clip)| {
                        clip.is_source() && clip.length() == 0 && !track.is_part_of_transition(*index)
                    })
                    .map(|(_, clip)| clip.id);
                match orphan {
                    Some(id) if self.replace_clip(sequence, id, Vec::new()) => {}
                    _ => break,
                }
            }
        }
    }

    /// Coalesce adjacent gaps and drop zero-length ones.
    pub(crate) fn merge_empty_clips(&mut self, sequence: &mut Sequence, tracks: &[Uuid]) {
        for &track_id in tracks {
            loop {
                let Some(track) = sequence.track(track_id) else {
                    break;
                };
                let Some(run) = empty_run_to_merge(track) else {
                    break;
                };
                let ids: Vec<ClipId> = track.clips()[run.clone()].iter().map(|c| c.id).collect();
                let total: Pts = track.clips()[run].iter().map(Clip::length).sum();
                let merged = if total > 0 {
                    vec![sequence.new_empty(total)]
                } else {
                    Vec::new()
                };
                if !self.replace_unmapped(sequence, track_id, &ids, merged) {
                    break;
                }
            }
        }
    }

    /// A replaced clip's partner is replaced too, so the link can move to
    /// the replacements on both sides.
    fn avoid_dangling_links(&mut self, sequence: &mut Sequence) {
        for original in self.replacements.originals() {
            let Some(partner) = sequence.link_of(original) else {
                continue;
            };
            if self.replacements.contains(partner) {
                continue;
            }
            let Some(clip) = sequence.clip(partner).cloned() else {
                continue;
            };
            let replica = sequence.replica(&clip);
            self.replace_clip(sequence, partner, vec![replica]);
        }
    }

    fn set_link(&mut self, sequence: &mut Sequence, clip: ClipId, partner: Option<ClipId>) {
        let before = sequence.links().partner(clip);
        if before == partner {
            return;
        }
        let change = LinkChange::new(clip, before, partner);
        sequence.links_mut().apply(&change);
        self.links.push(change);
    }

    fn relink(&mut self, sequence: &mut Sequence) {
        let expanded = self.replacements.expand();
        let mut unlinked = Vec::new();
        let mut pairs = Vec::new();
        for (original, stand_ins) in &expanded {
            let Some(partner) = sequence.link_of(*original) else {
                continue;
            };
            unlinked.push((*original, partner));
            if *original > partner {
                continue;
            }
            if let Some(partner_stand_ins) = expanded.get(&partner) {
                let left: Vec<&Clip> = stand_ins.iter().filter_map(|id| sequence.clip(*id)).collect();
                let right: Vec<&Clip> = partner_stand_ins
                    .iter()
                    .filter_map(|id| sequence.clip(*id))
                    .collect();
                pairs.extend(pair_replacements(&left, &right));
            }
        }
        for (original, partner) in unlinked {
            self.set_link(sequence, original, None);
            if sequence.link_of(partner) == Some(original) {
                self.set_link(sequence, partner, None);
            }
        }
        for (a, b) in pairs {
            self.set_link(sequence, a, Some(b));
            self.set_link(sequence, b, Some(a));
        }
    }

    /// Undo everything planned so far and start over.
    pub fn revert(&mut self, sequence: &mut Sequence) {
        for change in self.links.iter().rev() {
            sequence.links_mut().apply(&change.inverted());
        }
        for mv in self.moves.iter().rev() {
            if !apply_move(sequence, &mv.inverted(), &mut self.changes) {
                warn!(edit = %self.name, "revert step skipped");
            }
        }
        self.moves.clear();
        self.links.clear();
        self.replacements = ReplacementMap::default();
        self.finalized = false;
    }

    // ── Replay ────────────────────────────────────────────────────

    /// Replay the recorded moves and link changes.
    pub fn apply(&self, sequence: &mut Sequence) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for mv in &self.moves {
            if !apply_move(sequence, mv, &mut changes) {
                warn!(edit = %self.name, "step skipped on replay");
            }
        }
        for change in &self.links {
            sequence.links_mut().apply(change);
        }
        changes
    }

    /// The edit that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            name: self.name.clone(),
            moves: self.moves.iter().rev().map(Move::inverted).collect(),
            links: self.links.iter().rev().map(LinkChange::inverted).collect(),
            replacements: ReplacementMap::default(),
            changes: ChangeSet::new(),
            finalized: true,
        }
    }
}
