//! The editing session: a sequence, its undo history and its listeners.
//!
//! Every user-level operation goes through [`EditContext`]. Operations that
//! turn out impossible return `Ok(false)` and leave the history alone;
//! everything else is pushed as exactly one undo step and announced once.

use crossbeam_channel::Receiver;
use cutline_core::{CutlineError, Pts, Result};
use tracing::{debug, info};
use uuid::Uuid;

use crate::arrange;
use crate::clip::ClipId;
use crate::command::{Applied, UndoStack};
use crate::config::EditConfig;
use crate::delete::delete_clips;
use crate::drag::{DragOperation, DragTarget, ShiftInsert};
use crate::event::{Notifier, TimelineEvent};
use crate::offline::{mark_source_offline, mark_source_online};
use crate::sequence::Sequence;
use crate::split::{split_and_trim, split_at};
use crate::track::TrackKind;
use crate::transition::TransitionKind;
use crate::transitions;
use crate::trim::{trim, TrimSide};

/// A sequence being edited.
#[derive(Debug)]
pub struct EditContext {
    sequence: Sequence,
    history: UndoStack,
    config: EditConfig,
    notifier: Notifier,
}

impl EditContext {
    pub fn new(sequence: Sequence, config: EditConfig) -> Self {
        Self {
            history: UndoStack::new(config.undo_depth),
            sequence,
            config,
            notifier: Notifier::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn into_sequence(self) -> Sequence {
        self.sequence
    }

    /// Receive an event stream for views.
    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        self.notifier.subscribe()
    }

    // ── History ───────────────────────────────────────────────────

    fn commit(&mut self, applied: Applied) {
        self.sequence.assert_invariants();
        let events = applied.changes.events(&self.sequence);
        self.notifier.publish(&events);
        info!(command = applied.command.name(), events = events.len(), "command committed");
        self.history.push(applied.command);
    }

    fn commit_optional(&mut self, applied: Option<Applied>) -> bool {
        match applied {
            Some(applied) => {
                self.commit(applied);
                true
            }
            None => false,
        }
    }

    /// Undo the last command. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.history.undo() else {
            return false;
        };
        let changes = command.apply(&mut self.sequence);
        self.sequence.assert_invariants();
        self.notifier.publish(&changes.events(&self.sequence));
        info!(command = command.name(), "undo");
        true
    }

    /// Redo the last undone command.
    pub fn redo(&mut self) -> bool {
        let Some(command) = self.history.redo() else {
            return false;
        };
        let changes = command.apply(&mut self.sequence);
        self.sequence.assert_invariants();
        self.notifier.publish(&changes.events(&self.sequence));
        info!(command = command.name(), "redo");
        true
    }

    // ── Clip operations ───────────────────────────────────────────

    pub fn trim(&mut self, clip: ClipId, side: TrimSide, amount: Pts, shift: bool) -> Result<bool> {
        let edit = trim(&mut self.sequence, clip, side, amount, shift)?;
        Ok(self.commit_optional(edit.map(Applied::from)))
    }

    /// Create a transition at the cut `pts`, of the configured default
    /// length unless `length` is given.
    pub fn create_transition(
        &mut self,
        track: Uuid,
        pts: Pts,
        length: Option<Pts>,
        kind: TransitionKind,
    ) -> Result<bool> {
        let length = length.unwrap_or(self.config.default_transition_length);
        let applied = if self.config.make_room_for_transitions {
            transitions::create_transition_making_room(&mut self.sequence, track, pts, length, kind)?
        } else {
            transitions::create_transition(&mut self.sequence, track, pts, length, kind)?
                .map(Applied::from)
        };
        Ok(self.commit_optional(applied))
    }

    pub fn unapply_transition(&mut self, transition: ClipId) -> Result<()> {
        let edit = transitions::unapply_transition(&mut self.sequence, transition)?;
        self.commit(edit.into());
        Ok(())
    }

    pub fn remove_transition(&mut self, transition: ClipId) -> Result<()> {
        let edit = transitions::remove_transition(&mut self.sequence, transition)?;
        self.commit(edit.into());
        Ok(())
    }

    pub fn delete(&mut self, selection: &[ClipId], shift: bool) -> Result<bool> {
        let edit = delete_clips(&mut self.sequence, selection, shift)?;
        Ok(self.commit_optional(edit.map(Applied::from)))
    }

    pub fn split(&mut self, pts: Pts) -> Result<bool> {
        let edit = split_at(&mut self.sequence, pts)?;
        Ok(self.commit_optional(edit.map(Applied::from)))
    }

    pub fn split_and_trim(&mut self, pts: Pts, side: TrimSide) -> Result<bool> {
        let edit = split_and_trim(&mut self.sequence, pts, side)?;
        Ok(self.commit_optional(edit.map(Applied::from)))
    }

    pub fn mark_source_offline(&mut self, path: &str) -> bool {
        let edit = mark_source_offline(&mut self.sequence, path);
        self.commit_optional(edit.map(Applied::from))
    }

    pub fn mark_source_online(&mut self, path: &str) -> bool {
        let edit = mark_source_online(&mut self.sequence, path);
        self.commit_optional(edit.map(Applied::from))
    }

    // ── Tracks and links ──────────────────────────────────────────

    /// Add a track and return its id.
    pub fn add_track(&mut self, kind: TrackKind, index: usize) -> Uuid {
        let applied = arrange::add_track(&mut self.sequence, kind, index);
        let count = self.sequence.tracks_of(kind).len();
        let id = self
            .sequence
            .track_at(kind, index.min(count.saturating_sub(1)))
            .map(|track| track.id)
            .unwrap_or_default();
        self.commit(applied);
        id
    }

    pub fn remove_track(&mut self, track: Uuid) -> Result<()> {
        let applied = arrange::remove_track(&mut self.sequence, track)?;
        self.commit(applied);
        Ok(())
    }

    pub fn remove_empty_tracks(&mut self) -> bool {
        let applied = arrange::remove_empty_tracks(&mut self.sequence);
        self.commit_optional(applied)
    }

    pub fn link(&mut self, a: ClipId, b: ClipId) -> Result<()> {
        let applied = arrange::link(&mut self.sequence, a, b)?;
        self.commit(applied);
        Ok(())
    }

    pub fn unlink(&mut self, clip: ClipId) -> Result<bool> {
        let applied = arrange::unlink(&mut self.sequence, clip)?;
        Ok(self.commit_optional(applied))
    }

    /// Resize a track on screen. Not an edit, so it is not undoable.
    pub fn set_track_height(&mut self, track: Uuid, height: u32) -> Result<()> {
        let current = self
            .sequence
            .track_mut(track)
            .ok_or_else(|| CutlineError::NotFound(format!("track {track}")))?;
        if current.height == height {
            return Ok(());
        }
        current.height = height;
        debug!(%track, height, "track height changed");
        self.notifier
            .publish(&[TimelineEvent::TrackHeightChanged { track, height }]);
        Ok(())
    }

    // ── Drag and drop ─────────────────────────────────────────────

    pub fn begin_drag(&mut self, selection: &[ClipId], cursor: Pts) -> Result<DragOperation> {
        DragOperation::begin(&mut self.sequence, selection, cursor, &self.config)
    }

    /// Move a drag started with [`begin_drag`](Self::begin_drag).
    pub fn drag_to(
        &mut self,
        drag: &mut DragOperation,
        target: DragTarget,
        zoom: f32,
    ) -> Result<DragTarget> {
        let before = self.sequence.tracks().count();
        let snapped = drag.move_to(&mut self.sequence, target, zoom)?;
        if self.sequence.tracks().count() != before {
            self.notifier.publish(&[TimelineEvent::TracksChanged]);
        }
        Ok(snapped)
    }

    /// Drop the dragged clips, opening room first when `shift` is given.
    pub fn finish_drag(&mut self, drag: DragOperation, shift: Option<ShiftInsert>) -> Result<bool> {
        let applied = drag.commit(&mut self.sequence, shift)?;
        Ok(self.commit_optional(applied))
    }

    pub fn abort_drag(&mut self, drag: DragOperation) {
        let before = self.sequence.tracks().count();
        drag.abort(&mut self.sequence);
        if self.sequence.tracks().count() != before {
            self.notifier.publish(&[TimelineEvent::TracksChanged]);
        }
    }
}

impl Default for EditContext {
    fn default() -> Self {
        Self::new(Sequence::default(), EditConfig::default())
    }
}
