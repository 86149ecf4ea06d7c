//! Edit commands with undo/redo support.
//!
//! Uses the Command pattern: every committed change is an `EditCommand`
//! that knows how to apply itself and produce its inverse for undo. Clip
//! changes are planned by a [`ClipEdit`] against the live sequence, so a
//! command is pushed already applied and only replayed on undo or redo.

use tracing::warn;

use crate::edit::ClipEdit;
use crate::event::ChangeSet;
use crate::link::LinkChange;
use crate::sequence::Sequence;
use crate::track::Track;

/// A track together with its index among the tracks of its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTrack {
    pub index: usize,
    pub track: Track,
}

/// A reversible edit operation on a sequence.
#[derive(Debug, Clone)]
pub enum EditCommand {
    /// Clip replacements and the link changes that came with them.
    Clips(ClipEdit),
    /// Insert tracks, in order.
    AddTracks(Vec<PlacedTrack>),
    /// Remove tracks, in order.
    RemoveTracks(Vec<PlacedTrack>),
    /// Link or unlink clips.
    Links {
        name: String,
        changes: Vec<LinkChange>,
    },
    /// Commands applied as one undo step.
    Batch {
        name: String,
        commands: Vec<EditCommand>,
    },
}

impl EditCommand {
    /// Human-readable name for menus.
    pub fn name(&self) -> &str {
        match self {
            Self::Clips(edit) => edit.name(),
            Self::AddTracks(_) => "Add Track",
            Self::RemoveTracks(_) => "Remove Track",
            Self::Links { name, .. } | Self::Batch { name, .. } => name,
        }
    }

    /// True when applying the command would change nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Clips(edit) => edit.is_empty(),
            Self::AddTracks(tracks) | Self::RemoveTracks(tracks) => tracks.is_empty(),
            Self::Links { changes, .. } => changes.is_empty(),
            Self::Batch { commands, .. } => commands.iter().all(EditCommand::is_empty),
        }
    }

    /// Apply this command to a sequence, reporting what changed.
    pub fn apply(&self, sequence: &mut Sequence) -> ChangeSet {
        let mut changes = ChangeSet::new();
        match self {
            Self::Clips(edit) => changes.merge(edit.apply(sequence)),
            Self::AddTracks(tracks) => {
                for placed in tracks {
                    if sequence.track(placed.track.id).is_some() {
                        warn!(track = %placed.track.id, "add skipped: track exists");
                        continue;
                    }
                    sequence.insert_track(placed.index, placed.track.clone());
                }
                changes.mark_tracks_changed();
            }
            Self::RemoveTracks(tracks) => {
                for placed in tracks {
                    if sequence.remove_track(placed.track.id).is_none() {
                        warn!(track = %placed.track.id, "remove skipped: track not found");
                    }
                }
                changes.mark_tracks_changed();
            }
            Self::Links { changes: links, .. } => {
                for change in links {
                    sequence.links_mut().apply(change);
                }
            }
            Self::Batch { commands, .. } => {
                for command in commands {
                    changes.merge(command.apply(sequence));
                }
            }
        }
        changes
    }

    /// Produce the inverse command (for undo).
    pub fn inverse(&self) -> Self {
        match self {
            Self::Clips(edit) => Self::Clips(edit.inverse()),
            Self::AddTracks(tracks) => Self::RemoveTracks(tracks.iter().rev().cloned().collect()),
            Self::RemoveTracks(tracks) => Self::AddTracks(tracks.iter().rev().cloned().collect()),
            Self::Links { name, changes } => Self::Links {
                name: name.clone(),
                changes: changes.iter().rev().map(LinkChange::inverted).collect(),
            },
            Self::Batch { name, commands } => Self::Batch {
                name: name.clone(),
                commands: commands.iter().rev().map(EditCommand::inverse).collect(),
            },
        }
    }
}

impl From<ClipEdit> for EditCommand {
    fn from(edit: ClipEdit) -> Self {
        Self::Clips(edit)
    }
}

/// A command that operations have already applied, with what it touched.
#[derive(Debug, Clone)]
pub struct Applied {
    pub command: EditCommand,
    pub changes: ChangeSet,
}

impl Applied {
    pub fn new(command: EditCommand, changes: ChangeSet) -> Self {
        Self { command, changes }
    }

    /// Undo the command right away, before it ever reaches the history.
    pub fn revert(self, sequence: &mut Sequence) {
        self.command.inverse().apply(sequence);
    }
}

impl From<ClipEdit> for Applied {
    fn from(mut edit: ClipEdit) -> Self {
        let changes = edit.take_changes();
        Self::new(EditCommand::Clips(edit), changes)
    }
}

// ── Undo stack ──────────────────────────────────────────────────

/// Undo/redo history.
///
/// Commands before the cursor are done, the ones after it were undone.
#[derive(Debug)]
pub struct UndoStack {
    commands: Vec<EditCommand>,
    cursor: usize,
    /// Maximum history depth.
    max_depth: usize,
}

impl UndoStack {
    /// Create a new undo stack with the given maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Record a command that has already been executed.
    /// Drops the redo tail (a new action invalidates redo history).
    pub fn push(&mut self, command: EditCommand) {
        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if self.commands.len() > self.max_depth {
            self.commands.remove(0);
        }
        self.cursor = self.commands.len();
    }

    /// Step back. Returns the inverse of the most recent command.
    pub fn undo(&mut self) -> Option<EditCommand> {
        self.cursor = self.cursor.checked_sub(1)?;
        Some(self.commands[self.cursor].inverse())
    }

    /// Step forward. Returns the command to apply again.
    pub fn redo(&mut self) -> Option<EditCommand> {
        let command = self.commands.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// Name of the command [`undo`](Self::undo) would revert.
    pub fn undo_name(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .map(|index| self.commands[index].name())
    }

    /// Name of the command [`redo`](Self::redo) would repeat.
    pub fn redo_name(&self) -> Option<&str> {
        self.commands.get(self.cursor).map(EditCommand::name)
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    /// Number of undo steps available.
    pub fn undo_count(&self) -> usize {
        self.cursor
    }

    /// Number of redo steps available.
    pub fn redo_count(&self) -> usize {
        self.commands.len() - self.cursor
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(200)
    }
}

// ── Tests ───────────────────────────────────────────────────────
