//! Cutline Timeline - Timeline edit model
//!
//! Implements the editable timeline of a sequence:
//! - Clips, tracks, transitions and audio/video links
//! - The replace engine every edit is built from
//! - Trim, shift trim, transitions, delete, split and drag and drop
//! - Undo/redo and change notifications through an edit context
//! - Offline media stand-ins, a render worker pool and versioned files

pub mod arrange;
pub mod clip;
pub mod command;
pub mod config;
pub mod context;
pub mod delete;
pub mod drag;
pub mod edit;
pub mod event;
pub mod link;
pub mod offline;
pub mod sequence;
pub mod serialization;
pub mod snapping;
pub mod split;
pub mod track;
pub mod transition;
pub mod transitions;
pub mod trim;
pub mod worker;

pub use clip::{Clip, ClipId, ClipKind, EmptyClip, MediaSource, SourceClip};
pub use command::{Applied, EditCommand, PlacedTrack, UndoStack};
pub use config::EditConfig;
pub use context::EditContext;
pub use drag::{DragOperation, DragTarget, ShiftInsert};
pub use edit::ClipEdit;
pub use event::{ChangeSet, TimelineEvent};
pub use link::{LinkChange, LinkRegistry};
pub use sequence::{ClipLocation, InvariantViolation, Sequence};
pub use serialization::SequenceFile;
pub use snapping::{SnapKind, SnapPoint, SnappingEngine};
pub use split::SplitRefusal;
pub use track::{Track, TrackKind};
pub use transition::{distribute, Transition, TransitionKind};
pub use trim::TrimSide;
pub use worker::{AbortHandle, ClipSnapshot, RenderEvent, RenderWorker, Renderer};
