//! Stand-ins for media that went missing.
//!
//! An offline clip keeps the offset, length and links of the clip it
//! replaces, so transitions and linked clips stay valid. It just produces
//! no frames or samples.

use tracing::{info, warn};

use crate::clip::{ClipId, ClipKind};
use crate::edit::ClipEdit;
use crate::sequence::Sequence;

/// Replace every online clip using `path` by an offline stand-in.
///
/// Returns `None` when no clip is affected.
pub fn mark_source_offline(sequence: &mut Sequence, path: &str) -> Option<ClipEdit> {
    set_offline(sequence, path, true, "Mark Offline")
}

/// Bring the offline clips using `path` back online.
pub fn mark_source_online(sequence: &mut Sequence, path: &str) -> Option<ClipEdit> {
    set_offline(sequence, path, false, "Mark Online")
}

fn set_offline(sequence: &mut Sequence, path: &str, offline: bool, name: &str) -> Option<ClipEdit> {
    let affected: Vec<ClipId> = sequence
        .clips_using(path)
        .into_iter()
        .filter(|id| {
            sequence
                .clip(*id)
                .and_then(|clip| clip.as_source())
                .is_some_and(|source| source.is_offline() != offline)
        })
        .collect();
    if affected.is_empty() {
        return None;
    }
    if offline {
        warn!(path, clips = affected.len(), "source missing, using offline stand-ins");
    } else {
        info!(path, clips = affected.len(), "source back online");
    }

    let mut edit = ClipEdit::new(name);
    for id in affected {
        let Some(clip) = sequence.clip(id).cloned() else {
            continue;
        };
        let mut stand_in = sequence.replica(&clip);
        if let ClipKind::Source(source) = &mut stand_in.kind {
            source.offline = offline;
        }
        edit.replace_clip(sequence, id, vec![stand_in]);
    }
    edit.finalize(sequence);
    Some(edit)
}
