//! Clip types for the timeline.
//!
//! A clip is one interval of a track. Its position is never stored: it is
//! implied by the lengths of the clips before it in the same track.

use cutline_core::Pts;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transition::Transition;

/// Stable handle of a clip inside a sequence.
///
/// Handles are allocated by the owning [`Sequence`](crate::Sequence) and are
/// never reused, so a replaced clip can be told apart from its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// Reference to a media file that source clips read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSource {
    /// File path (or URI) of the media.
    pub path: String,
    /// Total number of ticks the media provides.
    pub length: Pts,
}

impl MediaSource {
    /// Create a media reference.
    pub fn new(path: impl Into<String>, length: Pts) -> Self {
        Self {
            path: path.into(),
            length,
        }
    }
}

/// A clip showing the region `[offset, offset + length)` of a media source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceClip {
    /// The media this clip reads from.
    pub source: MediaSource,
    /// First visible tick of the source.
    pub offset: Pts,
    /// Visible length.
    pub length: Pts,
    /// Set when the media is missing; the clip keeps its geometry but
    /// produces no frames or samples.
    #[serde(default)]
    pub offline: bool,
}

impl SourceClip {
    /// Create a clip over a region of `source`.
    ///
    /// # Panics
    /// If the region lies outside the media.
    pub fn new(source: MediaSource, offset: Pts, length: Pts) -> Self {
        let clip = Self {
            source,
            offset,
            length,
            offline: false,
        };
        clip.check_bounds();
        clip
    }

    /// Create a clip showing all of `source`.
    pub fn whole(source: MediaSource) -> Self {
        let length = source.length;
        Self::new(source, 0, length)
    }

    /// Hidden source material before the visible region.
    #[inline]
    pub fn head(&self) -> Pts {
        self.offset
    }

    /// Hidden source material after the visible region.
    #[inline]
    pub fn tail(&self) -> Pts {
        self.source.length - self.offset - self.length
    }

    #[inline]
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    fn check_bounds(&self) {
        assert!(
            self.offset >= 0 && self.length >= 0 && self.tail() >= 0,
            "source clip region [{}, {}) outside media '{}' of length {}",
            self.offset,
            self.offset + self.length,
            self.source.path,
            self.source.length
        );
    }
}

/// A gap in a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyClip {
    pub length: Pts,
}

impl EmptyClip {
    pub fn new(length: Pts) -> Self {
        assert!(length >= 0, "empty clip with negative length {length}");
        Self { length }
    }
}

/// What a clip is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipKind {
    Source(SourceClip),
    Empty(EmptyClip),
    Transition(Transition),
}

/// An interval of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub kind: ClipKind,
}

impl Clip {
    pub fn new(id: ClipId, kind: ClipKind) -> Self {
        Self { id, kind }
    }

    /// Length of the clip in ticks.
    pub fn length(&self) -> Pts {
        match &self.kind {
            ClipKind::Source(source) => source.length,
            ClipKind::Empty(empty) => empty.length,
            ClipKind::Transition(transition) => transition.length(),
        }
    }

    #[inline]
    pub fn is_source(&self) -> bool {
        matches!(self.kind, ClipKind::Source(_))
    }

    #[inline]
    pub fn is_empty_clip(&self) -> bool {
        matches!(self.kind, ClipKind::Empty(_))
    }

    #[inline]
    pub fn is_transition(&self) -> bool {
        matches!(self.kind, ClipKind::Transition(_))
    }

    /// Only source clips take part in links.
    #[inline]
    pub fn is_linkable(&self) -> bool {
        self.is_source()
    }

    pub fn as_source(&self) -> Option<&SourceClip> {
        match &self.kind {
            ClipKind::Source(source) => Some(source),
            _ => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match &self.kind {
            ClipKind::Transition(transition) => Some(transition),
            _ => None,
        }
    }

    /// Move the left edge right by `amount` ticks (negative moves it left).
    ///
    /// Only meant for detached replicas that are about to replace the
    /// original through the replace engine.
    ///
    /// # Panics
    /// If the result would have a negative length or leave the media.
    pub fn adjust_begin(&mut self, amount: Pts) {
        match &mut self.kind {
            ClipKind::Source(source) => {
                source.offset += amount;
                source.length -= amount;
                source.check_bounds();
            }
            ClipKind::Empty(empty) => {
                empty.length -= amount;
                assert!(empty.length >= 0, "empty clip trimmed below zero");
            }
            ClipKind::Transition(transition) => {
                transition.left -= amount;
                assert!(transition.left >= 0, "transition left side below zero");
            }
        }
    }

    /// Move the right edge right by `amount` ticks (negative moves it left).
    ///
    /// # Panics
    /// If the result would have a negative length or leave the media.
    pub fn adjust_end(&mut self, amount: Pts) {
        match &mut self.kind {
            ClipKind::Source(source) => {
                source.length += amount;
                source.check_bounds();
            }
            ClipKind::Empty(empty) => {
                empty.length += amount;
                assert!(empty.length >= 0, "empty clip trimmed below zero");
            }
            ClipKind::Transition(transition) => {
                transition.right += amount;
                assert!(transition.right >= 0, "transition right side below zero");
            }
        }
    }

    /// Source path for source clips.
    pub fn source_path(&self) -> Option<&str> {
        self.as_source().map(|source| source.source.path.as_str())
    }
}

impl fmt::Display for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ClipKind::Source(source) => write!(
                f,
                "{} source '{}' [{}+{}]",
                self.id, source.source.path, source.offset, source.length
            ),
            ClipKind::Empty(empty) => write!(f, "{} empty {}", self.id, empty.length),
            ClipKind::Transition(transition) => write!(
                f,
                "{} transition {}|{}",
                self.id, transition.left, transition.right
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_clip(offset: Pts, length: Pts) -> Clip {
        Clip::new(
            ClipId(1),
            ClipKind::Source(SourceClip::new(MediaSource::new("a.mov", 100), offset, length)),
        )
    }

    #[test]
    fn test_head_and_tail() {
        let clip = SourceClip::new(MediaSource::new("a.mov", 100), 10, 60);
        assert_eq!(clip.head(), 10);
        assert_eq!(clip.tail(), 30);
    }

    #[test]
    fn test_adjust_begin_moves_offset() {
        let mut clip = source_clip(10, 60);
        clip.adjust_begin(5);
        let source = clip.as_source().unwrap();
        assert_eq!(source.offset, 15);
        assert_eq!(source.length, 55);

        clip.adjust_begin(-15);
        assert_eq!(clip.as_source().unwrap().offset, 0);
        assert_eq!(clip.length(), 70);
    }

    #[test]
    fn test_adjust_end_keeps_offset() {
        let mut clip = source_clip(10, 60);
        clip.adjust_end(30);
        assert_eq!(clip.length(), 90);
        assert_eq!(clip.as_source().unwrap().tail(), 0);
    }

    #[test]
    #[should_panic(expected = "outside media")]
    fn test_adjust_past_media_panics() {
        let mut clip = source_clip(10, 60);
        clip.adjust_end(31);
    }

    #[test]
    fn test_empty_adjust() {
        let mut clip = Clip::new(ClipId(2), ClipKind::Empty(EmptyClip::new(20)));
        clip.adjust_begin(5);
        clip.adjust_end(-15);
        assert_eq!(clip.length(), 0);
        assert!(clip.is_empty_clip());
        assert!(!clip.is_linkable());
    }

    #[test]
    fn test_transition_adjust() {
        let mut clip = Clip::new(
            ClipId(3),
            ClipKind::Transition(Transition::new(6, 4)),
        );
        clip.adjust_begin(-2);
        clip.adjust_end(-4);
        let transition = clip.as_transition().unwrap();
        assert_eq!((transition.left, transition.right), (8, 0));
        assert_eq!(clip.length(), 8);
    }
}
