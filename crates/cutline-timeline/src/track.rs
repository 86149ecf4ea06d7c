//! Track types for the timeline.
//!
//! A track is a gapless run of clips: gaps are explicit empty clips. The
//! left position of every clip is cached and rebuilt whenever the clip list
//! is spliced.

use cutline_core::Pts;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use uuid::Uuid;

use crate::clip::{Clip, ClipId, ClipKind};

/// Adjustment limit used where nothing bounds a trim.
///
/// Far enough from `i64::MAX` that adding track positions cannot overflow.
pub const UNBOUNDED: Pts = i64::MAX / 4;

/// Default height of a new track, in pixels.
pub const DEFAULT_TRACK_HEIGHT: u32 = 50;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A track containing clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    /// Unique track ID
    pub id: Uuid,
    /// Track name
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Display height in pixels
    pub height: u32,
    clips: Vec<Clip>,
    /// `starts[i]` is the left position of clip `i`; the last entry is the
    /// track length.
    #[serde(skip)]
    starts: Vec<Pts>,
}

/// Serialized form of a track; positions are derived on load.
#[derive(Deserialize)]
struct TrackRecord {
    id: Uuid,
    name: String,
    kind: TrackKind,
    #[serde(default = "default_height")]
    height: u32,
    clips: Vec<Clip>,
}

fn default_height() -> u32 {
    DEFAULT_TRACK_HEIGHT
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let mut track = Self {
            id: record.id,
            name: record.name,
            kind: record.kind,
            height: record.height,
            clips: record.clips,
            starts: Vec::new(),
        };
        track.rebuild_positions();
        track
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.kind == other.kind
            && self.height == other.height
            && self.clips == other.clips
    }
}

impl Track {
    /// Create an empty track of the given kind.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            height: DEFAULT_TRACK_HEIGHT,
            clips: Vec::new(),
            starts: vec![0],
        }
    }

    /// Create a new video track.
    pub fn new_video(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// True when the track holds no clips at all.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// True when the track holds anything besides gaps.
    pub fn has_content(&self) -> bool {
        self.clips.iter().any(|clip| !clip.is_empty_clip())
    }

    /// Sum of all clip lengths.
    pub fn length(&self) -> Pts {
        self.starts.last().copied().unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn index_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id == id)
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.index_of(id).is_some()
    }

    /// Clip by ID.
    pub fn find(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    /// Left position of the clip at `index`.
    #[inline]
    pub fn left_pts(&self, index: usize) -> Pts {
        self.starts[index]
    }

    /// Right position (exclusive) of the clip at `index`.
    #[inline]
    pub fn right_pts(&self, index: usize) -> Pts {
        self.starts[index + 1]
    }

    /// Index of the clip covering `pts`.
    ///
    /// Zero-length clips never cover anything, so the clip starting at a
    /// cut is returned rather than a zero-length clip sharing its position.
    pub fn index_at(&self, pts: Pts) -> Option<usize> {
        if pts < 0 || pts >= self.length() {
            return None;
        }
        let count = self.starts[..self.clips.len()].partition_point(|start| *start <= pts);
        count.checked_sub(1)
    }

    /// Clip covering `pts`.
    pub fn clip_at(&self, pts: Pts) -> Option<&Clip> {
        self.index_at(pts).map(|index| &self.clips[index])
    }

    /// True when `pts` does not fall strictly inside a clip.
    pub fn is_cut(&self, pts: Pts) -> bool {
        match self.index_at(pts) {
            Some(index) => self.left_pts(index) == pts,
            None => true,
        }
    }

    /// Index of the first clip starting at or after `pts`.
    pub fn index_from(&self, pts: Pts) -> usize {
        self.starts[..self.clips.len()].partition_point(|start| *start < pts)
    }

    /// Clips with a non-zero length, with their left positions.
    pub fn visible_clips(&self) -> impl Iterator<Item = (Pts, &Clip)> + '_ {
        self.clips
            .iter()
            .enumerate()
            .filter(|(_, clip)| clip.length() > 0)
            .map(move |(index, clip)| (self.starts[index], clip))
    }

    /// Distinct clip boundaries, including 0 and the track end.
    pub fn cuts(&self) -> Vec<Pts> {
        let mut cuts = self.starts.clone();
        cuts.dedup();
        cuts
    }

    /// Nearest clip after `index` that has a non-zero length.
    pub fn next_visible(&self, index: usize) -> Option<usize> {
        (index + 1..self.clips.len()).find(|i| self.clips[*i].length() > 0)
    }

    // ── Transition adjacency ──────────────────────────────────────

    /// Transition that fades into the clip at `index`.
    pub fn in_transition(&self, index: usize) -> Option<usize> {
        let prev = index.checked_sub(1)?;
        match &self.clips[prev].kind {
            ClipKind::Transition(transition) if transition.right > 0 => Some(prev),
            _ => None,
        }
    }

    /// Transition that fades out of the clip at `index`.
    pub fn out_transition(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        match self.clips.get(next).map(|clip| &clip.kind) {
            Some(ClipKind::Transition(transition)) if transition.left > 0 => Some(next),
            _ => None,
        }
    }

    /// Whether the clip at `index` supplies frames to a transition.
    pub fn is_part_of_transition(&self, index: usize) -> bool {
        self.clips[index].is_source()
            && (self.in_transition(index).is_some() || self.out_transition(index).is_some())
    }

    // ── Adjustment limits ─────────────────────────────────────────

    /// Most negative legal move of the left edge of the clip at `index`.
    pub fn min_adjust_begin(&self, index: usize) -> Pts {
        let clip = &self.clips[index];
        match &clip.kind {
            ClipKind::Source(source) => {
                let reserved = self
                    .in_transition(index)
                    .map(|t| self.clips[t].length())
                    .unwrap_or(0);
                -source.head() + reserved
            }
            ClipKind::Empty(_) => -UNBOUNDED,
            ClipKind::Transition(transition) => {
                if transition.left == 0 {
                    return 0;
                }
                let mut lower = -self.clips[index - 1].length();
                if transition.right > 0 {
                    lower = lower.max(self.min_adjust_begin(index + 1));
                }
                lower
            }
        }
    }

    /// Most positive legal move of the left edge of the clip at `index`.
    pub fn max_adjust_begin(&self, index: usize) -> Pts {
        match &self.clips[index].kind {
            ClipKind::Transition(transition) => transition.left,
            _ => self.clips[index].length(),
        }
    }

    /// Most negative legal move of the right edge of the clip at `index`.
    pub fn min_adjust_end(&self, index: usize) -> Pts {
        match &self.clips[index].kind {
            ClipKind::Transition(transition) => -transition.right,
            _ => -self.clips[index].length(),
        }
    }

    /// Most positive legal move of the right edge of the clip at `index`.
    pub fn max_adjust_end(&self, index: usize) -> Pts {
        let clip = &self.clips[index];
        match &clip.kind {
            ClipKind::Source(source) => {
                let reserved = self
                    .out_transition(index)
                    .map(|t| self.clips[t].length())
                    .unwrap_or(0);
                source.tail() - reserved
            }
            ClipKind::Empty(_) => UNBOUNDED,
            ClipKind::Transition(transition) => {
                if transition.right == 0 {
                    return 0;
                }
                let mut upper = self.clips[index + 1].length();
                if transition.left > 0 {
                    upper = upper.min(self.max_adjust_end(index - 1));
                }
                upper
            }
        }
    }

    /// Free space before the clip at `index`, as a non-positive amount.
    ///
    /// An in-only transition directly before the clip moves along with it,
    /// so the gap before that transition counts.
    pub fn left_empty_area(&self, index: usize) -> Pts {
        let mut cursor = index;
        if let Some(prev) = cursor.checked_sub(1) {
            if matches!(&self.clips[prev].kind, ClipKind::Transition(t) if t.is_in_only()) {
                cursor = prev;
            }
        }
        let mut area = 0;
        while let Some(prev) = cursor.checked_sub(1) {
            if !self.clips[prev].is_empty_clip() {
                break;
            }
            area -= self.clips[prev].length();
            cursor = prev;
        }
        area
    }

    /// Free space after the clip at `index`.
    ///
    /// Unbounded when only gaps follow, because the track may grow.
    pub fn right_empty_area(&self, index: usize) -> Pts {
        let mut cursor = index + 1;
        if matches!(self.clips.get(cursor).map(|c| &c.kind), Some(ClipKind::Transition(t)) if t.is_out_only())
        {
            cursor += 1;
        }
        let mut area = 0;
        while let Some(clip) = self.clips.get(cursor) {
            if !clip.is_empty_clip() {
                return area;
            }
            area += clip.length();
            cursor += 1;
        }
        UNBOUNDED
    }

    // ── Mutation (replace engine only) ────────────────────────────

    /// Replace the clips in `range` by `clips`, returning the removed ones.
    pub(crate) fn splice(&mut self, range: Range<usize>, clips: Vec<Clip>) -> Vec<Clip> {
        let removed: Vec<Clip> = self.clips.splice(range, clips).collect();
        self.rebuild_positions();
        removed
    }

    /// Append a clip while building a track.
    pub(crate) fn push(&mut self, clip: Clip) {
        self.clips.push(clip);
        self.rebuild_positions();
    }

    fn rebuild_positions(&mut self) {
        self.starts.clear();
        self.starts.reserve(self.clips.len() + 1);
        let mut pts = 0;
        self.starts.push(pts);
        for clip in &self.clips {
            pts += clip.length();
            self.starts.push(pts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{EmptyClip, MediaSource, SourceClip};
    use crate::transition::Transition;

    fn source(id: u64, offset: Pts, length: Pts, media: Pts) -> Clip {
        Clip::new(
            ClipId(id),
            ClipKind::Source(SourceClip::new(MediaSource::new("m.mov", media), offset, length)),
        )
    }

    fn empty(id: u64, length: Pts) -> Clip {
        Clip::new(ClipId(id), ClipKind::Empty(EmptyClip::new(length)))
    }

    fn transition(id: u64, left: Pts, right: Pts) -> Clip {
        Clip::new(ClipId(id), ClipKind::Transition(Transition::new(left, right)))
    }

    fn track_of(clips: Vec<Clip>) -> Track {
        let mut track = Track::new_video("V1");
        for clip in clips {
            track.push(clip);
        }
        track
    }

    #[test]
    fn test_positions_and_length() {
        let track = track_of(vec![source(1, 0, 10, 100), empty(2, 5), source(3, 0, 20, 100)]);
        assert_eq!(track.length(), 35);
        assert_eq!(track.left_pts(1), 10);
        assert_eq!(track.right_pts(2), 35);
        assert_eq!(track.index_of(ClipId(3)), Some(2));
        assert_eq!(track.cuts(), vec![0, 10, 15, 35]);
    }

    #[test]
    fn test_index_at_skips_zero_length() {
        let track = track_of(vec![
            source(1, 0, 10, 100),
            source(2, 10, 0, 100),
            transition(3, 4, 0),
            source(4, 0, 10, 100),
        ]);
        assert_eq!(track.index_at(9), Some(0));
        assert_eq!(track.index_at(10), Some(2));
        assert_eq!(track.index_at(14), Some(3));
        assert_eq!(track.index_at(24), None);
        assert!(track.is_cut(10));
        assert!(!track.is_cut(12));
        assert_eq!(track.next_visible(0), Some(2));
        assert_eq!(track.visible_clips().count(), 3);
    }

    #[test]
    fn test_in_and_out_transition() {
        let track = track_of(vec![
            source(1, 0, 40, 100),
            transition(2, 5, 5),
            source(3, 20, 40, 100),
            transition(4, 0, 5),
            source(5, 10, 30, 100),
        ]);
        assert_eq!(track.out_transition(0), Some(1));
        assert_eq!(track.in_transition(2), Some(1));
        // In-only transition does not fade out of the clip before it.
        assert_eq!(track.out_transition(2), None);
        assert_eq!(track.in_transition(4), Some(3));
        assert!(track.is_part_of_transition(0));
    }

    #[test]
    fn test_source_limits_reserve_transition() {
        let track = track_of(vec![
            source(1, 10, 40, 100),
            transition(2, 5, 5),
            source(3, 20, 40, 100),
        ]);
        assert_eq!(track.min_adjust_begin(0), -10);
        assert_eq!(track.max_adjust_end(0), 100 - 50 - 10);
        assert_eq!(track.min_adjust_begin(2), -20 + 10);
        assert_eq!(track.max_adjust_begin(2), 40);
        assert_eq!(track.min_adjust_end(2), -40);
    }

    #[test]
    fn test_transition_limits() {
        let track = track_of(vec![
            source(1, 10, 40, 100),
            transition(2, 5, 5),
            source(3, 20, 40, 100),
        ]);
        // Left edge: bounded by the next clip's remaining head.
        assert_eq!(track.min_adjust_begin(1), -10);
        assert_eq!(track.max_adjust_begin(1), 5);
        assert_eq!(track.min_adjust_end(1), -5);
        // Right edge: bounded by the previous clip's remaining tail.
        assert_eq!(track.max_adjust_end(1), 40);
    }

    #[test]
    fn test_empty_areas() {
        let track = track_of(vec![
            empty(1, 7),
            transition(2, 0, 3),
            source(3, 5, 10, 100),
            empty(4, 6),
            source(5, 0, 10, 100),
        ]);
        assert_eq!(track.left_empty_area(2), -7);
        assert_eq!(track.right_empty_area(2), 6);
        assert_eq!(track.left_empty_area(4), -6);
        assert_eq!(track.right_empty_area(4), UNBOUNDED);
        assert_eq!(track.left_empty_area(0), 0);
    }

    #[test]
    fn test_splice_updates_positions() {
        let mut track = track_of(vec![source(1, 0, 10, 100), source(2, 0, 10, 100)]);
        let removed = track.splice(0..1, vec![empty(3, 4), source(4, 0, 2, 100)]);
        assert_eq!(removed.len(), 1);
        assert_eq!(track.length(), 16);
        assert_eq!(track.left_pts(2), 6);
    }

    #[test]
    fn test_serde_rebuilds_positions() {
        let track = track_of(vec![source(1, 0, 10, 100), empty(2, 5)]);
        let json = serde_json::to_string(&track).unwrap();
        let loaded: Track = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, track);
        assert_eq!(loaded.length(), 15);
    }

    proptest::proptest! {
        #[test]
        fn test_index_at_matches_positions(lengths in proptest::collection::vec(1..50i64, 1..10)) {
            let track = track_of(
                lengths
                    .iter()
                    .enumerate()
                    .map(|(n, &length)| empty(n as u64, length))
                    .collect(),
            );
            proptest::prop_assert_eq!(track.length(), lengths.iter().sum::<Pts>());
            for index in 0..track.len() {
                let left = track.left_pts(index);
                let right = track.right_pts(index);
                proptest::prop_assert_eq!(track.index_at(left), Some(index));
                proptest::prop_assert_eq!(track.index_at(right - 1), Some(index));
                proptest::prop_assert_eq!(track.index_from(left), index);
            }
        }
    }
}
