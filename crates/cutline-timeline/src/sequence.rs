//! Sequences: parallel video and audio tracks sharing one tick domain.

use cutline_core::{CutlineError, FrameRate, Pts, PtsRange, RationalTime, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

use crate::clip::{Clip, ClipId, ClipKind, EmptyClip, SourceClip};
use crate::link::LinkRegistry;
use crate::track::{Track, TrackKind};

/// Where a clip currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipLocation {
    pub track: Uuid,
    pub index: usize,
}

/// A broken structural rule.
///
/// Edits never produce these; seeing one after an edit means the replace
/// engine has a bug. Reconstruction from serialized data reports them as
/// errors instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("{0} appears more than once")]
    DuplicateClip(ClipId),
    #[error("{0} has a negative length")]
    NegativeLength(ClipId),
    #[error("{0} is a zero-length clip outside a transition")]
    ZeroLength(ClipId),
    #[error("{0} and {1} are adjacent empty clips")]
    AdjacentEmpty(ClipId, ClipId),
    #[error("transition {0} has no source clip on a non-zero side")]
    OrphanedTransition(ClipId),
    #[error("transitions {0} and {1} are adjacent")]
    AdjacentTransitions(ClipId, ClipId),
    #[error("{0} lacks the hidden material its transition needs")]
    TransitionUnderrun(ClipId),
    #[error("{0} is linked to {1}, which is not linked back")]
    AsymmetricLink(ClipId, ClipId),
    #[error("{0} is linked but not in the sequence")]
    MissingLinkedClip(ClipId),
    #[error("{0} is linked but is not a source clip")]
    UnlinkableClip(ClipId),
    #[error("linked clips {0} and {1} are in the same track")]
    LinkInSameTrack(ClipId, ClipId),
    #[error("linked clips {0} and {1} differ in length")]
    LinkLengthMismatch(ClipId, ClipId),
    #[error("linked clips {0} and {1} have different transitions")]
    LinkTransitionMismatch(ClipId, ClipId),
}

/// A sequence (timeline) containing tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    /// Unique sequence ID
    pub id: Uuid,
    /// Sequence name
    pub name: String,
    /// Frame rate of one tick
    pub frame_rate: FrameRate,
    video_tracks: Vec<Track>,
    audio_tracks: Vec<Track>,
    links: LinkRegistry,
    next_clip_id: u64,
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.frame_rate == other.frame_rate
            && self.video_tracks == other.video_tracks
            && self.audio_tracks == other.audio_tracks
            && self.links == other.links
    }
}

impl Sequence {
    /// Create a sequence with one video and one audio track.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            frame_rate: FrameRate::default(),
            video_tracks: vec![Track::new_video("V1")],
            audio_tracks: vec![Track::new_audio("A1")],
            links: LinkRegistry::new(),
            next_clip_id: 1,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    // ── Tracks ─────────────────────────────────────────────────────

    pub fn video_tracks(&self) -> &[Track] {
        &self.video_tracks
    }

    pub fn audio_tracks(&self) -> &[Track] {
        &self.audio_tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> &[Track] {
        match kind {
            TrackKind::Video => &self.video_tracks,
            TrackKind::Audio => &self.audio_tracks,
        }
    }

    /// All tracks, video first.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.video_tracks.iter().chain(self.audio_tracks.iter())
    }

    pub fn track_ids(&self) -> Vec<Uuid> {
        self.tracks().map(|track| track.id).collect()
    }

    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.tracks().find(|track| track.id == id)
    }

    /// Like [`track`](Self::track) but reports a missing track as an error.
    pub fn require_track(&self, id: Uuid) -> Result<&Track> {
        self.track(id)
            .ok_or_else(|| CutlineError::NotFound(format!("track {id}")))
    }

    pub(crate) fn track_mut(&mut self, id: Uuid) -> Option<&mut Track> {
        self.video_tracks
            .iter_mut()
            .chain(self.audio_tracks.iter_mut())
            .find(|track| track.id == id)
    }

    /// Kind and index of a track within its kind.
    pub fn track_position(&self, id: Uuid) -> Option<(TrackKind, usize)> {
        if let Some(index) = self.video_tracks.iter().position(|t| t.id == id) {
            return Some((TrackKind::Video, index));
        }
        self.audio_tracks
            .iter()
            .position(|t| t.id == id)
            .map(|index| (TrackKind::Audio, index))
    }

    pub fn track_at(&self, kind: TrackKind, index: usize) -> Option<&Track> {
        self.tracks_of(kind).get(index)
    }

    pub(crate) fn insert_track(&mut self, index: usize, track: Track) {
        let tracks = match track.kind {
            TrackKind::Video => &mut self.video_tracks,
            TrackKind::Audio => &mut self.audio_tracks,
        };
        let index = index.min(tracks.len());
        tracks.insert(index, track);
    }

    pub(crate) fn remove_track(&mut self, id: Uuid) -> Option<(usize, Track)> {
        let (kind, index) = self.track_position(id)?;
        let tracks = match kind {
            TrackKind::Video => &mut self.video_tracks,
            TrackKind::Audio => &mut self.audio_tracks,
        };
        Some((index, tracks.remove(index)))
    }

    /// Length of the longest track.
    pub fn length(&self) -> Pts {
        self.tracks().map(Track::length).max().unwrap_or(0)
    }

    pub fn range(&self) -> PtsRange {
        PtsRange::new(0, self.length())
    }

    /// Wall-clock length at the sequence frame rate.
    pub fn duration(&self) -> RationalTime {
        RationalTime::from_pts(self.length(), self.frame_rate)
    }

    // ── Clips ──────────────────────────────────────────────────────

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut LinkRegistry {
        &mut self.links
    }

    /// Partner of a clip.
    pub fn link_of(&self, id: ClipId) -> Option<ClipId> {
        self.links.partner(id)
    }

    /// Find the track and index of a clip.
    pub fn locate(&self, id: ClipId) -> Option<ClipLocation> {
        self.tracks().find_map(|track| {
            track.index_of(id).map(|index| ClipLocation {
                track: track.id,
                index,
            })
        })
    }

    /// Like [`locate`](Self::locate) but reports a missing clip as an error.
    pub fn require_clip(&self, id: ClipId) -> Result<ClipLocation> {
        self.locate(id)
            .ok_or_else(|| CutlineError::NotFound(format!("{id}")))
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.tracks().find_map(|track| track.find(id))
    }

    /// Left position of a clip in its track.
    pub fn clip_left(&self, id: ClipId) -> Option<Pts> {
        let location = self.locate(id)?;
        self.track(location.track)
            .map(|track| track.left_pts(location.index))
    }

    /// Every source clip reading from `path`.
    pub fn clips_using(&self, path: &str) -> Vec<ClipId> {
        self.tracks()
            .flat_map(|track| track.clips())
            .filter(|clip| clip.source_path() == Some(path))
            .map(|clip| clip.id)
            .collect()
    }

    /// Hand out a fresh clip handle.
    pub fn allocate_clip_id(&mut self) -> ClipId {
        let id = ClipId(self.next_clip_id);
        self.next_clip_id += 1;
        id
    }

    /// Copy of `clip` under a fresh handle.
    pub(crate) fn replica(&mut self, clip: &Clip) -> Clip {
        Clip::new(self.allocate_clip_id(), clip.kind.clone())
    }

    pub(crate) fn new_clip(&mut self, kind: ClipKind) -> Clip {
        Clip::new(self.allocate_clip_id(), kind)
    }

    pub(crate) fn new_empty(&mut self, length: Pts) -> Clip {
        self.new_clip(ClipKind::Empty(EmptyClip::new(length)))
    }

    // ── Building ───────────────────────────────────────────────────
    //
    // Direct construction without undo, for importing media and tests.

    /// Append a source clip to the end of a track.
    pub fn append_source(&mut self, track: Uuid, source: SourceClip) -> Result<ClipId> {
        let clip = self.new_clip(ClipKind::Source(source));
        let id = clip.id;
        self.track_mut(track)
            .ok_or_else(|| CutlineError::NotFound(format!("track {track}")))?
            .push(clip);
        Ok(id)
    }

    /// Append a gap to the end of a track, extending a trailing gap.
    pub fn append_gap(&mut self, track: Uuid, length: Pts) -> Result<ClipId> {
        if length <= 0 {
            return Err(CutlineError::InvalidParameter(format!(
                "gap length {length}"
            )));
        }
        let trailing = self
            .require_track(track)?
            .clips()
            .last()
            .filter(|clip| clip.is_empty_clip())
            .map(|clip| (clip.id, clip.length()));
        let gap = self.new_empty(length + trailing.map(|(_, l)| l).unwrap_or(0));
        let id = gap.id;
        let track = self
            .track_mut(track)
            .ok_or_else(|| CutlineError::NotFound(format!("track {track}")))?;
        match trailing {
            Some(_) => {
                let last = track.len() - 1;
                track.splice(last..last + 1, vec![gap]);
            }
            None => track.push(gap),
        }
        Ok(id)
    }

    /// Append the video and audio halves of an import as a linked pair.
    pub fn append_linked(
        &mut self,
        video_track: Uuid,
        audio_track: Uuid,
        source: SourceClip,
    ) -> Result<(ClipId, ClipId)> {
        let video = self.append_source(video_track, source.clone())?;
        let audio = self.append_source(audio_track, source)?;
        self.link_clips(video, audio)?;
        Ok((video, audio))
    }

    /// Link two clips directly, without recording an undo step.
    pub fn link_clips(&mut self, a: ClipId, b: ClipId) -> Result<()> {
        self.check_linkable(a, b)?;
        for change in self.links.link_changes(a, b) {
            self.links.apply(&change);
        }
        Ok(())
    }

    /// Whether `a` and `b` may be linked to each other.
    pub fn check_linkable(&self, a: ClipId, b: ClipId) -> Result<()> {
        let loc_a = self.require_clip(a)?;
        let loc_b = self.require_clip(b)?;
        if loc_a.track == loc_b.track {
            return Err(CutlineError::Timeline(format!(
                "{a} and {b} are in the same track"
            )));
        }
        let (clip_a, clip_b) = match (self.clip(a), self.clip(b)) {
            (Some(clip_a), Some(clip_b)) => (clip_a, clip_b),
            _ => return Err(CutlineError::NotFound(format!("{a} or {b}"))),
        };
        if !clip_a.is_linkable() || !clip_b.is_linkable() {
            return Err(CutlineError::Timeline(
                "only source clips can be linked".into(),
            ));
        }
        if clip_a.length() != clip_b.length() {
            return Err(CutlineError::Timeline(format!(
                "{a} and {b} differ in length"
            )));
        }
        if let (Some(track_a), Some(track_b)) = (self.track(loc_a.track), self.track(loc_b.track)) {
            if transition_sides(track_a, loc_a.index) != transition_sides(track_b, loc_b.index) {
                return Err(CutlineError::Timeline(format!(
                    "{a} and {b} have different transitions"
                )));
            }
        }
        Ok(())
    }

    // ── Invariants ─────────────────────────────────────────────────

    /// Check every structural rule.
    pub fn verify(&self) -> std::result::Result<(), InvariantViolation> {
        let mut seen = BTreeSet::new();
        for track in self.tracks() {
            for clip in track.clips() {
                if !seen.insert(clip.id) {
                    return Err(InvariantViolation::DuplicateClip(clip.id));
                }
            }
            verify_track(track)?;
        }
        self.verify_links()
    }

    /// Panic if a rule is broken.
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.verify() {
            panic!("timeline invariant violated in '{}': {violation}", self.name);
        }
    }

    fn verify_links(&self) -> std::result::Result<(), InvariantViolation> {
        for (id, partner) in self.links.entries() {
            if self.links.partner(partner) != Some(id) {
                return Err(InvariantViolation::AsymmetricLink(id, partner));
            }
            if id > partner {
                continue;
            }
            let loc_a = self
                .locate(id)
                .ok_or(InvariantViolation::MissingLinkedClip(id))?;
            let loc_b = self
                .locate(partner)
                .ok_or(InvariantViolation::MissingLinkedClip(partner))?;
            if loc_a.track == loc_b.track {
                return Err(InvariantViolation::LinkInSameTrack(id, partner));
            }
            let (Some(track_a), Some(track_b)) = (self.track(loc_a.track), self.track(loc_b.track))
            else {
                return Err(InvariantViolation::MissingLinkedClip(id));
            };
            let clip_a = &track_a.clips()[loc_a.index];
            let clip_b = &track_b.clips()[loc_b.index];
            if !clip_a.is_linkable() {
                return Err(InvariantViolation::UnlinkableClip(id));
            }
            if !clip_b.is_linkable() {
                return Err(InvariantViolation::UnlinkableClip(partner));
            }
            if clip_a.length() != clip_b.length() {
                return Err(InvariantViolation::LinkLengthMismatch(id, partner));
            }
            if transition_sides(track_a, loc_a.index) != transition_sides(track_b, loc_b.index) {
                return Err(InvariantViolation::LinkTransitionMismatch(id, partner));
            }
        }
        Ok(())
    }

    /// Validate data rebuilt from a serialized tree.
    ///
    /// Track positions are derived while deserializing; this checks every
    /// invariant and makes sure future handles cannot collide with loaded
    /// ones.
    pub fn reconstruct(mut self) -> Result<Self> {
        self.verify().map_err(|violation| {
            CutlineError::Serialization(format!("invalid sequence '{}': {violation}", self.name))
        })?;
        let highest = self
            .tracks()
            .flat_map(|track| track.clips())
            .map(|clip| clip.id.0)
            .max()
            .unwrap_or(0);
        self.next_clip_id = self.next_clip_id.max(highest + 1);
        Ok(self)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new("Sequence 1")
    }
}

/// In-transition right side and out-transition left side of a clip.
fn transition_sides(track: &Track, index: usize) -> (Option<Pts>, Option<Pts>) {
    let right = track
        .in_transition(index)
        .and_then(|t| track.clips()[t].as_transition())
        .map(|t| t.right);
    let left = track
        .out_transition(index)
        .and_then(|t| track.clips()[t].as_transition())
        .map(|t| t.left);
    (right, left)
}

fn verify_track(track: &Track) -> std::result::Result<(), InvariantViolation> {
    let clips = track.clips();
    for (index, clip) in clips.iter().enumerate() {
        let prev = index.checked_sub(1).map(|i| &clips[i]);
        let next = clips.get(index + 1);
        match &clip.kind {
            ClipKind::Source(source) => {
                if source.length < 0 || source.offset < 0 || source.tail() < 0 {
                    return Err(InvariantViolation::NegativeLength(clip.id));
                }
                if source.length == 0 && !track.is_part_of_transition(index) {
                    return Err(InvariantViolation::ZeroLength(clip.id));
                }
                if let Some(t) = track.in_transition(index) {
                    if source.head() < clips[t].length() {
                        return Err(InvariantViolation::TransitionUnderrun(clip.id));
                    }
                }
                if let Some(t) = track.out_transition(index) {
                    if source.tail() < clips[t].length() {
                        return Err(InvariantViolation::TransitionUnderrun(clip.id));
                    }
                }
            }
            ClipKind::Empty(empty) => {
                if empty.length < 0 {
                    return Err(InvariantViolation::NegativeLength(clip.id));
                }
                if empty.length == 0 {
                    return Err(InvariantViolation::ZeroLength(clip.id));
                }
                if let Some(next) = next.filter(|next| next.is_empty_clip()) {
                    return Err(InvariantViolation::AdjacentEmpty(clip.id, next.id));
                }
            }
            ClipKind::Transition(transition) => {
                if transition.left < 0 || transition.right < 0 || transition.length() == 0 {
                    return Err(InvariantViolation::NegativeLength(clip.id));
                }
                let left_ok = transition.left == 0 || prev.is_some_and(Clip::is_source);
                let right_ok = transition.right == 0 || next.is_some_and(Clip::is_source);
                if !left_ok || !right_ok {
                    return Err(InvariantViolation::OrphanedTransition(clip.id));
                }
                if let Some(next) = next.filter(|next| next.is_transition()) {
                    return Err(InvariantViolation::AdjacentTransitions(clip.id, next.id));
                }
            }
        }
    }
    Ok(())
}
