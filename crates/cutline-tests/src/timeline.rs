//! Integration tests for the timeline edit model.
//!
//! Drives whole editing sessions through `EditContext` and checks the
//! structural guarantees every command must keep.

use anyhow::{anyhow, Context, Result};
use cutline_core::Pts;
use cutline_timeline::{
    ClipId, DragTarget, EditConfig, EditContext, MediaSource, Sequence, SequenceFile,
    ShiftInsert, SourceClip, TimelineEvent, TrackKind, TransitionKind, TrimSide,
};
use std::collections::HashSet;
use uuid::Uuid;

use crate::init_tracing;

// ── Helpers ────────────────────────────────────────────────────

fn media(path: &str, offset: Pts, length: Pts) -> SourceClip {
    SourceClip::new(MediaSource::new(path, 200), offset, length)
}

fn lengths(sequence: &Sequence, track: Uuid) -> Result<Vec<Pts>> {
    let track = sequence
        .track(track)
        .ok_or_else(|| anyhow!("track {track} missing"))?;
    Ok(track.clips().iter().map(|clip| clip.length()).collect())
}

fn clip_at(sequence: &Sequence, track: Uuid, index: usize) -> Result<ClipId> {
    sequence
        .track(track)
        .and_then(|track| track.get(index))
        .map(|clip| clip.id)
        .ok_or_else(|| anyhow!("no clip {index} in track {track}"))
}

/// First clip on `track` cut from the media at `path`.
fn source(sequence: &Sequence, track: Uuid, path: &str) -> Result<ClipId> {
    sequence
        .track(track)
        .and_then(|track| {
            track
                .clips()
                .iter()
                .find(|clip| clip.source_path() == Some(path))
        })
        .map(|clip| clip.id)
        .ok_or_else(|| anyhow!("no clip of {path} in track {track}"))
}

/// Two linked clips of 100 ticks on V1/A1, each with 50 ticks of hidden
/// material on both sides.
struct Linked {
    sequence: Sequence,
    video: Uuid,
    audio: Uuid,
    first: (ClipId, ClipId),
    second: (ClipId, ClipId),
}

fn linked_pair() -> Result<Linked> {
    let mut sequence = Sequence::new("Main");
    let video = sequence.video_tracks()[0].id;
    let audio = sequence.audio_tracks()[0].id;
    let first = sequence.append_linked(video, audio, media("a.mov", 50, 100))?;
    let second = sequence.append_linked(video, audio, media("b.mov", 50, 100))?;
    Ok(Linked {
        sequence,
        video,
        audio,
        first,
        second,
    })
}

fn context(sequence: Sequence) -> EditContext {
    init_tracing();
    EditContext::new(sequence, EditConfig::default())
}

/// Run `op`, then check that undo restores the sequence exactly and redo
/// brings the edit back.
fn assert_round_trip(
    ctx: &mut EditContext,
    name: &str,
    op: impl FnOnce(&mut EditContext) -> Result<bool>,
) -> Result<()> {
    let before = ctx.sequence().clone();
    anyhow::ensure!(op(ctx)?, "{name} did nothing");
    ctx.sequence().assert_invariants();
    let after = ctx.sequence().clone();

    anyhow::ensure!(ctx.undo(), "{name}: nothing to undo");
    anyhow::ensure!(ctx.sequence() == &before, "{name}: undo did not restore");
    anyhow::ensure!(ctx.redo(), "{name}: nothing to redo");
    anyhow::ensure!(ctx.sequence() == &after, "{name}: redo differs");
    Ok(())
}

// ── Transition scenarios ───────────────────────────────────────

#[test]
fn out_transition_keeps_track_length() -> Result<()> {
    let mut sequence = Sequence::new("Main");
    let video = sequence.video_tracks()[0].id;
    sequence.append_source(video, media("a.mov", 0, 100))?;
    let mut ctx = context(sequence);

    assert!(ctx.create_transition(video, 100, Some(20), TransitionKind::CrossFade)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![90, 10]);
    assert_eq!(ctx.sequence().length(), 100);
    Ok(())
}

#[test]
fn crossfade_without_hidden_material_is_noop() -> Result<()> {
    let mut sequence = Sequence::new("Main");
    let video = sequence.video_tracks()[0].id;
    sequence.append_source(video, SourceClip::whole(MediaSource::new("a.mov", 50)))?;
    sequence.append_source(video, SourceClip::whole(MediaSource::new("b.mov", 50)))?;
    let before = sequence.clone();
    let mut ctx = context(sequence);

    assert!(!ctx.create_transition(video, 50, Some(20), TransitionKind::CrossFade)?);
    assert_eq!(ctx.sequence(), &before);
    assert!(!ctx.history().can_undo());
    Ok(())
}

#[test]
fn linked_clips_get_mirrored_transitions() -> Result<()> {
    let linked = linked_pair()?;
    let (video, audio) = (linked.video, linked.audio);
    let mut ctx = context(linked.sequence);

    assert!(ctx.create_transition(video, 100, Some(20), TransitionKind::CrossFade)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![90, 20, 90]);
    assert_eq!(lengths(ctx.sequence(), audio)?, vec![90, 20, 90]);
    assert_eq!(ctx.sequence().links().len(), 2);

    let transition = clip_at(ctx.sequence(), audio, 1)?;
    ctx.unapply_transition(transition)?;
    assert_eq!(lengths(ctx.sequence(), video)?, vec![100, 100]);
    assert_eq!(lengths(ctx.sequence(), audio)?, vec![100, 100]);
    Ok(())
}

// ── Delete scenarios ───────────────────────────────────────────

#[test]
fn delete_without_shift_leaves_gap() -> Result<()> {
    let linked = linked_pair()?;
    let video = linked.video;
    let mut ctx = context(linked.sequence);

    assert!(ctx.delete(&[linked.first.0], false)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![100, 100]);
    assert_eq!(ctx.sequence().length(), 200);
    Ok(())
}

#[test]
fn shift_delete_moves_later_clips_left() -> Result<()> {
    let linked = linked_pair()?;
    let (video, audio) = (linked.video, linked.audio);
    let mut ctx = context(linked.sequence);

    assert!(ctx.delete(&[linked.first.0], true)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![100]);
    assert_eq!(lengths(ctx.sequence(), audio)?, vec![100]);
    assert_eq!(ctx.sequence().clip_left(linked.second.0), Some(0));
    assert_eq!(ctx.sequence().clip_left(linked.second.1), Some(0));
    Ok(())
}

#[test]
fn unlinked_partner_is_not_shifted() -> Result<()> {
    let linked = linked_pair()?;
    let (video, audio) = (linked.video, linked.audio);
    let (a, b) = linked.first;
    let mut ctx = context(linked.sequence);

    assert!(ctx.unlink(a)?);
    assert!(ctx.delete(&[a], true)?);
    assert_eq!(ctx.sequence().clip_left(b), Some(0));
    assert_eq!(ctx.sequence().clip_left(linked.second.1), Some(100));
    assert_eq!(lengths(ctx.sequence(), video)?, vec![100, 100]);
    assert_eq!(lengths(ctx.sequence(), audio)?, vec![100, 100]);
    Ok(())
}

// ── Trim scenarios ─────────────────────────────────────────────

#[test]
fn trim_beyond_range_is_clamped() -> Result<()> {
    let linked = linked_pair()?;
    let video = linked.video;
    let mut ctx = context(linked.sequence);

    assert!(ctx.trim(linked.second.0, TrimSide::End, 500, false)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![100, 150]);
    Ok(())
}

#[test]
fn zero_trim_never_pushes() -> Result<()> {
    let linked = linked_pair()?;
    let before = linked.sequence.clone();
    let mut ctx = context(linked.sequence);

    assert!(!ctx.trim(linked.first.0, TrimSide::Begin, 0, true)?);
    assert!(!ctx.history().can_undo());
    assert_eq!(ctx.sequence(), &before);
    Ok(())
}

#[test]
fn shift_trim_moves_every_track() -> Result<()> {
    let linked = linked_pair()?;
    let video = linked.video;
    let mut ctx = context(linked.sequence);
    let upper = ctx.add_track(TrackKind::Video, 1);
    let mut sequence = ctx.into_sequence();
    sequence.append_gap(upper, 100)?;
    let title = sequence.append_source(upper, media("title.png", 0, 50))?;
    let mut ctx = context(sequence);

    assert!(ctx.trim(linked.first.0, TrimSide::End, -30, true)?);
    assert_eq!(lengths(ctx.sequence(), video)?, vec![70, 100]);
    assert_eq!(lengths(ctx.sequence(), upper)?, vec![70, 50]);
    assert_eq!(ctx.sequence().clip_left(title), Some(70));
    Ok(())
}

// ── Undo round trips ───────────────────────────────────────────

#[test]
fn every_command_round_trips() -> Result<()> {
    let linked = linked_pair()?;
    let (video, audio) = (linked.video, linked.audio);
    let mut ctx = context(linked.sequence);

    assert_round_trip(&mut ctx, "transition", |ctx| {
        Ok(ctx.create_transition(video, 100, Some(10), TransitionKind::WipeLeft)?)
    })?;
    assert_round_trip(&mut ctx, "delete transition", |ctx| {
        let transition = ctx
            .sequence()
            .track(video)
            .and_then(|track| track.clips().iter().find(|clip| clip.is_transition()))
            .map(|clip| clip.id)
            .context("transition missing")?;
        ctx.remove_transition(transition)?;
        Ok(true)
    })?;
    assert_round_trip(&mut ctx, "trim", |ctx| {
        let a = source(ctx.sequence(), video, "a.mov")?;
        Ok(ctx.trim(a, TrimSide::End, -10, false)?)
    })?;
    assert_round_trip(&mut ctx, "shift trim", |ctx| {
        let a = source(ctx.sequence(), video, "a.mov")?;
        Ok(ctx.trim(a, TrimSide::Begin, 10, true)?)
    })?;
    assert_round_trip(&mut ctx, "split", |ctx| Ok(ctx.split(40)?))?;
    assert_round_trip(&mut ctx, "split and trim", |ctx| {
        Ok(ctx.split_and_trim(20, TrimSide::Begin)?)
    })?;
    assert_round_trip(&mut ctx, "offline", |ctx| Ok(ctx.mark_source_offline("b.mov")))?;
    assert_round_trip(&mut ctx, "drag", |ctx| {
        let d = source(ctx.sequence(), audio, "b.mov")?;
        let mut drag = ctx.begin_drag(&[d], 0)?;
        ctx.drag_to(&mut drag, DragTarget::new(60, 0, 1), 1.0)?;
        Ok(ctx.finish_drag(drag, None)?)
    })?;
    assert_round_trip(&mut ctx, "unlink", |ctx| {
        let c = source(ctx.sequence(), video, "b.mov")?;
        Ok(ctx.unlink(c)?)
    })?;
    assert_round_trip(&mut ctx, "delete", |ctx| {
        let a = source(ctx.sequence(), video, "a.mov")?;
        Ok(ctx.delete(&[a], false)?)
    })?;
    assert_round_trip(&mut ctx, "add track", |ctx| {
        ctx.add_track(TrackKind::Audio, 0);
        Ok(true)
    })?;
    Ok(())
}

#[test]
fn remove_track_round_trips() -> Result<()> {
    let mut sequence = Sequence::new("Main");
    let video = sequence.video_tracks()[0].id;
    sequence.append_source(video, media("a.mov", 0, 40))?;
    let mut ctx = context(sequence);
    let upper = ctx.add_track(TrackKind::Video, 1);
    assert_round_trip(&mut ctx, "remove track", |ctx| {
        ctx.remove_track(upper)?;
        Ok(true)
    })?;
    // A1 is kept as the last audio track; the extra one goes.
    let extra = ctx.add_track(TrackKind::Audio, 1);
    assert_round_trip(&mut ctx, "remove empty tracks", |ctx| Ok(ctx.remove_empty_tracks()))?;
    assert!(ctx.sequence().track(extra).is_none());
    assert_eq!(ctx.sequence().audio_tracks().len(), 1);
    Ok(())
}

// ── Notifications ──────────────────────────────────────────────

#[test]
fn events_fire_once_per_command() -> Result<()> {
    let linked = linked_pair()?;
    let (video, audio) = (linked.video, linked.audio);
    let mut ctx = context(linked.sequence);
    let events = ctx.subscribe();

    assert!(ctx.trim(linked.first.0, TrimSide::End, -20, true)?);
    let received: Vec<TimelineEvent> = events.try_iter().collect();
    let unique: HashSet<String> = received.iter().map(|e| format!("{e:?}")).collect();
    assert_eq!(unique.len(), received.len());
    for track in [video, audio] {
        assert!(received.contains(&TimelineEvent::ClipsReplaced { track }));
        assert!(received.contains(&TimelineEvent::TrackLengthChanged { track, length: 180 }));
    }

    assert!(ctx.undo());
    assert!(events
        .try_iter()
        .any(|e| e == TimelineEvent::TrackLengthChanged { track: video, length: 200 }));
    Ok(())
}

// ── Drag and drop ──────────────────────────────────────────────

#[test]
fn drag_linked_pair_onto_new_tracks() -> Result<()> {
    let linked = linked_pair()?;
    let mut ctx = context(linked.sequence);
    let (v, a) = linked.second;

    let mut drag = ctx.begin_drag(&[v], 0)?;
    let snapped = ctx.drag_to(&mut drag, DragTarget::new(-97, 1, 1), 1.0)?;
    assert_eq!(snapped.delta, -100);
    assert!(ctx.finish_drag(drag, None)?);

    let sequence = ctx.sequence();
    assert_eq!(sequence.video_tracks().len(), 2);
    assert_eq!(sequence.audio_tracks().len(), 2);
    let upper_video = sequence.video_tracks()[1].id;
    let upper_audio = sequence.audio_tracks()[1].id;
    assert_eq!(lengths(sequence, upper_video)?, vec![100]);
    assert_eq!(lengths(sequence, upper_audio)?, vec![100]);
    let moved = clip_at(sequence, upper_video, 0)?;
    assert_eq!(sequence.link_of(moved), Some(clip_at(sequence, upper_audio, 0)?));
    assert!(sequence.clip(a).is_none());
    Ok(())
}

#[test]
fn shift_drop_makes_room() -> Result<()> {
    let linked = linked_pair()?;
    let video = linked.video;
    let mut ctx = context(linked.sequence);

    let mut drag = ctx.begin_drag(&[linked.second.0], 0)?;
    ctx.drag_to(&mut drag, DragTarget::new(-100, 0, 0), 1.0)?;
    let shift = ShiftInsert {
        pts: 0,
        length: 100,
    };
    assert!(ctx.finish_drag(drag, Some(shift))?);
    assert_eq!(ctx.sequence().clip_left(linked.first.0), Some(100));
    assert_eq!(lengths(ctx.sequence(), video)?[..2], [100, 100]);
    Ok(())
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn edited_sequence_survives_serialization() -> Result<()> {
    let linked = linked_pair()?;
    let video = linked.video;
    let mut ctx = context(linked.sequence);
    ctx.create_transition(video, 100, None, TransitionKind::CrossFade)?;
    ctx.mark_source_offline("a.mov");
    let sequence = ctx.into_sequence();

    let json = SequenceFile::new(sequence.clone()).to_json()?;
    let loaded = SequenceFile::from_json(&json)?;
    assert_eq!(loaded.sequence, sequence);

    let value: serde_json::Value = serde_json::from_slice(&json)?;
    assert_eq!(value["version"], 1);
    Ok(())
}
