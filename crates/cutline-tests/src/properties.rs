//! Property tests: random edit sessions keep the timeline consistent and
//! undo always finds its way back.

use cutline_core::Pts;
use cutline_timeline::{
    distribute, ClipId, DragTarget, EditConfig, EditContext, MediaSource, Sequence, SourceClip,
    TrackKind, TransitionKind, TrimSide,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Trim {
        clip: usize,
        side: TrimSide,
        amount: Pts,
        shift: bool,
    },
    Delete {
        clip: usize,
        shift: bool,
    },
    Split {
        pts: Pts,
    },
    CreateTransition {
        audio: bool,
        cut: usize,
        length: Pts,
    },
    TrimTransition {
        transition: usize,
        side: TrimSide,
        amount: Pts,
    },
    Unapply {
        transition: usize,
    },
    Drag {
        clip: usize,
        delta: Pts,
        video_offset: isize,
        audio_offset: isize,
    },
}

fn side() -> impl Strategy<Value = TrimSide> {
    prop_oneof![Just(TrimSide::Begin), Just(TrimSide::End)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..16usize, side(), -80..80i64, any::<bool>()).prop_map(|(clip, side, amount, shift)| {
            Op::Trim {
                clip,
                side,
                amount,
                shift,
            }
        }),
        (0..16usize, any::<bool>()).prop_map(|(clip, shift)| Op::Delete { clip, shift }),
        (0..600i64).prop_map(|pts| Op::Split { pts }),
        (any::<bool>(), 0..16usize, 1..40i64).prop_map(|(audio, cut, length)| {
            Op::CreateTransition { audio, cut, length }
        }),
        (0..8usize, side(), -30..30i64).prop_map(|(transition, side, amount)| {
            Op::TrimTransition {
                transition,
                side,
                amount,
            }
        }),
        (0..8usize).prop_map(|transition| Op::Unapply { transition }),
        (0..16usize, -150..150i64, 0..3isize, 0..2isize).prop_map(
            |(clip, delta, video_offset, audio_offset)| Op::Drag {
                clip,
                delta,
                video_offset,
                audio_offset,
            }
        ),
    ]
}

/// Linked clips cut from the middle of their media: (length, head, tail).
fn sequence(clips: &[(Pts, Pts, Pts)]) -> Sequence {
    let mut sequence = Sequence::new("Random");
    let video = sequence.video_tracks()[0].id;
    let audio = sequence.audio_tracks()[0].id;
    for (n, &(length, head, tail)) in clips.iter().enumerate() {
        let media = MediaSource::new(format!("clip{n}.mov"), head + length + tail);
        sequence
            .append_linked(video, audio, SourceClip::new(media, head, length))
            .expect("append to fresh tracks");
    }
    sequence
}

fn nth_source(ctx: &EditContext, kind: TrackKind, n: usize) -> Option<ClipId> {
    let track = ctx.sequence().track_at(kind, 0)?;
    let sources: Vec<_> = track
        .clips()
        .iter()
        .filter(|clip| clip.is_source() && clip.length() > 0)
        .collect();
    if sources.is_empty() {
        return None;
    }
    Some(sources[n % sources.len()].id)
}

fn nth_transition(ctx: &EditContext, n: usize) -> Option<ClipId> {
    let transitions: Vec<ClipId> = ctx
        .sequence()
        .tracks()
        .flat_map(|track| track.clips().iter())
        .filter(|clip| clip.is_transition())
        .map(|clip| clip.id)
        .collect();
    if transitions.is_empty() {
        return None;
    }
    Some(transitions[n % transitions.len()])
}

/// Apply `op`; returns whether a command was pushed.
fn run(ctx: &mut EditContext, op: &Op) -> bool {
    match *op {
        Op::Trim {
            clip,
            side,
            amount,
            shift,
        } => match nth_source(ctx, TrackKind::Video, clip) {
            Some(id) => ctx.trim(id, side, amount, shift).expect("trim a live clip"),
            None => false,
        },
        Op::Delete { clip, shift } => match nth_source(ctx, TrackKind::Audio, clip) {
            Some(id) => ctx.delete(&[id], shift).expect("delete a live clip"),
            None => false,
        },
        Op::Split { pts } => ctx.split(pts).expect("split is never an error"),
        Op::CreateTransition { audio, cut, length } => {
            let kind = if audio { TrackKind::Audio } else { TrackKind::Video };
            let Some(track) = ctx.sequence().track_at(kind, 0) else {
                return false;
            };
            let (track, cuts) = (track.id, track.cuts());
            let pts = cuts[cut % cuts.len()];
            ctx.create_transition(track, pts, Some(length), TransitionKind::CrossFade)
                .expect("create at a cut")
        }
        Op::TrimTransition {
            transition,
            side,
            amount,
        } => match nth_transition(ctx, transition) {
            Some(id) => ctx.trim(id, side, amount, false).expect("trim a live transition"),
            None => false,
        },
        Op::Unapply { transition } => match nth_transition(ctx, transition) {
            Some(id) => {
                ctx.unapply_transition(id).expect("unapply a live transition");
                true
            }
            None => false,
        },
        Op::Drag {
            clip,
            delta,
            video_offset,
            audio_offset,
        } => {
            let Some(id) = nth_source(ctx, TrackKind::Video, clip) else {
                return false;
            };
            let mut drag = ctx.begin_drag(&[id], 0).expect("drag a live clip");
            let target = DragTarget::new(delta, video_offset, audio_offset);
            ctx.drag_to(&mut drag, target, 1.0).expect("drag onto an existing track");
            ctx.finish_drag(drag, None).expect("drop the dragged clips")
        }
    }
}

fn clips() -> impl Strategy<Value = Vec<(Pts, Pts, Pts)>> {
    prop::collection::vec((1..120i64, 0..60i64, 0..60i64), 1..6)
}

proptest! {
    #[test]
    fn distribute_total_is_bounded(length in 0..500i64, left in 0..300i64, right in 0..300i64) {
        let (l, r) = distribute(length, left, right);
        prop_assert_eq!(l + r, length.min(left + right));
        prop_assert!(l <= left);
        prop_assert!(r <= right);
        prop_assert!(l >= 0 && r >= 0);
    }

    #[test]
    fn distribute_is_even_with_room(length in 0..500i64) {
        let (l, r) = distribute(length, length, length);
        prop_assert_eq!(l, length / 2);
        prop_assert_eq!(r, length - length / 2);
    }

    #[test]
    fn random_session_undoes_to_start(clips in clips(), ops in prop::collection::vec(op(), 1..16)) {
        crate::init_tracing();
        let start = sequence(&clips);
        let mut ctx = EditContext::new(start.clone(), EditConfig::default());

        let mut pushed = 0;
        for op in &ops {
            if run(&mut ctx, op) {
                pushed += 1;
            }
            prop_assert!(ctx.sequence().verify().is_ok());
        }
        prop_assert_eq!(ctx.history().undo_count(), pushed);

        let end = ctx.sequence().clone();
        while ctx.undo() {}
        prop_assert_eq!(ctx.sequence(), &start);
        while ctx.redo() {}
        prop_assert_eq!(ctx.sequence(), &end);
    }

    #[test]
    fn linked_tracks_stay_in_step(clips in clips(), ops in prop::collection::vec(op(), 1..8)) {
        let mut ctx = EditContext::new(sequence(&clips), EditConfig::default());
        for op in ops
            .iter()
            .filter(|op| !matches!(op, Op::Delete { .. } | Op::Drag { .. }))
        {
            run(&mut ctx, op);
        }
        let video = ctx.sequence().track_at(TrackKind::Video, 0).map(|t| t.length());
        let audio = ctx.sequence().track_at(TrackKind::Audio, 0).map(|t| t.length());
        prop_assert_eq!(video, audio);
    }
}
