//! Benchmarks for the replace engine and the edits built on it.
//!
//! Run with: cargo bench -p cutline-timeline

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cutline_timeline::delete::delete_clips;
use cutline_timeline::split::split_at;
use cutline_timeline::transitions::create_transition;
use cutline_timeline::trim::{trim, TrimSide};
use cutline_timeline::{ClipId, MediaSource, Sequence, SourceClip, TransitionKind};

/// A sequence with `count` linked clips of 100 ticks, each with 50 ticks of
/// hidden material on both sides.
fn long_sequence(count: usize) -> (Sequence, Vec<ClipId>) {
    let mut sequence = Sequence::new("Bench");
    let video = sequence.video_tracks()[0].id;
    let audio = sequence.audio_tracks()[0].id;
    let media = SourceClip::new(MediaSource::new("bench.mov", 200), 50, 100);
    let clips = (0..count)
        .map(|_| {
            sequence
                .append_linked(video, audio, media.clone())
                .map(|(v, _)| v)
                .expect("append")
        })
        .collect();
    (sequence, clips)
}

fn bench_trim(c: &mut Criterion) {
    let (sequence, clips) = long_sequence(500);
    let middle = clips[250];

    c.bench_function("trim_end_500_clips", |bencher| {
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| trim(&mut sequence, black_box(middle), TrimSide::End, -20, false),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("shift_trim_end_500_clips", |bencher| {
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| trim(&mut sequence, black_box(middle), TrimSide::End, 20, true),
            BatchSize::SmallInput,
        );
    });
}

fn bench_transition(c: &mut Criterion) {
    let (sequence, _) = long_sequence(500);
    let video = sequence.video_tracks()[0].id;

    c.bench_function("create_linked_transition", |bencher| {
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| {
                create_transition(&mut sequence, video, black_box(25_000), 24, TransitionKind::CrossFade)
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_split_and_delete(c: &mut Criterion) {
    let (sequence, clips) = long_sequence(500);

    c.bench_function("split_all_tracks", |bencher| {
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| split_at(&mut sequence, black_box(25_050)),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("shift_delete_10_clips", |bencher| {
        let selection = &clips[100..110];
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| delete_clips(&mut sequence, black_box(selection), true),
            BatchSize::SmallInput,
        );
    });
}

fn bench_undo(c: &mut Criterion) {
    let (mut sequence, clips) = long_sequence(500);
    let edit = delete_clips(&mut sequence, &clips[..100], true)
        .expect("delete")
        .expect("something deleted");
    let inverse = edit.inverse();

    c.bench_function("undo_shift_delete_100_clips", |bencher| {
        bencher.iter_batched(
            || sequence.clone(),
            |mut sequence| inverse.apply(&mut sequence),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_trim,
    bench_transition,
    bench_split_and_delete,
    bench_undo
);
criterion_main!(benches);
