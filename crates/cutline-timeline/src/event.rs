//! Change notifications for views of the timeline.
//!
//! Edits collect what they touched in a [`ChangeSet`]; the edit context
//! turns it into [`TimelineEvent`]s once per committed, undone or redone
//! command and sends them to every subscriber.

use cutline_core::Pts;
use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::sequence::Sequence;
use crate::track::Track;

/// Something a view may need to redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEvent {
    /// Tracks were added or removed.
    TracksChanged,
    /// The clip list of a track changed.
    ClipsReplaced { track: Uuid },
    /// A track got longer or shorter.
    TrackLengthChanged { track: Uuid, length: Pts },
    /// A track was resized on screen.
    TrackHeightChanged { track: Uuid, height: u32 },
}

/// What an edit touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    replaced: BTreeSet<Uuid>,
    /// Length of each touched track before its first change.
    lengths_before: BTreeMap<Uuid, Pts>,
    tracks_changed: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `track` is about to change.
    pub(crate) fn touch(&mut self, track: &Track) {
        self.replaced.insert(track.id);
        self.lengths_before.entry(track.id).or_insert(track.length());
    }

    pub(crate) fn mark_tracks_changed(&mut self) {
        self.tracks_changed = true;
    }

    /// Fold `other`, which happened after `self`, into this set.
    pub fn merge(&mut self, other: ChangeSet) {
        self.replaced.extend(other.replaced);
        for (track, length) in other.lengths_before {
            self.lengths_before.entry(track).or_insert(length);
        }
        self.tracks_changed |= other.tracks_changed;
    }

    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty() && !self.tracks_changed
    }

    pub fn touched_tracks(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.replaced.iter().copied()
    }

    /// Events describing the difference to the current state of `sequence`.
    pub fn events(&self, sequence: &Sequence) -> Vec<TimelineEvent> {
        let mut events = Vec::new();
        if self.tracks_changed {
            events.push(TimelineEvent::TracksChanged);
        }
        for id in &self.replaced {
            let Some(track) = sequence.track(*id) else {
                continue;
            };
            events.push(TimelineEvent::ClipsReplaced { track: *id });
            if self.lengths_before.get(id) != Some(&track.length()) {
                events.push(TimelineEvent::TrackLengthChanged {
                    track: *id,
                    length: track.length(),
                });
            }
        }
        events
    }
}

/// Fan-out of timeline events to subscribers.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Vec<Sender<TimelineEvent>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<TimelineEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Send events to every live subscriber, forgetting dropped ones.
    pub fn publish(&mut self, events: &[TimelineEvent]) {
        if events.is_empty() {
            return;
        }
        self.subscribers.retain(|subscriber| {
            events
                .iter()
                .all(|event| subscriber.send(*event).is_ok())
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_first_length() {
        let track = Track::new_video("V1");
        let mut first = ChangeSet::new();
        first.touch(&track);
        let mut second = ChangeSet::new();
        second.lengths_before.insert(track.id, 99);
        second.replaced.insert(track.id);
        first.merge(second);
        assert_eq!(first.lengths_before[&track.id], 0);
        assert_eq!(first.touched_tracks().count(), 1);
    }

    #[test]
    fn test_events_report_length_change_only_when_changed() {
        let sequence = Sequence::new("Main");
        let video = sequence.video_tracks()[0].id;
        let mut changes = ChangeSet::new();
        changes.touch(&sequence.video_tracks()[0]);
        let events = changes.events(&sequence);
        assert_eq!(events, vec![TimelineEvent::ClipsReplaced { track: video }]);

        changes.lengths_before.insert(video, 10);
        let events = changes.events(&sequence);
        assert!(events.contains(&TimelineEvent::TrackLengthChanged {
            track: video,
            length: 0
        }));
    }

    #[test]
    fn test_publish_drops_disconnected_subscribers() {
        let mut notifier = Notifier::new();
        let kept = notifier.subscribe();
        let dropped = notifier.subscribe();
        drop(dropped);
        notifier.publish(&[TimelineEvent::TracksChanged]);
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(TimelineEvent::TracksChanged));
    }
}
