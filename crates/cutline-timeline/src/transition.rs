//! Transitions between adjacent clips.
//!
//! A transition sits in a track like any other clip, at a cut between two
//! clips. `left` ticks of it were taken from the visible end of the clip
//! before it and `right` ticks from the visible start of the clip after it,
//! so creating or removing a transition never changes the track length.
//! The clips on a non-zero side render underneath the whole transition and
//! therefore keep that much hidden source material in reserve.

use cutline_core::Pts;
use serde::{Deserialize, Serialize};

/// How the two sides are blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransitionKind {
    #[default]
    CrossFade,
    Dissolve,
    WipeLeft,
    WipeRight,
}

/// A transition over a cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Ticks before the cut.
    pub left: Pts,
    /// Ticks after the cut.
    pub right: Pts,
    #[serde(default)]
    pub kind: TransitionKind,
}

impl Transition {
    /// Create a cross-fade with the given sides.
    ///
    /// # Panics
    /// If a side is negative or both are zero.
    pub fn new(left: Pts, right: Pts) -> Self {
        assert!(
            left >= 0 && right >= 0 && left + right > 0,
            "invalid transition sides {left}|{right}"
        );
        Self {
            left,
            right,
            kind: TransitionKind::default(),
        }
    }

    pub fn with_kind(mut self, kind: TransitionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Total length, always `left + right`.
    #[inline]
    pub fn length(&self) -> Pts {
        self.left + self.right
    }

    /// Offset of the cut inside the transition.
    #[inline]
    pub fn touch_offset(&self) -> Pts {
        self.left
    }

    /// Fades in the clip after it only.
    #[inline]
    pub fn is_in_only(&self) -> bool {
        self.left == 0
    }

    /// Fades out the clip before it only.
    #[inline]
    pub fn is_out_only(&self) -> bool {
        self.right == 0
    }

    #[inline]
    pub fn is_in_out(&self) -> bool {
        self.left > 0 && self.right > 0
    }
}

/// Split a requested transition length over the two sides of a cut.
///
/// `available_left` and `available_right` are the most each side can give.
/// The left side asks for `length / 2` and the right side for the rest.
/// A side that cannot give its share gives what it has and the other side
/// makes up the difference as far as it can, so the returned total is
/// `min(length, available_left + available_right)`.
pub fn distribute(length: Pts, available_left: Pts, available_right: Pts) -> (Pts, Pts) {
    let available_left = available_left.max(0);
    let available_right = available_right.max(0);
    let length = length.max(0);
    let want_left = length / 2;
    let want_right = length - want_left;

    if available_left >= want_left && available_right >= want_right {
        (want_left, want_right)
    } else if available_left < want_left {
        let right = (length - available_left).min(available_right);
        (available_left, right)
    } else {
        let left = (length - available_right).min(available_left);
        (left, available_right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_sides() {
        let transition = Transition::new(10, 0);
        assert_eq!(transition.length(), 10);
        assert!(transition.is_out_only());
        assert!(!transition.is_in_only());
        assert_eq!(transition.touch_offset(), 10);
        assert!(Transition::new(3, 4).is_in_out());
    }

    #[test]
    #[should_panic(expected = "invalid transition")]
    fn test_zero_transition_rejected() {
        let _ = Transition::new(0, 0);
    }

    #[test]
    fn test_distribute_symmetric() {
        assert_eq!(distribute(20, 50, 50), (10, 10));
    }

    #[test]
    fn test_distribute_odd_length_extra_tick_goes_right() {
        assert_eq!(distribute(21, 50, 50), (10, 11));
    }

    #[test]
    fn test_distribute_shortfall_moves_to_other_side() {
        assert_eq!(distribute(20, 4, 50), (4, 16));
        assert_eq!(distribute(20, 50, 3), (17, 3));
    }

    #[test]
    fn test_distribute_one_sided() {
        assert_eq!(distribute(20, 0, 50), (0, 20));
        assert_eq!(distribute(20, 12, 0), (12, 0));
    }

    #[test]
    fn test_distribute_nothing_available() {
        assert_eq!(distribute(20, 0, 0), (0, 0));
    }

    #[test]
    fn test_kind_serde_default() {
        let transition: Transition = serde_json::from_str(r#"{"left":2,"right":3}"#).unwrap();
        assert_eq!(transition.kind, TransitionKind::CrossFade);
        assert_eq!(transition.length(), 5);
    }
}
