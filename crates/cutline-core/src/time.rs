//! Time representation for frame-accurate editing
//!
//! Timeline positions are integer ticks (`Pts`) shared by every audio and
//! video track of a sequence. One tick is one frame of the sequence frame
//! rate; conversion to wall-clock time goes through rational arithmetic so
//! no floating-point error accumulates.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A timeline position or length, in ticks.
pub type Pts = i64;

/// A rational time value in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    /// Create a new RationalTime of `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Time at which tick `pts` starts for the given rate.
    #[inline]
    pub fn from_pts(pts: Pts, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(pts * rate.denominator as i64, rate.numerator as i64),
        }
    }

    /// Tick containing this time (floored).
    #[inline]
    pub fn to_pts(self, rate: FrameRate) -> Pts {
        let ticks = self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64);
        ticks.floor().to_integer()
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Number of whole ticks covering `seconds`.
    pub fn pts_for_seconds(self, seconds: i64) -> Pts {
        RationalTime::new(seconds, 1).to_pts(self)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A half-open tick range `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PtsRange {
    /// First tick (inclusive)
    pub start: Pts,
    /// Number of ticks
    pub length: Pts,
}

impl PtsRange {
    #[inline]
    pub fn new(start: Pts, length: Pts) -> Self {
        Self { start, length }
    }

    #[inline]
    pub fn from_start_end(start: Pts, end: Pts) -> Self {
        Self {
            start,
            length: end - start,
        }
    }

    /// End tick (exclusive).
    #[inline]
    pub fn end(self) -> Pts {
        self.start + self.length
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.length <= 0
    }

    /// Check if a tick is within this range.
    #[inline]
    pub fn contains(self, pts: Pts) -> bool {
        pts >= self.start && pts < self.end()
    }

    /// Check if `other` lies entirely within this range.
    pub fn covers(self, other: Self) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Check if two ranges overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::from_start_end(
            self.start.max(other.start),
            self.end().min(other.end()),
        ))
    }

    /// The same range moved by `delta` ticks.
    #[inline]
    pub fn shifted(self, delta: Pts) -> Self {
        Self {
            start: self.start + delta,
            length: self.length,
        }
    }
}

impl fmt::Display for PtsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
