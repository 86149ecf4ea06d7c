//! Cutline Core - Foundation types for timeline editing
//!
//! This crate provides the fundamental types used throughout Cutline:
//! - The integer timeline tick (`Pts`) and ranges over it
//! - Frame rates and rational conversion of ticks to seconds
//! - The shared error type

pub mod error;
pub mod time;

pub use error::{CutlineError, Result};
pub use time::{FrameRate, Pts, PtsRange, RationalTime};
