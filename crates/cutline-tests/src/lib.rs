//! Integration test crate for Cutline.
//!
//! This crate exists solely to hold cross-module integration tests and
//! property tests of the timeline edit model.

#[cfg(test)]
mod properties;

#[cfg(test)]
mod timeline;

/// Install a log subscriber for the test run; `RUST_LOG` picks the level.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
