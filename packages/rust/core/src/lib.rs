//! Run orchestration for leadflow.
//!
//! This crate ties the record source, the lead store, the classification
//! service, and the webhook sink into one batch run ([`Pipeline`]), with
//! classification and delivery fanned out through a [`ChunkedLimiter`].

pub mod classify;
pub mod dedup;
pub mod dispatch;
pub mod limiter;
pub mod persist;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use limiter::ChunkedLimiter;
pub use pipeline::{Pipeline, ProgressReporter, SilentProgress};
