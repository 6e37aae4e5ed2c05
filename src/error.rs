//! Run-level error type.

/// Errors surfaced by [`MapReduce::run`](crate::MapReduce::run).
///
/// Contract violations inside user callbacks (an out-of-range partition id,
/// a panicking map or reduce function) abort the run by panicking instead;
/// there is no retry or partial-result path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
