//! Error types for the sample sort state machine.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors surfaced by [`StateMachine`](crate::machine::StateMachine).
///
/// Comparator misbehaviour is not detected. A comparator that is not a strict weak
/// ordering leaves the output order unspecified.
#[derive(Debug, Error)]
pub enum SortError {
    /// The requested range does not describe a sub-slice of the input.
    #[error("invalid range {begin}..{end} for a sequence of length {len}")]
    InvalidRange { begin: usize, end: usize, len: usize },

    /// A configuration value is out of its supported domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Growing an internal bookkeeping vector failed.
    ///
    /// The frame that triggered the failure stays on top of the stack.
    #[error("failed to allocate {what} for frame {begin}..{end}")]
    Allocation {
        what: &'static str,
        begin: usize,
        end: usize,
        #[source]
        source: TryReserveError,
    },

    /// An earlier step failed and the machine must not be driven further.
    #[error("state machine is poisoned by an earlier failure")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, SortError>;
