//! # Stepsort
//!
//! `stepsort` is an in-place, unstable sample sort whose recursion has been turned into an
//! explicit, steppable state machine.
//!
//! A [`StateMachine`] keeps a stack of [`Frame`]s, each one the stand-in for a recursive
//! call. Every call to [`StateMachine::step`] runs exactly one state handler on the top
//! frame and returns. Drivers can therefore single-step, trace, budget or interleave the
//! sort with other work, and native stack usage does not depend on the input.
//!
//! ## Algorithm
//!
//! Each frame walks through the following states:
//!
//! 1. **Simple cases**: empty, sorted and reverse-sorted ranges are resolved in O(n).
//! 2. **Base case**: ranges of at most `BASE_CASE_SIZE * BASE_CASE_MULTIPLIER` elements
//!    are insertion sorted.
//! 3. **Sampling**: a random sample is moved to the front of the range and sorted by a
//!    child frame; splitters are then picked from it with oversampling and duplicate
//!    elision.
//! 4. **Classification**: exact bucket sizes via binary search over the splitters.
//! 5. **Partitioning**: elements are moved into contiguous buckets by a pluggable
//!    [`Partitioner`](algo::Partitioner).
//! 6. **Recursion**: buckets above the threshold become new frames, pushed so that the
//!    leftmost bucket runs first.
//!
//! Sample selection draws from a random source owned by the machine and seeded by
//! [`StateMachine::with_seed`] (or [`DEFAULT_SEED`](crate::core::DEFAULT_SEED)), so runs are
//! reproducible.
//!
//! ## Usage
//!
//! ### One shot
//!
//! ```rust
//! let mut data = vec![3, 1, 4, 1, 5, 9, 2, 6];
//! stepsort::sort(&mut data);
//! assert_eq!(data, vec![1, 1, 2, 3, 4, 5, 6, 9]);
//! ```
//!
//! ### Stepping
//!
//! ```rust
//! use stepsort::prelude::*;
//!
//! let mut data: Vec<u32> = (0..1000).map(|i| (i * 7919) % 1000).collect();
//! let mut machine = StateMachine::new(&mut data).with_seed(7);
//!
//! let mut trace = Vec::new();
//! while let Some(event) = machine.step().unwrap() {
//!     trace.push(event.state);
//! }
//!
//! assert!(trace.contains(&State::Sampling));
//! assert!(data.windows(2).all(|w| w[0] <= w[1]));
//! ```
//!
//! ## Performance Characteristics
//!
//! - **Expected**: O(n log n) comparisons; randomised sampling gives no worst-case bound.
//! - **Simple inputs**: sorted, reverse-sorted and all-equal inputs take O(n).
//! - **Memory Overhead**: one byte per element of the frame being partitioned, plus the
//!   splitters and a fixed bucket table per pending frame.

pub mod algo;
pub mod core;
pub mod error;
pub mod machine;

use std::cmp::Ordering;

pub use crate::core::{Config, Frame, FrameKind, SamplingParams, State};
pub use error::{Result, SortError};
pub use machine::{StateMachine, StepEvent};

pub mod prelude {
    pub use crate::algo::{Partitioner, PrefixSumPartitioner, SequentialPartitioner};
    pub use crate::core::{Config, FrameKind, State};
    pub use crate::error::SortError;
    pub use crate::machine::{StateMachine, StepEvent};
    pub use crate::{sort, sort_by, sort_by_key};
}

/// Sorts `v` by its natural order.
///
/// # Panics
///
/// Panics if internal bookkeeping cannot be allocated.
///
/// # Examples
///
/// ```
/// let mut data = vec!["banana", "apple", "cherry"];
/// stepsort::sort(&mut data);
/// assert_eq!(data, vec!["apple", "banana", "cherry"]);
/// ```
pub fn sort<T: Ord + Clone>(v: &mut [T]) {
    run_to_completion(StateMachine::new(v));
}

/// Sorts `v` with a comparator function.
///
/// The comparator must induce a strict weak ordering; otherwise the resulting order is
/// unspecified.
///
/// # Panics
///
/// Panics if internal bookkeeping cannot be allocated.
///
/// # Examples
///
/// ```
/// let mut data = vec![1, 5, 2, 4, 3];
/// stepsort::sort_by(&mut data, |a, b| b.cmp(a));
/// assert_eq!(data, vec![5, 4, 3, 2, 1]);
/// ```
pub fn sort_by<T, F>(v: &mut [T], mut compare: F)
where
    T: Clone,
    F: FnMut(&T, &T) -> Ordering,
{
    run_to_completion(StateMachine::with_comparator(v, |a: &T, b: &T| {
        compare(a, b) == Ordering::Less
    }));
}

/// Sorts `v` by a key extracted from every element.
///
/// # Panics
///
/// Panics if internal bookkeeping cannot be allocated.
pub fn sort_by_key<T, K, F>(v: &mut [T], mut key: F)
where
    T: Clone,
    K: Ord,
    F: FnMut(&T) -> K,
{
    run_to_completion(StateMachine::with_comparator(v, |a: &T, b: &T| {
        key(a) < key(b)
    }));
}

fn run_to_completion<T, F, P>(mut machine: StateMachine<'_, T, F, P>)
where
    T: Clone,
    F: FnMut(&T, &T) -> bool,
    P: algo::Partitioner,
{
    if let Err(err) = machine.run() {
        panic!("stepsort: {err}");
    }
}
