//! The per-state algorithms of the sample sort.
//!
//! Each function here does the work of one state handler of
//! [`StateMachine`](crate::machine::StateMachine) on a plain slice:
//! - **Simple cases**: empty, sorted and reverse-sorted detection.
//! - **Base case**: stable insertion sort.
//! - **Sampling**: partial Fisher–Yates sample selection and splitter construction.
//! - **Classification**: per-bucket counts via binary search over the splitters.
//! - **Partitioning**: the [`Partitioner`] strategies.
//!
//! None of them recurse. The comparator is passed as an `is_less` predicate and must be
//! a strict weak ordering.

use std::collections::TryReserveError;

use rand::Rng;

use crate::core::{BucketCounts, MAX_BUCKETS};

/// Outcome of [`detect_simple_case`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimpleCase {
    Empty,
    Sorted,
    /// The range was non-increasing and has been reversed in place.
    Reversed,
    /// None of the above; the general algorithm is needed.
    Unsorted,
}

/// Resolves ranges that need no real sorting work in one linear pass.
///
/// If the last element is not less than the first, the range can only be sorted or
/// unsorted. Otherwise it is scanned for a non-increasing run; the scan stops at the
/// first ascending adjacent pair. Only the [`SimpleCase::Reversed`] outcome mutates `v`.
pub fn detect_simple_case<T, F>(v: &mut [T], is_less: &mut F) -> SimpleCase
where
    F: FnMut(&T, &T) -> bool,
{
    let (Some(first), Some(last)) = (v.first(), v.last()) else {
        return SimpleCase::Empty;
    };

    if !is_less(last, first) {
        return if v.windows(2).all(|w| !is_less(&w[1], &w[0])) {
            SimpleCase::Sorted
        } else {
            SimpleCase::Unsorted
        };
    }

    if v.windows(2).any(|w| is_less(&w[0], &w[1])) {
        return SimpleCase::Unsorted;
    }
    v.reverse();
    SimpleCase::Reversed
}

/// Stable linear insertion sort.
pub fn insertion_sort<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && is_less(&v[i], &v[j - 1]) {
            j -= 1;
        }
        if j < i {
            v[j..=i].rotate_right(1);
        }
    }
}

/// Sorts a range that is small enough to never need a frame of its own.
pub fn sort_small<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    if detect_simple_case(v, is_less) == SimpleCase::Unsorted {
        insertion_sort(v, is_less);
    }
}

/// Moves a uniform random sample of `num_samples` elements, drawn without replacement,
/// to the front of `v`.
///
/// Partial Fisher–Yates: O(`num_samples`) time, no extra space.
pub fn select_sample<T, R>(v: &mut [T], num_samples: usize, rng: &mut R)
where
    R: Rng + ?Sized,
{
    debug_assert!(num_samples <= v.len());
    let len = v.len();
    for i in 0..num_samples {
        let j = rng.random_range(i..len);
        v.swap(i, j);
    }
}

/// Picks splitters from a sorted `sample`.
///
/// Candidates are taken every `step` elements starting at `step - 1`. A candidate
/// equal to the last accepted splitter is skipped one element at a time until a larger
/// element shows up, so `out` ends strictly ascending. At most `max_splitters` are
/// written. `out` is cleared first.
pub fn build_splitters<T, F>(
    sample: &[T],
    step: usize,
    max_splitters: usize,
    is_less: &mut F,
    out: &mut Vec<T>,
) -> Result<(), TryReserveError>
where
    T: Clone,
    F: FnMut(&T, &T) -> bool,
{
    debug_assert!(step >= 1);
    out.clear();
    out.try_reserve_exact(max_splitters.min(sample.len()))?;

    let mut i = step - 1;
    while i < sample.len() && out.len() < max_splitters {
        let candidate = &sample[i];
        if let Some(last) = out.last() {
            if !is_less(last, candidate) {
                i += 1;
                continue;
            }
        }
        out.push(candidate.clone());
        i += step;
    }

    // Only reachable with `step > sample.len()`; one splitter still guarantees progress.
    if out.is_empty() && !sample.is_empty() {
        out.push(sample[sample.len() / 2].clone());
    }
    Ok(())
}

/// Index of the bucket `x` belongs to: the number of splitters not greater than `x`.
///
/// Elements equal to a splitter land in the bucket that splitter opens.
#[inline]
pub fn bucket_of<T, F>(x: &T, splitters: &[T], is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    splitters.partition_point(|s| !is_less(x, s))
}

/// Counts bucket sizes of `v` and records every element's bucket id in `oracle`.
///
/// Read-only with respect to `v`. `counts` must already be reset to
/// `splitters.len() + 1` buckets, and `oracle` must be empty with room for `v.len()`.
pub fn classify<T, F>(
    v: &[T],
    splitters: &[T],
    counts: &mut BucketCounts,
    oracle: &mut Vec<u8>,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    debug_assert!(splitters.len() < MAX_BUCKETS);
    debug_assert_eq!(counts.len(), splitters.len() + 1);
    oracle.clear();
    for x in v {
        let bucket = bucket_of(x, splitters, is_less);
        counts.increment(bucket);
        oracle.push(bucket as u8);
    }
}

/// Strategy that rearranges a classified range into contiguous buckets.
///
/// On return, `starts` holds `counts.len() + 1` offsets relative to `v` with
/// `starts[0] == 0` and `starts[counts.len()] == v.len()`, and every element of bucket
/// `i` is not greater than any element of bucket `j > i`.
pub trait Partitioner {
    fn partition<T, F>(
        &mut self,
        v: &mut [T],
        splitters: &[T],
        counts: &[usize],
        oracle: &mut [u8],
        is_less: &mut F,
        starts: &mut Vec<usize>,
    ) where
        F: FnMut(&T, &T) -> bool;
}

/// One in-place partition pass per splitter over the not yet partitioned suffix.
///
/// O(n · buckets) comparisons in the worst case. Ignores the classification oracle.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialPartitioner;

impl Partitioner for SequentialPartitioner {
    fn partition<T, F>(
        &mut self,
        v: &mut [T],
        splitters: &[T],
        counts: &[usize],
        _oracle: &mut [u8],
        is_less: &mut F,
        starts: &mut Vec<usize>,
    ) where
        F: FnMut(&T, &T) -> bool,
    {
        debug_assert_eq!(counts.len(), splitters.len() + 1);
        starts.clear();
        starts.push(0);

        let mut boundary = 0;
        for splitter in splitters {
            let rest = &mut v[boundary..];
            let mut lt = 0;
            for k in 0..rest.len() {
                if is_less(&rest[k], splitter) {
                    rest.swap(lt, k);
                    lt += 1;
                }
            }
            boundary += lt;
            starts.push(boundary);
        }
        starts.push(v.len());
    }
}

/// Direct placement: prefix sums over the exact counts give every bucket its final
/// window, then elements are swapped into place following the oracle.
///
/// Every swap settles at least one element, so the pass does at most `n` swaps and no
/// comparisons.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrefixSumPartitioner;

impl Partitioner for PrefixSumPartitioner {
    fn partition<T, F>(
        &mut self,
        v: &mut [T],
        _splitters: &[T],
        counts: &[usize],
        oracle: &mut [u8],
        _is_less: &mut F,
        starts: &mut Vec<usize>,
    ) where
        F: FnMut(&T, &T) -> bool,
    {
        debug_assert_eq!(oracle.len(), v.len());
        let num_buckets = counts.len();

        starts.clear();
        starts.push(0);
        let mut sum = 0;
        for &count in counts {
            sum += count;
            starts.push(sum);
        }
        debug_assert_eq!(sum, v.len());

        // Next unsettled slot of every bucket.
        let mut next = [0usize; MAX_BUCKETS];
        next[..num_buckets].copy_from_slice(&starts[..num_buckets]);

        for bucket in 0..num_buckets {
            let end = starts[bucket + 1];
            while next[bucket] < end {
                let pos = next[bucket];
                let target = oracle[pos] as usize;
                if target == bucket {
                    next[bucket] += 1;
                } else {
                    let dst = next[target];
                    v.swap(pos, dst);
                    oracle.swap(pos, dst);
                    next[target] += 1;
                }
            }
        }
    }
}

/// Moves every element equal to `pivot` to the front of `v` and returns how many there
/// were. Requires every element of `v` to be not less than `pivot`.
pub fn partition_equal<T, F>(v: &mut [T], pivot: &T, is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    let mut eq = 0;
    for k in 0..v.len() {
        if !is_less(pivot, &v[k]) {
            v.swap(eq, k);
            eq += 1;
        }
    }
    eq
}
