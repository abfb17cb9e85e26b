//! Core types for the steppable sample sort.
//!
//! This module defines:
//! - [`Config`]: tuning knobs with the documented defaults below.
//! - [`State`] and [`FrameKind`]: the per-frame state machine vocabulary.
//! - [`Frame`]: the explicit stand-in for a recursive call's stack frame.
//! - [`BucketCounts`]: cache-aligned per-bucket histogram.

use std::fmt;
use std::ops::Range;

use cuneiform::cuneiform;

use crate::error::{Result, SortError};

/// Unit size of the base case.
pub const BASE_CASE_SIZE: usize = 16;

/// Multiplier applied to [`BASE_CASE_SIZE`]. Ranges of at most
/// `BASE_CASE_SIZE * BASE_CASE_MULTIPLIER` elements are insertion sorted.
pub const BASE_CASE_MULTIPLIER: usize = 16;

/// Upper bound on `log2` of the bucket count of a single partitioning step.
pub const LOG_MAX_BUCKETS: u32 = 8;

/// Size of the fixed bucket tables. Bucket ids must fit in a `u8`.
pub const MAX_BUCKETS: usize = 1 << LOG_MAX_BUCKETS;

/// Oversampling factor as a percentage of `log2(n)`.
pub const OVERSAMPLING_PERCENT: usize = 20;

/// Upper bound accepted for [`Config::oversampling_percent`].
pub const MAX_OVERSAMPLING_PERCENT: usize = 10_000;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x1ab5_a3c9_7e57_0b01;

/// Tuning parameters of the sort.
///
/// All fields have documented defaults (see the constants of this module). Use
/// [`Config::validate`] (or [`StateMachine::with_config`](crate::StateMachine::with_config),
/// which calls it) before handing a hand-built value to the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Base-case unit. Also the divisor that picks the bucket count.
    pub base_case_size: usize,
    /// Threshold multiplier; `base_case_size * base_case_multiplier` is the largest
    /// range sorted directly.
    pub base_case_multiplier: usize,
    /// Cap on `log2(bucket count)`, in `1..=LOG_MAX_BUCKETS`.
    pub log_max_buckets: u32,
    /// Oversampling factor in percent of `log2(n)`, at most [`MAX_OVERSAMPLING_PERCENT`].
    pub oversampling_percent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_case_size: BASE_CASE_SIZE,
            base_case_multiplier: BASE_CASE_MULTIPLIER,
            log_max_buckets: LOG_MAX_BUCKETS,
            oversampling_percent: OVERSAMPLING_PERCENT,
        }
    }
}

impl Config {
    /// Checks that every field is in its supported domain.
    pub fn validate(&self) -> Result<()> {
        if self.base_case_size == 0 {
            return Err(SortError::InvalidConfig("base_case_size must be non-zero"));
        }
        if self.base_case_multiplier == 0 {
            return Err(SortError::InvalidConfig(
                "base_case_multiplier must be non-zero",
            ));
        }
        if self.base_case_size.checked_mul(self.base_case_multiplier).is_none() {
            return Err(SortError::InvalidConfig("base case threshold overflows"));
        }
        if !(1..=LOG_MAX_BUCKETS).contains(&self.log_max_buckets) {
            return Err(SortError::InvalidConfig(
                "log_max_buckets must be in 1..=8",
            ));
        }
        if self.oversampling_percent > MAX_OVERSAMPLING_PERCENT {
            return Err(SortError::InvalidConfig(
                "oversampling_percent must be at most 10000",
            ));
        }
        Ok(())
    }

    /// Largest range length handled by insertion sort.
    #[inline]
    pub fn base_case_threshold(&self) -> usize {
        self.base_case_size * self.base_case_multiplier
    }

    /// `log2` of the bucket count for a range of `n` elements.
    ///
    /// Grows with `n / base_case_size`, never below 1 and never above `log_max_buckets`.
    pub fn log_buckets(&self, n: usize) -> u32 {
        (n / self.base_case_size)
            .checked_ilog2()
            .unwrap_or(0)
            .clamp(1, self.log_max_buckets)
    }

    /// Distance between consecutive splitter candidates in the sorted sample.
    pub fn oversampling_factor(&self, n: usize) -> usize {
        let log_n = n.checked_ilog2().unwrap_or(0) as usize;
        (self.oversampling_percent.saturating_mul(log_n) / 100).max(1)
    }

    /// Computes every sampling parameter for a range of `n` elements.
    pub fn sampling_params(&self, n: usize) -> SamplingParams {
        let log_buckets = self.log_buckets(n);
        let num_buckets = 1usize << log_buckets;
        let step = self.oversampling_factor(n);
        let num_samples = (step.saturating_mul(num_buckets) - 1).min(n / 2);
        SamplingParams {
            log_buckets,
            num_buckets,
            step,
            num_samples,
        }
    }
}

/// Position of a frame in the per-frame state machine.
///
/// A frame moves `SimpleCases -> BaseCase -> Sampling -> Classification ->
/// Partitioning -> Recursion`, leaving early whenever it can be resolved directly.
/// `Done` is never stored on a frame: it is what the machine reports once its stack
/// is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    SimpleCases,
    BaseCase,
    Sampling,
    Classification,
    Partitioning,
    Recursion,
    Done,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::SimpleCases => "simple-cases",
            State::BaseCase => "base-case",
            State::Sampling => "sampling",
            State::Classification => "classification",
            State::Partitioning => "partitioning",
            State::Recursion => "recursion",
            State::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a frame is sorting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Ordinary sort of the whole input or of a bucket.
    MainSort,
    /// Sort of a sample whose result feeds the splitters of the frame below it.
    SampleSort,
}

/// Sampling parameters, fixed once a frame enters [`State::Sampling`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingParams {
    pub log_buckets: u32,
    pub num_buckets: usize,
    /// Oversampling step between splitter candidates.
    pub step: usize,
    pub num_samples: usize,
}

// Cache-aligned counts struct.
#[cuneiform]
pub struct BucketCounts {
    data: [usize; MAX_BUCKETS],
    len: usize,
}

impl BucketCounts {
    pub fn new() -> Self {
        Self {
            data: [0; MAX_BUCKETS],
            len: 0,
        }
    }

    /// Zeroes the table and activates the first `len` buckets.
    pub fn reset(&mut self, len: usize) {
        debug_assert!(len <= MAX_BUCKETS);
        self.data[..self.len].fill(0);
        self.len = len;
    }

    #[inline(always)]
    pub(crate) fn increment(&mut self, bucket: usize) {
        self.data[bucket] += 1;
    }

    /// Counts of the active buckets.
    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of classified elements.
    pub fn total(&self) -> usize {
        self.as_slice().iter().sum()
    }
}

impl Default for BucketCounts {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BucketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// A unit of pending work: a sub-range of the input plus everything accumulated
/// while processing it.
///
/// Every field that must survive a push/pop boundary lives here rather than on the
/// machine, so a child's sampling never clobbers its parent's parameters.
pub struct Frame<T> {
    pub(crate) begin: usize,
    pub(crate) end: usize,
    pub(crate) kind: FrameKind,
    pub(crate) state: State,
    pub(crate) params: Option<SamplingParams>,
    pub(crate) splitters: Vec<T>,
    pub(crate) counts: BucketCounts,
    /// Bucket id per element, written by classification and consumed by partitioning.
    pub(crate) oracle: Vec<u8>,
    pub(crate) bucket_starts: Vec<usize>,
}

impl<T> Frame<T> {
    pub(crate) fn new(range: Range<usize>, kind: FrameKind) -> Self {
        debug_assert!(range.start <= range.end);
        Self {
            begin: range.start,
            end: range.end,
            kind,
            state: State::SimpleCases,
            params: None,
            splitters: Vec::new(),
            counts: BucketCounts::new(),
            oracle: Vec::new(),
            bucket_starts: Vec::new(),
        }
    }

    /// Absolute range of the input covered by this frame.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Sampling parameters, once the frame has entered [`State::Sampling`].
    pub fn params(&self) -> Option<&SamplingParams> {
        self.params.as_ref()
    }

    /// Strictly ascending splitters. Empty until the sample has been sorted.
    pub fn splitters(&self) -> &[T] {
        &self.splitters
    }

    pub fn bucket_counts(&self) -> &BucketCounts {
        &self.counts
    }

    /// Bucket offsets relative to [`Frame::range`], `buckets + 1` entries long.
    /// Empty until partitioning has completed.
    pub fn bucket_starts(&self) -> &[usize] {
        &self.bucket_starts
    }
}

impl<T> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("range", &self.range())
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("params", &self.params)
            .field("splitters", &self.splitters.len())
            .field("counts", &self.counts)
            .field("bucket_starts", &self.bucket_starts)
            .finish()
    }
}
