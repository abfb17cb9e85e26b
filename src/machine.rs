//! The scheduler: an explicit stack of [`Frame`]s driven one state transition at a time.
//!
//! Recursion in the textbook sample sort (sort the sample, partition, sort every
//! bucket) becomes pushes onto `stack`. A "return" is the parent frame showing up on
//! top again. Native stack usage stays constant regardless of input.

use std::collections::TryReserveError;
use std::ops::Range;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, trace};

use crate::algo::{self, Partitioner, PrefixSumPartitioner, SimpleCase};
use crate::core::{Config, DEFAULT_SEED, Frame, FrameKind, State};
use crate::error::{Result, SortError};

/// Description of the handler run by one [`StateMachine::step`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepEvent {
    /// State of the frame when the step started.
    pub state: State,
    pub kind: FrameKind,
    /// Absolute range of the frame.
    pub range: Range<usize>,
    /// Stack depth when the step started, the active frame included.
    pub depth: usize,
}

/// What a handler did with the frame it was given.
enum Transition<T> {
    /// State changed; the frame goes back on top.
    Advance,
    /// The range is sorted; the frame is dropped.
    Resolve,
    /// The frame goes back and `child` is pushed above it.
    Descend(Frame<T>),
    /// The frame is consumed; its buckets, in ascending order, are pushed.
    Split(Vec<Frame<T>>),
}

/// Sample sort over a mutable slice, executed one state transition per [`step`].
///
/// The machine owns nothing but bookkeeping: the frame stack and a seeded random
/// source used for sample selection. Given the same seed, input and configuration,
/// two machines take identical steps and produce identical output.
///
/// Abandoning a machine mid-run is safe but leaves the slice partially rearranged.
///
/// # Examples
///
/// ```
/// use stepsort::{State, StateMachine};
///
/// let mut data = vec![5, 4, 3, 2, 1];
/// let mut machine = StateMachine::new(&mut data);
///
/// let event = machine.step().unwrap().unwrap();
/// assert_eq!(event.state, State::SimpleCases);
/// assert!(machine.is_done());
/// assert_eq!(data, vec![1, 2, 3, 4, 5]);
/// ```
///
/// [`step`]: StateMachine::step
pub struct StateMachine<'a, T, F, P = PrefixSumPartitioner> {
    data: &'a mut [T],
    is_less: F,
    stack: Vec<Frame<T>>,
    rng: StdRng,
    config: Config,
    partitioner: P,
    steps: usize,
    poisoned: bool,
    /// Makes the next bookkeeping reservation in this state fail.
    #[cfg(test)]
    fail_reserve_in: Option<State>,
}

impl<'a, T> StateMachine<'a, T, fn(&T, &T) -> bool>
where
    T: Ord + Clone,
{
    /// Sorts `data` by its natural order.
    pub fn new(data: &'a mut [T]) -> Self {
        Self::with_comparator(data, <T as PartialOrd>::lt)
    }
}

impl<'a, T, F> StateMachine<'a, T, F>
where
    T: Clone,
    F: FnMut(&T, &T) -> bool,
{
    /// Sorts `data` by the strict weak ordering `is_less`.
    pub fn with_comparator(data: &'a mut [T], is_less: F) -> Self {
        let len = data.len();
        Self::build(data, 0..len, is_less)
    }

    /// Sorts only `data[range]`.
    ///
    /// Fails with [`SortError::InvalidRange`] if `range` is reversed or reaches past the
    /// end of `data`.
    pub fn with_range(data: &'a mut [T], range: Range<usize>, is_less: F) -> Result<Self> {
        if range.start > range.end || range.end > data.len() {
            return Err(SortError::InvalidRange {
                begin: range.start,
                end: range.end,
                len: data.len(),
            });
        }
        Ok(Self::build(data, range, is_less))
    }

    fn build(data: &'a mut [T], range: Range<usize>, is_less: F) -> Self {
        Self {
            data,
            is_less,
            stack: vec![Frame::new(range, FrameKind::MainSort)],
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            config: Config::default(),
            partitioner: PrefixSumPartitioner,
            steps: 0,
            poisoned: false,
            #[cfg(test)]
            fail_reserve_in: None,
        }
    }
}

impl<'a, T, F, P> StateMachine<'a, T, F, P> {
    /// Reseeds the sample selection. Call before the first step for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Replaces the default configuration after validating it.
    pub fn with_config(mut self, config: Config) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Swaps the partitioning strategy.
    pub fn with_partitioner<Q: Partitioner>(self, partitioner: Q) -> StateMachine<'a, T, F, Q> {
        StateMachine {
            data: self.data,
            is_less: self.is_less,
            stack: self.stack,
            rng: self.rng,
            config: self.config,
            partitioner,
            steps: self.steps,
            poisoned: self.poisoned,
            #[cfg(test)]
            fail_reserve_in: self.fail_reserve_in,
        }
    }

    /// `true` once every frame has been resolved.
    pub fn is_done(&self) -> bool {
        self.stack.is_empty()
    }

    /// State of the frame the next step will run, or [`State::Done`].
    pub fn state(&self) -> State {
        self.stack.last().map_or(State::Done, Frame::state)
    }

    /// Number of pending frames.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of handlers run so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The frame the next step will operate on.
    pub fn current_frame(&self) -> Option<&Frame<T>> {
        self.stack.last()
    }

    /// Pending frames, bottom of the stack first.
    pub fn frames(&self) -> &[Frame<T>] {
        &self.stack
    }

    /// The sequence being sorted, in its current arrangement.
    pub fn data(&self) -> &[T] {
        self.data
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

impl<'a, T, F, P> StateMachine<'a, T, F, P>
where
    T: Clone,
    F: FnMut(&T, &T) -> bool,
    P: Partitioner,
{
    /// Runs the handler of the top frame's current state.
    ///
    /// Returns `Ok(None)` without doing anything once the machine is done. After an
    /// error the failing frame is left on top of the stack and every further call
    /// returns [`SortError::Poisoned`].
    pub fn step(&mut self) -> Result<Option<StepEvent>> {
        if self.poisoned {
            return Err(SortError::Poisoned);
        }
        let Some(mut frame) = self.stack.pop() else {
            return Ok(None);
        };

        let event = StepEvent {
            state: frame.state,
            kind: frame.kind,
            range: frame.range(),
            depth: self.stack.len() + 1,
        };
        trace!(
            step = self.steps,
            state = %event.state,
            kind = ?event.kind,
            begin = frame.begin,
            end = frame.end,
            depth = event.depth,
            "step"
        );
        self.steps += 1;

        let transition = match frame.state {
            State::SimpleCases => Ok(self.on_simple_cases(&mut frame)),
            State::BaseCase => Ok(self.on_base_case(&mut frame)),
            State::Sampling => self.on_sampling(&mut frame),
            State::Classification => self.on_classification(&mut frame),
            State::Partitioning => self.on_partitioning(&mut frame),
            State::Recursion => self.on_recursion(&mut frame),
            State::Done => unreachable!("frames never hold State::Done"),
        };

        match transition {
            Ok(Transition::Advance) => self.stack.push(frame),
            Ok(Transition::Resolve) => {}
            Ok(Transition::Descend(child)) => {
                self.stack.push(frame);
                self.stack.push(child);
            }
            Ok(Transition::Split(buckets)) => self.stack.extend(buckets.into_iter().rev()),
            Err(err) => {
                error!(error = %err, begin = frame.begin, end = frame.end, "step failed");
                self.stack.push(frame);
                self.poisoned = true;
                return Err(err);
            }
        }
        Ok(Some(event))
    }

    /// Steps until the machine is done.
    #[tracing::instrument(skip_all, fields(len = self.data.len()))]
    pub fn run(&mut self) -> Result<()> {
        while self.step()?.is_some() {}
        debug!(steps = self.steps, "sort finished");
        Ok(())
    }

    /// Runs at most `max_steps` steps and returns how many were taken.
    ///
    /// Fewer than `max_steps` means the machine is done.
    pub fn run_for(&mut self, max_steps: usize) -> Result<usize> {
        let mut taken = 0;
        while taken < max_steps && self.step()?.is_some() {
            taken += 1;
        }
        Ok(taken)
    }

    fn on_simple_cases(&mut self, frame: &mut Frame<T>) -> Transition<T> {
        let v = &mut self.data[frame.begin..frame.end];
        match algo::detect_simple_case(v, &mut self.is_less) {
            SimpleCase::Unsorted => {
                frame.state = State::BaseCase;
                Transition::Advance
            }
            case => {
                trace!(?case, len = frame.len(), "resolved by simple case");
                Transition::Resolve
            }
        }
    }

    fn on_base_case(&mut self, frame: &mut Frame<T>) -> Transition<T> {
        if frame.len() <= self.config.base_case_threshold() {
            algo::insertion_sort(&mut self.data[frame.begin..frame.end], &mut self.is_less);
            Transition::Resolve
        } else {
            frame.state = State::Sampling;
            Transition::Advance
        }
    }

    fn on_sampling(&mut self, frame: &mut Frame<T>) -> Result<Transition<T>> {
        let Some(params) = frame.params else {
            // First entry: draw the sample and hand it to a child frame.
            let params = self.config.sampling_params(frame.len());
            algo::select_sample(
                &mut self.data[frame.begin..frame.end],
                params.num_samples,
                &mut self.rng,
            );
            debug!(
                len = frame.len(),
                log_buckets = params.log_buckets,
                step = params.step,
                num_samples = params.num_samples,
                "sample selected"
            );
            frame.params = Some(params);
            let sample = frame.begin..frame.begin + params.num_samples;
            return Ok(Transition::Descend(Frame::new(sample, FrameKind::SampleSort)));
        };

        // The sample frame has been resolved: its range is sorted.
        let sample = &self.data[frame.begin..frame.begin + params.num_samples];
        algo::build_splitters(
            sample,
            params.step,
            params.num_buckets - 1,
            &mut self.is_less,
            &mut frame.splitters,
        )
        .map_err(|source| allocation_error("splitters", frame, source))?;
        debug!(splitters = frame.splitters.len(), "splitters built");

        frame.counts.reset(frame.splitters.len() + 1);
        frame.state = State::Classification;
        Ok(Transition::Advance)
    }

    fn on_classification(&mut self, frame: &mut Frame<T>) -> Result<Transition<T>> {
        let len = frame.len();
        frame.oracle.clear();
        self.reserve(State::Classification, &mut frame.oracle, len)
            .map_err(|source| allocation_error("classification oracle", frame, source))?;
        algo::classify(
            &self.data[frame.begin..frame.end],
            &frame.splitters,
            &mut frame.counts,
            &mut frame.oracle,
            &mut self.is_less,
        );
        frame.state = State::Partitioning;
        Ok(Transition::Advance)
    }

    fn on_partitioning(&mut self, frame: &mut Frame<T>) -> Result<Transition<T>> {
        let buckets = frame.counts.len() + 1;
        self.reserve(State::Partitioning, &mut frame.bucket_starts, buckets)
            .map_err(|source| allocation_error("bucket starts", frame, source))?;
        self.partitioner.partition(
            &mut self.data[frame.begin..frame.end],
            &frame.splitters,
            frame.counts.as_slice(),
            &mut frame.oracle,
            &mut self.is_less,
            &mut frame.bucket_starts,
        );
        debug_assert_eq!(frame.bucket_starts.first(), Some(&0));
        debug_assert_eq!(frame.bucket_starts.last(), Some(&frame.len()));
        frame.oracle = Vec::new();
        frame.state = State::Recursion;
        Ok(Transition::Advance)
    }

    fn on_recursion(&mut self, frame: &mut Frame<T>) -> Result<Transition<T>> {
        let threshold = self.config.base_case_threshold();
        let num_buckets = frame.bucket_starts.len().saturating_sub(1);
        let mut children = Vec::new();
        self.reserve(State::Recursion, &mut children, num_buckets)
            .map_err(|source| allocation_error("bucket frames", frame, source))?;

        for bucket in 0..num_buckets {
            let mut begin = frame.begin + frame.bucket_starts[bucket];
            let end = frame.begin + frame.bucket_starts[bucket + 1];

            // Every element of this bucket is >= its lower splitter, which is itself an
            // element of the range. Peel off the run equal to it so the child shrinks.
            if bucket > 0 && end - begin == frame.len() {
                let pivot = &frame.splitters[bucket - 1];
                let equal = algo::partition_equal(
                    &mut self.data[begin..end],
                    pivot,
                    &mut self.is_less,
                );
                debug!(equal, len = end - begin, "split off run of duplicate splitter");
                begin += equal;
            }

            if end - begin > threshold {
                children.push(Frame::new(begin..end, FrameKind::MainSort));
            } else {
                algo::sort_small(&mut self.data[begin..end], &mut self.is_less);
            }
        }

        debug!(buckets = num_buckets, pushed = children.len(), "buckets scheduled");
        Ok(Transition::Split(children))
    }
}

impl<'a, T, F, P> StateMachine<'a, T, F, P> {
    fn reserve<U>(
        &mut self,
        state: State,
        vec: &mut Vec<U>,
        additional: usize,
    ) -> std::result::Result<(), TryReserveError> {
        if self.injected_failure(state) {
            return Vec::<u8>::new().try_reserve(usize::MAX);
        }
        vec.try_reserve_exact(additional)
    }

    #[cfg(test)]
    fn injected_failure(&mut self, state: State) -> bool {
        if self.fail_reserve_in == Some(state) {
            self.fail_reserve_in = None;
            return true;
        }
        false
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn injected_failure(&mut self, _state: State) -> bool {
        false
    }
}

fn allocation_error<T>(
    what: &'static str,
    frame: &Frame<T>,
    source: TryReserveError,
) -> SortError {
    SortError::Allocation {
        what,
        begin: frame.begin,
        end: frame.end,
        source,
    }
}
