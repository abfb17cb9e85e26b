use std::ops::Range;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use stepsort::prelude::*;

fn trace_states<T: Ord + Clone>(data: &mut [T], seed: u64) -> Vec<State> {
    let mut machine = StateMachine::new(data).with_seed(seed);
    let mut states = Vec::new();
    while let Some(event) = machine.step().unwrap() {
        states.push(event.state);
    }
    states
}

fn shuffled(len: u32, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v: Vec<u32> = (0..len).collect();
    v.shuffle(&mut rng);
    v
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

#[test]
fn test_reverse_input_single_step() {
    let mut data = vec![5, 4, 3, 2, 1];
    let mut machine = StateMachine::new(&mut data);
    assert_eq!(machine.state(), State::SimpleCases);

    let event = machine.step().unwrap().unwrap();
    assert_eq!(event.state, State::SimpleCases);
    assert_eq!(event.kind, FrameKind::MainSort);
    assert_eq!(event.range, 0..5);
    assert!(machine.is_done());
    assert_eq!(machine.state(), State::Done);

    // Terminal stepping is a no-op.
    assert!(machine.step().unwrap().is_none());
    assert_eq!(machine.steps(), 1);
    assert_eq!(data, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_large_reverse_input_never_samples() {
    let mut data: Vec<u32> = (1..=10_000).rev().collect();
    let states = trace_states(&mut data, 0);
    assert_eq!(states, vec![State::SimpleCases]);
    assert_eq!(data, (1..=10_000).collect::<Vec<_>>());
}

#[test]
fn test_empty_and_singleton() {
    let mut empty: Vec<u8> = vec![];
    let mut machine = StateMachine::new(&mut empty);
    assert_eq!(machine.run_for(10).unwrap(), 1);
    assert!(machine.is_done());

    let mut single = vec![9u8];
    assert_eq!(trace_states(&mut single, 0), vec![State::SimpleCases]);
    assert_eq!(single, vec![9]);
}

#[test]
fn test_sorted_input_is_idempotent() {
    let mut data = shuffled(10_000, 1);
    StateMachine::new(&mut data).run().unwrap();

    let before = data.clone();
    let states = trace_states(&mut data, 1);
    assert_eq!(states, vec![State::SimpleCases]);
    assert_eq!(data, before);
}

#[test]
fn test_all_equal_input() {
    let mut data = vec![7u64; 4096];
    let states = trace_states(&mut data, 0);
    assert_eq!(states, vec![State::SimpleCases]);
    assert!(data.iter().all(|&x| x == 7));
}

#[test]
fn test_base_case_boundary() {
    let threshold = Config::default().base_case_threshold();
    assert_eq!(threshold, 256);

    let mut data = shuffled(threshold as u32, 17);
    let states = trace_states(&mut data, 0);
    assert_eq!(states, vec![State::SimpleCases, State::BaseCase]);
    assert_eq!(data, (0..threshold as u32).collect::<Vec<_>>());

    let mut data = shuffled(threshold as u32 + 1, 17);
    let states = trace_states(&mut data, 0);
    assert_eq!(&states[..3], &[State::SimpleCases, State::BaseCase, State::Sampling]);
    assert_eq!(data, (0..=threshold as u32).collect::<Vec<_>>());
}

#[test]
fn test_full_pipeline_on_300_elements() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut data: Vec<i32> = (0..300).map(|_| rng.random_range(1..=100)).collect();
    let mut expected = data.clone();
    expected.sort_unstable();

    let mut machine = StateMachine::new(&mut data).with_seed(42);
    let mut events = Vec::new();
    while let Some(event) = machine.step().unwrap() {
        events.push(event);
    }

    let states: Vec<State> = events.iter().map(|e| e.state).collect();
    assert!(states.contains(&State::Sampling));
    assert!(states.contains(&State::Classification));
    assert!(states.contains(&State::Partitioning));
    assert!(states.contains(&State::Recursion));

    // The sample child sits directly above the root frame.
    let sample = events
        .iter()
        .find(|e| e.kind == FrameKind::SampleSort)
        .unwrap();
    assert_eq!(sample.depth, 2);
    assert_eq!(sample.range.start, 0);
    assert!(sample.range.end <= 150);

    // The root frame enters `Sampling` twice: once to draw, once to build splitters.
    let root_sampling = events
        .iter()
        .filter(|e| e.state == State::Sampling && e.range == (0..300))
        .count();
    assert_eq!(root_sampling, 2);

    assert_eq!(data, expected);
}

#[test]
fn test_determinism_under_fixed_seed() {
    let mut rng = StdRng::seed_from_u64(77);
    let input: Vec<u32> = (0..10_000).map(|_| rng.random_range(0..1000)).collect();

    let run = |seed: u64| {
        let mut data = input.clone();
        let mut machine = StateMachine::new(&mut data).with_seed(seed);
        let mut events = Vec::new();
        while let Some(event) = machine.step().unwrap() {
            events.push(event);
        }
        (events, data)
    };

    let (trace_a, out_a) = run(5);
    let (trace_b, out_b) = run(5);
    assert_eq!(trace_a, trace_b);
    assert_eq!(out_a, out_b);

    let (_, out_c) = run(6);
    assert_eq!(out_a, out_c);
}

#[test]
fn test_bucket_invariant_after_partitioning() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut data: Vec<u32> = (0..50_000).map(|_| rng.random_range(0..5000)).collect();
    let mut machine = StateMachine::new(&mut data).with_seed(9);

    let mut checked = 0;
    loop {
        if let Some(frame) = machine.current_frame() {
            if frame.state() == State::Recursion {
                let splitters = frame.splitters();
                assert!(splitters.windows(2).all(|w| w[0] < w[1]));

                let starts = frame.bucket_starts();
                assert_eq!(starts.len(), splitters.len() + 2);
                assert_eq!(starts[0], 0);
                assert_eq!(starts[starts.len() - 1], frame.len());
                assert_eq!(frame.bucket_counts().total(), frame.len());

                let range = &machine.data()[frame.range()];
                let buckets: Vec<&[u32]> = starts
                    .windows(2)
                    .map(|w| &range[w[0]..w[1]])
                    .filter(|b| !b.is_empty())
                    .collect();
                for pair in buckets.windows(2) {
                    let max_left = pair[0].iter().max().unwrap();
                    let min_right = pair[1].iter().min().unwrap();
                    assert!(max_left <= min_right);
                }
                checked += 1;
            }
        }
        if machine.step().unwrap().is_none() {
            break;
        }
    }

    assert!(checked > 0);
    assert!(data.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_stack_frames_never_overlap() {
    let mut data = shuffled(20_000, 3);
    let len = data.len();
    let mut machine = StateMachine::new(&mut data).with_seed(3);

    loop {
        let frames = machine.frames();
        for (i, lower) in frames.iter().enumerate() {
            assert!(lower.range().end <= len);
            for upper in &frames[i + 1..] {
                let (a, b) = (lower.range(), upper.range());
                if a.start < b.end && b.start < a.end {
                    // Only a frame waiting on its sample may enclose another frame.
                    assert_eq!(lower.state(), State::Sampling);
                    let params = lower.params().unwrap();
                    let sample = a.start..a.start + params.num_samples;
                    assert!(contains(&sample, &b));
                }
            }
        }
        if machine.step().unwrap().is_none() {
            break;
        }
    }
}

#[test]
fn test_buckets_pushed_left_to_right() {
    let mut data = shuffled(100_000, 8);
    let mut machine = StateMachine::new(&mut data).with_seed(8);

    // Skip past the sample's own recursion to the root frame's.
    while !(machine.depth() == 1 && machine.state() == State::Recursion) {
        machine.step().unwrap();
    }
    let depth = machine.depth();
    machine.step().unwrap();

    // Children sit above the remaining stack, leftmost bucket on top.
    let children = &machine.frames()[depth - 1..];
    assert!(!children.is_empty());
    assert!(children.windows(2).all(|w| w[0].range().start > w[1].range().start));
    assert!(children.iter().all(|f| f.state() == State::SimpleCases));
    assert!(children.iter().all(|f| f.kind() == FrameKind::MainSort));
    assert!(children.iter().all(|f| f.len() > 256));
}

#[test]
fn test_run_for_budget() {
    let mut data = shuffled(10_000, 4);
    let mut machine = StateMachine::new(&mut data);

    assert_eq!(machine.run_for(3).unwrap(), 3);
    assert!(!machine.is_done());
    assert_eq!(machine.steps(), 3);

    let mut total = 3;
    loop {
        let taken = machine.run_for(5).unwrap();
        total += taken;
        if taken < 5 {
            break;
        }
    }
    assert!(machine.is_done());
    assert_eq!(machine.steps(), total);
    assert_eq!(data, (0..10_000).collect::<Vec<_>>());
}

#[test]
fn test_sort_sub_range() {
    let mut data: Vec<u32> = (0..1000).rev().collect();
    data[100..700].shuffle(&mut StdRng::seed_from_u64(12));
    let original = data.clone();

    let mut machine = StateMachine::with_range(&mut data, 100..700, |a, b| a < b).unwrap();
    machine.run().unwrap();

    assert_eq!(&data[..100], &original[..100]);
    assert_eq!(&data[700..], &original[700..]);
    assert!(data[100..700].windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_invalid_range_rejected() {
    let mut data = vec![1, 2, 3];

    let reversed = Range { start: 2, end: 1 };
    let err = StateMachine::with_range(&mut data, reversed, |a: &i32, b: &i32| a < b)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SortError::InvalidRange {
            begin: 2,
            end: 1,
            len: 3
        }
    ));

    let err = StateMachine::with_range(&mut data, 0..4, |a: &i32, b: &i32| a < b)
        .err()
        .unwrap();
    assert!(matches!(err, SortError::InvalidRange { end: 4, .. }));
}

#[test]
fn test_invalid_config_rejected() {
    let mut data = vec![3, 1, 2];

    let config = Config {
        log_max_buckets: 0,
        ..Config::default()
    };
    assert!(matches!(
        StateMachine::new(&mut data).with_config(config).err(),
        Some(SortError::InvalidConfig(_))
    ));

    let config = Config {
        log_max_buckets: 9,
        ..Config::default()
    };
    assert!(config.validate().is_err());

    let config = Config {
        base_case_size: 0,
        ..Config::default()
    };
    assert!(config.validate().is_err());

    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_oversized_oversampling_percent_rejected() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut data: Vec<u32> = (0..10_000).map(|_| rng.random()).collect();

    let config = Config {
        oversampling_percent: usize::MAX / 4,
        ..Config::default()
    };
    assert!(matches!(
        StateMachine::new(&mut data).with_config(config).err(),
        Some(SortError::InvalidConfig(_))
    ));

    // Parameter queries on an unvalidated config saturate instead of overflowing.
    let params = config.sampling_params(10_000);
    assert!(params.step >= 1);
    assert_eq!(params.num_samples, 5_000);

    let config = Config {
        oversampling_percent: 10_000,
        ..Config::default()
    };
    assert!(config.validate().is_ok());
    StateMachine::new(&mut data).with_config(config).unwrap().run().unwrap();
    assert!(data.is_sorted());
}

#[test]
fn test_sampling_parameters() {
    let config = Config::default();

    assert_eq!(config.log_buckets(1), 1);
    assert_eq!(config.log_buckets(257), 4);
    assert_eq!(config.log_buckets(1 << 30), 8);

    assert_eq!(config.oversampling_factor(2), 1);
    assert_eq!(config.oversampling_factor(1 << 20), 4);

    let params = config.sampling_params(300);
    assert_eq!(params.log_buckets, 4);
    assert_eq!(params.num_buckets, 16);
    assert_eq!(params.step, 1);
    assert_eq!(params.num_samples, 15);

    // Never more than half of the range.
    let tiny = Config {
        base_case_size: 1,
        base_case_multiplier: 1,
        ..Config::default()
    };
    assert_eq!(tiny.sampling_params(2).num_samples, 1);
}

#[test]
fn test_sample_parameters_stay_on_parent() {
    let mut data = shuffled(100_000, 21);
    let mut machine = StateMachine::new(&mut data).with_seed(21);

    // Step until the root has drawn its sample.
    while machine.frames()[0].params().is_none() {
        machine.step().unwrap();
    }
    let root_params = *machine.frames()[0].params().unwrap();

    // While the sample is being sorted, deeper sampling never touches the root.
    while machine.frames()[0].state() == State::Sampling && machine.depth() > 1 {
        assert_eq!(machine.frames()[0].params(), Some(&root_params));
        machine.step().unwrap();
    }
    assert_eq!(machine.frames()[0].params(), Some(&root_params));
}
