use rand::Rng;
use std::time::Instant;
use stepsort::prelude::*;

#[test]
fn test_sort_1m() {
    let count = 1_000_000;
    println!("Generating {} random elements...", count);

    let mut rng = rand::rng();
    let input: Vec<u64> = (0..count).map(|_| rng.random()).collect();

    let mut data = input.clone();
    println!("Sorting {} elements...", count);
    let start = Instant::now();
    let mut machine = StateMachine::new(&mut data);
    machine.run().unwrap();
    let steps = machine.steps();
    let duration = start.elapsed();
    println!("Sorted 1M elements in {:?} ({} steps)", duration, steps);

    let mut expected = input;
    expected.sort_unstable();
    assert_eq!(data, expected);
}

#[test]
#[ignore]
fn test_sort_100m() {
    // WARNING: needs ~1.6GB for input and reference copy plus one byte per element
    // for the classification oracle.
    let count = 100_000_000;
    println!("Generating {} random elements...", count);

    let mut rng = rand::rng();
    let mut data: Vec<u64> = (0..count).map(|_| rng.random()).collect();

    println!("Sorting {} elements...", count);
    let start = Instant::now();
    sort(&mut data);
    println!("Sorted 100M elements in {:?}", start.elapsed());

    // Verify sample
    for i in (0..count - 1).step_by(10_000) {
        assert!(data[i] <= data[i + 1], "Sort failed at index {}", i);
    }
}
