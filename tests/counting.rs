use std::collections::BTreeSet;

use corsa::frequency::{CountStrategy, FrequencyCounter, KeyDomain};
use corsa::harness::{Harness, HarnessConfig};
use proptest::prelude::*;

fn domain_keys(key_count: usize) -> BTreeSet<String> {
    (0..key_count).map(|i| format!("item{i}")).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn counts_sum_to_loop_count_over_full_domain(
        loop_count in 0usize..20_000,
        key_count in 1usize..16,
        workers in 1usize..6,
        chunk_size in 1usize..2_000,
    ) {
        let harness = Harness::new(
            HarnessConfig::default()
                .with_workers(workers)
                .with_loop_count(loop_count)
                .with_key_count(key_count)
                .with_chunk_size(chunk_size),
        )
        .unwrap();

        for strategy in [CountStrategy::Locked, CountStrategy::LockFree] {
            let report = harness.run_count(strategy).unwrap();
            prop_assert!(report.passed(), "{}: {} / {}", strategy, report.sum_verdict, report.domain_verdict);
            prop_assert_eq!(report.snapshot.total(), loop_count as u64);
            let keys: BTreeSet<String> = report.snapshot.keys().map(str::to_owned).collect();
            prop_assert_eq!(keys, domain_keys(key_count));
        }
    }
}

#[test]
fn lock_free_counter_under_raw_threads() {
    let counter = FrequencyCounter::new(CountStrategy::LockFree, KeyDomain::new(4));
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| counter.record_random(25_000));
        }
    });
    let snapshot = counter.snapshot();
    assert_eq!(snapshot.total(), 200_000);
    assert_eq!(snapshot.len(), 4);
}

#[test]
fn every_key_hit_once_per_thread() {
    for strategy in [CountStrategy::Locked, CountStrategy::LockFree] {
        let domain = KeyDomain::new(10);
        let counter = FrequencyCounter::new(strategy, domain.clone());
        std::thread::scope(|s| {
            for _ in 0..10 {
                s.spawn(|| {
                    for key in domain.keys() {
                        counter.increment(key);
                    }
                });
            }
        });
        let snapshot = counter.snapshot();
        for key in domain.keys() {
            assert_eq!(snapshot.get(key), Some(10), "{strategy} {key}");
        }
    }
}

#[test]
fn comparison_lists_both_strategies() {
    let harness = Harness::new(HarnessConfig::default().with_loop_count(100_000)).unwrap();
    let comparison = harness.compare_counts().unwrap();
    assert!(comparison.all_passed());
    assert!(comparison.get("lock-free").is_some());
    assert!(comparison.get("locked").is_some());
    assert!(comparison.to_string().starts_with("running time = "));
}
