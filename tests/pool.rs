use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use corsa::pool::{PoolConfig, WorkerPool};
use corsa::Error;

#[test]
fn panicking_task_does_not_take_siblings_down() {
    let pool = WorkerPool::with_workers(3).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    pool.submit((0..30).map(|i| {
        let hits = Arc::clone(&hits);
        move || {
            if i % 10 == 0 {
                panic!("task {i} fails on purpose");
            }
            hits.fetch_add(1, Ordering::Relaxed);
        }
    }))
    .unwrap();

    assert!(pool.await_quiescence(Duration::from_secs(30)));
    assert_eq!(hits.load(Ordering::Relaxed), 27);

    let stats = pool.stats();
    assert_eq!(stats.faults, 3);
    assert_eq!(stats.completed, 30);

    // The workers survived and keep serving.
    assert_eq!(pool.execute(|| 5).unwrap(), 5);
}

#[test]
fn execute_reports_disconnected_on_panic() {
    let pool = WorkerPool::with_workers(1).unwrap();
    let result = pool.execute(|| -> u32 { panic!("no reply") });
    assert!(matches!(result, Err(Error::Disconnected)));
}

#[test]
fn quiescence_times_out_then_succeeds() {
    let pool = WorkerPool::with_workers(1).unwrap();
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    pool.spawn(move || {
        let _ = gate.recv_timeout(Duration::from_secs(30));
    })
    .unwrap();

    assert!(!pool.await_quiescence(Duration::from_millis(50)));
    assert_eq!(pool.pending(), 1);

    release.send(()).unwrap();
    assert!(pool.await_quiescence(Duration::from_secs(30)));
    assert_eq!(pool.pending(), 0);
}

#[test]
fn submit_after_shutdown_is_rejected() {
    let pool = WorkerPool::new(PoolConfig::default().with_workers(2)).unwrap();
    pool.submit((0..4).map(|_| || thread::sleep(Duration::from_millis(1))))
        .unwrap();
    pool.shutdown();

    assert!(matches!(pool.spawn(|| {}), Err(Error::PoolClosed)));
    assert!(matches!(
        pool.submit(std::iter::once(|| {})),
        Err(Error::PoolClosed)
    ));

    // Work accepted before the shutdown still drains.
    assert!(pool.await_quiescence(Duration::from_secs(30)));
    assert_eq!(pool.stats().completed, 4);
}

#[test]
fn drop_joins_workers() {
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::with_workers(2).unwrap();
        pool.submit((0..10).map(|_| {
            let hits = Arc::clone(&hits);
            move || {
                hits.fetch_add(1, Ordering::Relaxed);
            }
        }))
        .unwrap();
    }
    assert_eq!(hits.load(Ordering::Relaxed), 10);
}
