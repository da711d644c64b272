/*!
 * Thread Lifecycle Tests
 * Create/join/kill/destroy protocol through the coordinator
 */

use osal_kernel::{
    LifecycleCoordinator, OsalConfig, OsalError, ThreadConfig, ThreadFilter, ThreadRunState,
    ThreadState,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn osal() -> Arc<LifecycleCoordinator> {
    let osal = LifecycleCoordinator::new(OsalConfig::default()).unwrap();
    osal.init().unwrap();
    Arc::new(osal)
}

#[test]
fn test_create_then_join_runs_entry_once() {
    let osal = osal();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let id = osal
        .thread_create(ThreadConfig::new("once"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    osal.thread_join(id).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(osal.thread_info(Some(id)).unwrap().lifecycle, ThreadState::Joined);
}

#[test]
fn test_double_join_before_and_after_completion() {
    let osal = osal();

    // Join while the body is still running
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let slow = osal
        .thread_create(ThreadConfig::new("slow"), move || {
            release_rx.recv().ok();
        })
        .unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        release_tx.send(()).ok();
    });
    osal.thread_join(slow).unwrap();
    releaser.join().unwrap();
    assert_eq!(osal.thread_join(slow), Err(OsalError::AlreadyJoined(slow)));

    // Join after the body already finished
    let fast = osal.thread_create(ThreadConfig::new("fast"), || {}).unwrap();
    thread::sleep(Duration::from_millis(20));
    osal.thread_join(fast).unwrap();
    assert_eq!(osal.thread_join(fast), Err(OsalError::AlreadyJoined(fast)));
}

#[test]
fn test_concurrent_join_is_busy() {
    let osal = osal();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let target = osal
        .thread_create(ThreadConfig::new("target"), move || {
            release_rx.recv().ok();
        })
        .unwrap();

    let first = {
        let osal = Arc::clone(&osal);
        thread::spawn(move || osal.thread_join(target))
    };

    // Give the first joiner time to register
    thread::sleep(Duration::from_millis(50));
    assert!(matches!(osal.thread_join(target), Err(OsalError::Busy(_))));

    release_tx.send(()).unwrap();
    assert_eq!(first.join().unwrap(), Ok(()));
}

#[test]
fn test_racing_joiners_exactly_one_wins() {
    let osal = osal();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let target = osal
        .thread_create(ThreadConfig::new("raced"), move || {
            release_rx.recv().ok();
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let joiners: Vec<_> = (0..2)
        .map(|_| {
            let osal = Arc::clone(&osal);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                osal.thread_join(target)
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    release_tx.send(()).unwrap();

    let results: Vec<_> = joiners.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results
        .iter()
        .all(|r| matches!(r, Ok(()) | Err(OsalError::Busy(_)) | Err(OsalError::AlreadyJoined(_)))));
}

#[test]
fn test_kill_blocked_thread_then_join() {
    let osal = osal();
    let (started_tx, started_rx) = mpsc::channel();
    let sleeper = Arc::clone(&osal);
    let finished = Arc::new(AtomicUsize::new(0));
    let marker = Arc::clone(&finished);

    let id = osal
        .thread_create(ThreadConfig::new("forever"), move || {
            started_tx.send(()).ok();
            sleeper.sleep(u64::MAX).ok();
            marker.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    osal.thread_kill(id, 5).unwrap();
    let start = Instant::now();
    osal.thread_join(id).unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    thread::sleep(Duration::from_millis(20));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    let info = osal.thread_info(Some(id)).unwrap();
    assert_eq!(info.run_state, ThreadRunState::Terminated);
}

#[test]
fn test_kill_wakes_blocked_joiner() {
    let osal = osal();
    let sleeper = Arc::clone(&osal);
    let id = osal
        .thread_create(ThreadConfig::new("victim"), move || {
            sleeper.sleep(u64::MAX).ok();
        })
        .unwrap();

    let joiner = {
        let osal = Arc::clone(&osal);
        thread::spawn(move || osal.thread_join(id))
    };
    thread::sleep(Duration::from_millis(30));
    osal.thread_kill(id, 0).unwrap();

    assert_eq!(joiner.join().unwrap(), Ok(()));
}

#[test]
fn test_kill_is_idempotent() {
    let osal = osal();
    let id = osal.thread_create(ThreadConfig::new("done"), || {}).unwrap();
    osal.thread_join(id).unwrap();
    osal.thread_kill(id, 1).unwrap();
    osal.thread_kill(id, 2).unwrap();
    assert_eq!(osal.thread_info(Some(id)).unwrap().lifecycle, ThreadState::Joined);
}

#[test]
fn test_destroy_running_thread_releases_joiner() {
    let osal = osal();
    let sleeper = Arc::clone(&osal);
    let id = osal
        .thread_create(ThreadConfig::new("destroyed"), move || {
            sleeper.sleep(u64::MAX).ok();
        })
        .unwrap();

    let joiner = {
        let osal = Arc::clone(&osal);
        thread::spawn(move || osal.thread_join(id))
    };
    thread::sleep(Duration::from_millis(30));
    osal.thread_destroy(id).unwrap();

    assert_eq!(joiner.join().unwrap(), Ok(()));
    assert!(matches!(osal.thread_info(Some(id)), Err(OsalError::InvalidArgument(_))));
    osal.thread_destroy(id).unwrap();
}

#[test]
fn test_spawn_failure_leaves_no_record() {
    let config = OsalConfig::default().with_max_tasks(1);
    let osal = Arc::new(LifecycleCoordinator::new(config).unwrap());
    osal.init().unwrap();
    let before = osal.thread_count(ThreadFilter::All).unwrap();

    let sleeper = Arc::clone(&osal);
    let holder = osal
        .thread_create(ThreadConfig::new("holder"), move || {
            sleeper.sleep(u64::MAX).ok();
        })
        .unwrap();

    let err = osal
        .thread_create(ThreadConfig::new("overflow"), || {})
        .unwrap_err();
    assert!(matches!(err, OsalError::AllocationFailure(_)));
    assert_eq!(osal.thread_count(ThreadFilter::All).unwrap(), before + 1);

    osal.thread_kill(holder, 0).unwrap();
    osal.thread_join(holder).unwrap();
}

#[test]
fn test_invalid_create_arguments() {
    let osal = osal();
    assert!(matches!(
        osal.thread_create(ThreadConfig::new(""), || {}),
        Err(OsalError::InvalidArgument(_))
    ));
    assert!(matches!(
        osal.thread_create(ThreadConfig::new("nostack").with_stack_size(0), || {}),
        Err(OsalError::InvalidArgument(_))
    ));
}

#[test]
fn test_thread_sees_its_own_identity() {
    let osal = osal();
    let (tx, rx) = mpsc::channel();
    let inner = Arc::clone(&osal);
    let id = osal
        .thread_create(
            ThreadConfig::new("self-aware").with_priority(4),
            move || {
                let me = inner.thread_current().unwrap();
                let name = inner.thread_name(None).unwrap();
                tx.send((me, name.to_string())).ok();
            },
        )
        .unwrap();

    let (seen, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    osal.thread_join(id).unwrap();
    assert_eq!(seen, id);
    assert_eq!(name, "self-aware");
    assert_eq!(osal.thread_info(Some(id)).unwrap().priority, 4);
}

#[test]
fn test_self_join_rejected() {
    let osal = osal();
    let (tx, rx) = mpsc::channel();
    let inner = Arc::clone(&osal);
    let id = osal
        .thread_create(ThreadConfig::new("selfjoin"), move || {
            let me = inner.thread_current().unwrap();
            tx.send(inner.thread_join(me)).ok();
        })
        .unwrap();

    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(result, Err(OsalError::InvalidArgument(_))));
    osal.thread_join(id).unwrap();
}

#[test]
fn test_self_kill_never_returns() {
    let osal = osal();
    let after_kill = Arc::new(AtomicUsize::new(0));
    let marker = Arc::clone(&after_kill);
    let inner = Arc::clone(&osal);
    let id = osal
        .thread_create(ThreadConfig::new("suicide"), move || {
            let me = inner.thread_current().unwrap();
            let _ = inner.thread_kill(me, 9);
            marker.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    osal.thread_join(id).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(after_kill.load(Ordering::SeqCst), 0);
}

#[test]
fn test_thread_info_reports_state() {
    let osal = osal();
    let sleeper = Arc::clone(&osal);
    let id = osal
        .thread_create(
            ThreadConfig::new("reporter").with_stack_size(8192),
            move || {
                sleeper.sleep(u64::MAX).ok();
            },
        )
        .unwrap();
    thread::sleep(Duration::from_millis(30));

    let info = osal.thread_info(Some(id)).unwrap();
    assert_eq!(info.name.as_str(), "reporter");
    assert_eq!(info.lifecycle, ThreadState::Running);
    assert_eq!(info.run_state, ThreadRunState::Blocked);
    assert_eq!(info.stack_total, 8192);

    let me = osal.thread_info(None).unwrap();
    assert_eq!(me.run_state, ThreadRunState::Running);

    osal.thread_kill(id, 0).unwrap();
    osal.thread_join(id).unwrap();
}
