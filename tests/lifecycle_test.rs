/*!
 * Lifecycle Coordinator Tests
 * Boot protocol, configuration and custom scheduler wiring
 */

use osal_kernel::scheduler::Scheduler;
use osal_kernel::{
    BootPhase, HostScheduler, LifecycleCoordinator, OsalConfig, OsalError, ProcessState,
    ThreadConfig, ThreadFilter, ThreadState, Timeout,
};
use pretty_assertions::assert_eq;
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[test]
fn test_operations_require_init() {
    let osal = LifecycleCoordinator::new(OsalConfig::default()).unwrap();
    assert_eq!(osal.phase(), BootPhase::Uninitialized);
    assert_eq!(osal.process_current(), Err(OsalError::NotInitialized));
    assert_eq!(osal.thread_count(ThreadFilter::All), Err(OsalError::NotInitialized));
    assert_eq!(
        osal.thread_create(ThreadConfig::new("early"), || {}),
        Err(OsalError::NotInitialized)
    );
    assert_eq!(osal.thread_destroy(osal_kernel::ThreadId(1)), Err(OsalError::NotInitialized));
    assert_eq!(osal.process_wait(1, Timeout::NonBlocking), Err(OsalError::NotInitialized));
}

#[test]
fn test_init_twice_deinit_twice_reinit() {
    let osal = LifecycleCoordinator::new(OsalConfig::default()).unwrap();
    osal.init().unwrap();
    let first_root = osal.process_current().unwrap();
    osal.init().unwrap();
    assert_eq!(osal.process_current().unwrap(), first_root);

    osal.deinit().unwrap();
    osal.deinit().unwrap();
    assert_eq!(osal.phase(), BootPhase::Uninitialized);

    osal.init().unwrap();
    assert_eq!(osal.phase(), BootPhase::Ready);
    let root = osal.process_current().unwrap();
    assert_eq!(osal.process_state(root).unwrap(), ProcessState::Running);
    assert_eq!(osal.thread_count(ThreadFilter::All).unwrap(), 1);
}

#[test]
fn test_bootstrap_record() {
    let osal = LifecycleCoordinator::new(OsalConfig::default()).unwrap();
    osal.init().unwrap();

    let me = osal.thread_current().unwrap();
    let info = osal.thread_info(None).unwrap();
    assert_eq!(info.id, me);
    assert_eq!(info.lifecycle, ThreadState::Completed);
    assert_eq!(osal.thread_module_name(None).unwrap().as_str(), "system");
    assert_eq!(osal.thread_current().unwrap(), me);
}

#[test]
fn test_root_process_name_from_config() {
    let config = OsalConfig::default().with_root_process_name("kernel");
    let osal = LifecycleCoordinator::new(config).unwrap();
    osal.init().unwrap();
    let root = osal.find_process_by_name("kernel").unwrap();
    assert_eq!(osal.process_current().unwrap(), root);
}

#[test]
fn test_invalid_config_rejected() {
    let config = OsalConfig::default().with_tick_rate(0);
    assert!(matches!(
        LifecycleCoordinator::new(config),
        Err(OsalError::InvalidArgument(_))
    ));
}

#[test]
fn test_foreign_thread_is_adopted() {
    let osal = Arc::new(LifecycleCoordinator::new(OsalConfig::default()).unwrap());
    osal.init().unwrap();
    let root = osal.process_current().unwrap();

    let other = Arc::clone(&osal);
    let (id, pid) = std::thread::spawn(move || {
        let id = other.thread_current().unwrap();
        (id, other.process_current().unwrap())
    })
    .join()
    .unwrap();

    assert_eq!(pid, root);
    assert_eq!(osal.thread_info(Some(id)).unwrap().lifecycle, ThreadState::Completed);
    assert_eq!(osal.thread_count(ThreadFilter::All).unwrap(), 2);
}

#[test]
fn test_shared_scheduler() {
    let scheduler: Arc<dyn Scheduler> = Arc::new(HostScheduler::new(&OsalConfig::default()));
    let osal = LifecycleCoordinator::builder()
        .with_scheduler(Arc::clone(&scheduler))
        .with_config(OsalConfig::default())
        .build()
        .unwrap();
    osal.init().unwrap();

    // Tasks spawned through the shared port carry their stack budget;
    // adopted threads report none
    let (tx, rx) = mpsc::channel();
    let shared = Arc::clone(&scheduler);
    let id = osal
        .thread_create(ThreadConfig::new("on-shared").with_stack_size(16384), move || {
            let status = shared.task_status(shared.current_task());
            tx.send(status.map(|s| s.stack_bytes)).ok();
        })
        .unwrap();
    let stack = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    osal.thread_join(id).unwrap();

    assert_eq!(stack, Some(16384));
}

#[test]
fn test_sleep_and_ticks() {
    let osal = LifecycleCoordinator::new(OsalConfig::default()).unwrap();
    osal.init().unwrap();
    let before = osal.tick_count().unwrap();
    osal.sleep(5).unwrap();
    assert!(osal.tick_count().unwrap() >= before + 5);
}

#[test]
fn test_deinit_with_live_threads_keeps_them_running() {
    let osal = Arc::new(LifecycleCoordinator::new(OsalConfig::default()).unwrap());
    osal.init().unwrap();
    let (tx, rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();
    osal.thread_create(ThreadConfig::new("outlives"), move || {
        rx.recv().ok();
        done_tx.send(()).ok();
    })
    .unwrap();

    osal.deinit().unwrap();
    tx.send(()).unwrap();
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
}

#[test]
fn test_config_from_json() {
    let config = OsalConfig::from_json(r#"{"tick_rate_hz": 100, "root_process_name": "init"}"#)
        .unwrap();
    assert_eq!(config.tick_rate_hz, 100);
    assert_eq!(config.root_process_name, "init");
    assert_eq!(config.max_tasks, OsalConfig::default().max_tasks);

    assert!(matches!(
        OsalConfig::from_json(r#"{"max_tasks": 0}"#),
        Err(OsalError::InvalidArgument(_))
    ));
    assert!(matches!(OsalConfig::from_json("not json"), Err(OsalError::InvalidArgument(_))));
}

#[test]
fn test_errno_mapping() {
    assert_eq!(OsalError::invalid("x").errno(), -(nix::errno::Errno::EINVAL as i32));
    assert_eq!(OsalError::WouldBlock.errno(), -(nix::errno::Errno::EAGAIN as i32));
    assert_eq!(
        OsalError::TimedOut { timeout_ms: 1 }.errno(),
        -(nix::errno::Errno::ETIMEDOUT as i32)
    );
    assert!(OsalError::WouldBlock.is_retryable());
    assert!(!OsalError::NotInitialized.is_retryable());
}
