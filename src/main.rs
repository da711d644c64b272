/*!
 * OSAL Demo - Main Entry Point
 *
 * Boots the lifecycle layer on the host scheduler and walks through:
 * - Thread create/join inside a fresh process
 * - Killing a thread blocked forever
 * - Process kill/wait and exit status
 */

use miette::{IntoDiagnostic, Result};
use tracing::info;

use osal_kernel::{
    init_tracing, LifecycleCoordinator, OsalConfig, ThreadConfig, ThreadFilter, Timeout,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    init_tracing();

    let config = OsalConfig::from_env()?;
    info!(tick_rate_hz = config.tick_rate_hz, "OSAL demo starting");

    let osal = Arc::new(LifecycleCoordinator::new(config)?);
    osal.init()?;

    let app = osal.process_create(Some("app"), None)?;
    info!(pid = app, "Created process");

    let counter = Arc::new(AtomicU32::new(0));
    let workers = (0..3)
        .map(|i| {
            let counter = Arc::clone(&counter);
            osal.thread_create(
                ThreadConfig::new(format!("worker-{}", i)).with_process(app),
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        threads = osal.thread_count(ThreadFilter::Process(app))?,
        "Workers spawned"
    );
    for id in &workers {
        osal.thread_join(*id)?;
    }
    info!(completed = counter.load(Ordering::SeqCst), "Workers joined");

    let sleeper = Arc::clone(&osal);
    let blocked = osal.thread_create(ThreadConfig::new("blocked").with_process(app), move || {
        // Blocks until killed
        if let Err(e) = sleeper.sleep(u64::MAX) {
            tracing::warn!(error = %e, "Sleep failed");
        }
    })?;
    osal.sleep(10)?;
    info!(info = %serde_json::to_string(&osal.thread_info(Some(blocked))?).into_diagnostic()?, "Blocked thread");
    osal.thread_kill(blocked, -1)?;
    osal.thread_join(blocked)?;

    for id in workers.iter().chain(std::iter::once(&blocked)) {
        osal.thread_destroy(*id)?;
    }

    if let Err(e) = osal.process_wait(app, Timeout::NonBlocking) {
        info!(error = %e, "Process still running");
    }
    osal.process_kill(app, 7)?;
    osal.process_wait(app, Timeout::Forever)?;
    info!(
        process = %serde_json::to_string(&osal.process_info(app)?).into_diagnostic()?,
        "Process terminated"
    );
    osal.process_destroy(app)?;

    osal.deinit()?;
    info!("OSAL demo finished");
    Ok(())
}
