/*!
 * Lifecycle Coordinator Builder
 * Builder pattern for LifecycleCoordinator construction
 */

use super::coordinator::LifecycleCoordinator;
use crate::core::config::OsalConfig;
use crate::core::errors::OsalResult;
use crate::scheduler::{HostScheduler, Scheduler};
use log::info;
use std::sync::Arc;

/// Builder for LifecycleCoordinator
#[derive(Default)]
pub struct LifecycleCoordinatorBuilder {
    scheduler: Option<Arc<dyn Scheduler>>,
    config: Option<OsalConfig>,
}

impl LifecycleCoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run on an existing scheduler instead of a private host scheduler
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_config(mut self, config: OsalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the coordinator; the layer stays uninitialized until `init()`
    pub fn build(self) -> OsalResult<LifecycleCoordinator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let (scheduler, port) = match self.scheduler {
            Some(scheduler) => (scheduler, "external"),
            None => {
                let host: Arc<dyn Scheduler> = Arc::new(HostScheduler::new(&config));
                (host, "host")
            }
        };

        info!(
            "Lifecycle coordinator built on {} scheduler at {}Hz",
            port, config.tick_rate_hz
        );
        Ok(LifecycleCoordinator::from_parts(scheduler, config))
    }
}
