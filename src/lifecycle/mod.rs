/*!
 * Lifecycle Module
 * Composition root wiring threads, processes and the boot protocol
 */

pub mod builder;
mod context;
pub mod coordinator;

pub use builder::LifecycleCoordinatorBuilder;
pub use coordinator::{BootPhase, LifecycleCoordinator};
