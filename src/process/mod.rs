/*!
 * Process Module
 * Process records and the kill/wait protocol
 */

pub mod record;
pub mod registry;
pub mod types;

pub use record::{ProcessName, ProcessPath, ProcessRecord};
pub use registry::ProcessRegistry;
pub use types::{ProcessInfo, ProcessState};
