/*!
 * Thread Module
 * Thread records, identity resolution and the join/kill protocol
 */

pub mod identity;
pub mod record;
pub mod registry;
pub mod types;

pub use identity::{Fallback, IdentityResolver, IdentitySlots};
pub use record::{ThreadName, ThreadRecord};
pub use registry::{SpawnRequest, ThreadRegistry};
pub use types::{ThreadConfig, ThreadFilter, ThreadInfo, ThreadOrigin, ThreadRunState, ThreadState};
