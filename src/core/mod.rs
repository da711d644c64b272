/*!
 * Core Module
 * Fundamental types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod registration;
pub mod text;
pub mod types;

// Re-export for convenience
pub use config::OsalConfig;
pub use errors::*;
pub use registration::Registration;
pub use text::FixedText;
pub use types::*;
