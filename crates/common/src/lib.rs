//! Utilities shared by every crate in the workspace, chiefly the tracing setup.

pub mod logging;

// Re-export tracing crate for convenience.
pub use tracing;
