//! Shared plumbing for the relayer's crates and binary, such as initializing the tracing
//! framework.

pub mod logging;

// Re-export tracing crate for convenience.
pub use tracing;
