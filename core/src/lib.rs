//! # Ember Core
//!
//! Engine-agnostic utilities shared by the Ember crates:
//!
//! - [`blackboard`] - Type-keyed per-frame data store
//! - [`profiling`] - Optional Tracy instrumentation macros

pub mod blackboard;
pub mod profiling;

pub use blackboard::{Blackboard, BlackboardError};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version.
pub fn init() {
    log::info!("Ember Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
