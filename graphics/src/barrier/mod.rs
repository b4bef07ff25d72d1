//! Resource state tracking and automatic barrier insertion.
//!
//! Instead of pass authors issuing transitions by hand, the executor knows
//! the state every pass needs for each resource it declared, compares it with
//! the last state recorded for the backing physical resource, and emits the
//! difference right before the pass runs.
//!
//! # Architecture
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ResourceState`] | Usage state of a physical resource (render target, shader read, ...) |
//! | [`StateTracker`] | Last known state per physical resource for the current frame |
//! | [`BarrierBatch`] | Barriers collected for one pass, submitted as a single device call |
//!
//! # Example
//!
//! ```ignore
//! // Pass 1 writes "Depth"   : created directly in DEPTH_WRITE, no barrier
//! // Pass 2 reads "Depth"    : DEPTH_WRITE -> DEPTH_READ
//! // Pass 3 samples "Depth"  : DEPTH_READ -> PIXEL_SHADER_RESOURCE
//! ```

mod batch;
mod state;

pub use batch::{BarrierBatch, BarrierKind, ResourceBarrier};
pub use state::{ResourceState, StateTracker};
