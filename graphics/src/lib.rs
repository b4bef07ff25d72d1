//! # Ember Graphics
//!
//! Frame graph for the Ember renderer.
//!
//! ## Overview
//!
//! Each frame, rendering features declare passes on a [`FrameGraph`]. A pass
//! names the logical resources it reads and writes; the graph works out the
//! rest:
//!
//! - [`graph`] - Resource registry, pass builder and the per-frame state machine
//! - [`compiler`] - Dependency analysis, culling, ordering and resource lifetimes
//! - [`barrier`] - State tracking and batched transition insertion
//! - [`pool`] - Cross-frame reuse of transient GPU resources
//! - [`pipeline`] - Named, lazily compiled pipeline states
//! - [`backend`] - The [`RenderDevice`] seam and the recording [`DummyDevice`]
//!
//! Per-frame data shared between features lives on the graph's
//! [`Blackboard`](ember_core::Blackboard).
//!
//! ## Example
//!
//! ```ignore
//! use ember_graphics::*;
//!
//! let mut device = DummyDevice::new();
//! let mut pool = ResourcePool::new(PoolConfig::default());
//!
//! pool.begin_frame(&mut device);
//! let mut graph = FrameGraph::new();
//! graph.import_texture("Backbuffer", backbuffer, backbuffer_desc, ResourceState::PRESENT)?;
//!
//! graph.add_graphics_pass("gbuffer", |builder| {
//!     builder.create_texture("Depth", depth_desc)?;
//!     builder.write_depth_stencil("Depth", LoadOp::Clear(ClearValue::depth(1.0)))?;
//!     Ok(NoExecution)
//! })?;
//!
//! graph.build()?;
//! let stats = graph.execute(&mut device, &mut pool)?;
//! ```

pub mod backend;
pub mod barrier;
pub mod compiler;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod pool;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BarrierTarget, ColorAttachment, DepthStencilAttachment, DeviceCommand, DummyDevice,
    GpuBuffer, GpuPipeline, GpuTexture, LoadOp, RenderDevice, RenderPassDescriptor, StoreOp,
};
pub use barrier::{BarrierBatch, BarrierKind, ResourceBarrier, ResourceState, StateTracker};
pub use compiler::{CompiledGraph, ResourceLifetime, StateRequest};
pub use error::{GraphError, GraphicsError};
pub use graph::{
    pass_fn, ExecutionStats, FrameGraph, FrameGraphConfig, GraphState, NoExecution, PassBuilder,
    PassContext, PassDeclaration, PassExecution, PassFlags, PassHandle, PassType, ReadAccess,
    ResourceHandle, ResourceName,
};
pub use pipeline::{
    ComputePipelineDescriptor, GraphicsPipelineDescriptor, PipelineCache, PipelineDescriptor,
    PipelineId, RayTracingPipelineDescriptor, ShaderRef,
};
pub use pool::{PhysicalId, PoolConfig, PoolStats, ResourcePool};
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent3d, ResourceDescriptor, ResourceKind,
    TextureDescriptor, TextureFormat, TextureUsage, Viewport,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only logs the version; kept as the entry point applications call once at
/// startup.
pub fn init() {
    log::info!("Ember Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_frame_graph_creation() {
        let graph = FrameGraph::new();
        assert_eq!(graph.pass_count(), 0);
        assert_eq!(graph.state(), GraphState::Registering);
    }

    #[test]
    fn test_profiling_feature_reaches_core() {
        assert_eq!(
            ember_core::profiling::is_enabled(),
            cfg!(feature = "profiling")
        );
    }

    #[test]
    fn test_dummy_device() {
        let device = DummyDevice::new();
        assert_eq!(device.name(), "Dummy Device");
    }
}
