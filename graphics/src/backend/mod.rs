//! GPU device abstraction layer.
//!
//! The frame graph never talks to a graphics API directly. Everything it
//! needs from the GPU goes through the [`RenderDevice`] trait: allocating and
//! destroying resources, recording transitions and commands, and submitting
//! the frame.
//!
//! # Available Devices
//!
//! - [`DummyDevice`]: records every call instead of touching a GPU. Used by
//!   tests and benchmarks, and as a reference for device implementors.
//!
//! # Handles
//!
//! Devices hand out opaque `Copy` handles ([`GpuTexture`], [`GpuBuffer`],
//! [`GpuPipeline`]) and keep the API objects on their side. Handles are
//! unique for the lifetime of the device, so they double as keys for state
//! tracking.

pub mod dummy;

pub use dummy::{DeviceCommand, DummyDevice};

use crate::barrier::{ResourceBarrier, ResourceState};
use crate::error::GraphicsError;
use crate::graph::PassType;
use crate::pipeline::PipelineDescriptor;
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor, Viewport};

mod target;

pub use target::{ColorAttachment, DepthStencilAttachment, LoadOp, RenderPassDescriptor, StoreOp};

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw device handle.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw device handle.
            pub const fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Handle to a device texture.
    GpuTexture
);
gpu_handle!(
    /// Handle to a device buffer.
    GpuBuffer
);
gpu_handle!(
    /// Handle to a compiled pipeline state object.
    GpuPipeline
);

/// A physical resource as seen by the barrier inserter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierTarget {
    /// A texture.
    Texture(GpuTexture),
    /// A buffer.
    Buffer(GpuBuffer),
}

/// Interface the frame graph uses to realize a frame on a GPU.
///
/// Calls arrive in submission order from a single thread. Implementations
/// record into whatever command list they keep internally and flush it on
/// [`submit`](Self::submit). Errors are returned as-is; the graph never
/// retries a failed call.
pub trait RenderDevice {
    /// Human-readable device name.
    fn name(&self) -> &'static str;

    /// Allocate a texture that starts in `initial_state`.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuTexture, GraphicsError>;

    /// Allocate a buffer that starts in `initial_state`.
    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuBuffer, GraphicsError>;

    /// Free a texture.
    fn destroy_texture(&mut self, texture: GpuTexture);

    /// Free a buffer.
    fn destroy_buffer(&mut self, buffer: GpuBuffer);

    /// Compile a pipeline state object.
    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<GpuPipeline, GraphicsError>;

    /// Free a pipeline state object.
    fn destroy_pipeline(&mut self, pipeline: GpuPipeline);

    /// Open a debug region for a pass.
    fn begin_pass(&mut self, name: &str, pass_type: PassType);

    /// Close the debug region opened by [`begin_pass`](Self::begin_pass).
    fn end_pass(&mut self);

    /// Record a batch of barriers as a single call.
    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]);

    /// Begin a render pass over the given attachments.
    fn begin_render_pass(&mut self, descriptor: &RenderPassDescriptor);

    /// End the current render pass.
    fn end_render_pass(&mut self);

    /// Set the viewport for subsequent draws.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clear a whole texture outside a render pass.
    fn clear_texture(&mut self, texture: GpuTexture, value: ClearValue);

    /// Upload bytes into a buffer.
    fn write_buffer(&mut self, buffer: GpuBuffer, offset: u64, data: &[u8]);

    /// Copy a whole texture.
    fn copy_texture(&mut self, src: GpuTexture, dst: GpuTexture);

    /// Copy `size` bytes from the start of `src` to the start of `dst`.
    fn copy_buffer(&mut self, src: GpuBuffer, dst: GpuBuffer, size: u64);

    /// Bind a pipeline for subsequent draws or dispatches.
    fn bind_pipeline(&mut self, pipeline: GpuPipeline);

    /// Issue a non-indexed draw.
    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    /// Issue an indirect draw reading arguments from `args` at `offset`.
    fn draw_indirect(&mut self, args: GpuBuffer, offset: u64);

    /// Dispatch compute workgroups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Dispatch compute workgroups with arguments read from `args` at `offset`.
    fn dispatch_indirect(&mut self, args: GpuBuffer, offset: u64);

    /// Launch rays with the bound ray-tracing pipeline.
    fn dispatch_rays(&mut self, width: u32, height: u32, depth: u32);

    /// Submit everything recorded since the last submission.
    fn submit(&mut self) -> Result<(), GraphicsError>;
}
