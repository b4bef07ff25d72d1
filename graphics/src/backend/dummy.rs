//! Dummy GPU device for testing and development.
//!
//! This device doesn't perform actual GPU operations. It records every call
//! as a [`DeviceCommand`] and simulates just enough resource content (clear
//! values and buffer bytes, carried through copies) for tests to observe
//! what a frame produced, without requiring GPU hardware.

use std::collections::{HashMap, HashSet};

use crate::barrier::{BarrierKind, ResourceBarrier, ResourceState};
use crate::error::GraphicsError;
use crate::graph::PassType;
use crate::pipeline::PipelineDescriptor;
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor, Viewport};

use super::{
    BarrierTarget, GpuBuffer, GpuPipeline, GpuTexture, LoadOp, RenderDevice, RenderPassDescriptor,
    StoreOp,
};

/// A call recorded by [`DummyDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// A texture was created.
    CreateTexture {
        /// The new handle.
        texture: GpuTexture,
        /// Descriptor label.
        label: Option<String>,
        /// Initial state.
        state: ResourceState,
    },
    /// A buffer was created.
    CreateBuffer {
        /// The new handle.
        buffer: GpuBuffer,
        /// Descriptor label.
        label: Option<String>,
        /// Initial state.
        state: ResourceState,
    },
    /// A texture was destroyed.
    DestroyTexture(GpuTexture),
    /// A buffer was destroyed.
    DestroyBuffer(GpuBuffer),
    /// A pipeline was compiled.
    CreatePipeline {
        /// The new handle.
        pipeline: GpuPipeline,
        /// Descriptor label.
        label: String,
    },
    /// A pipeline was destroyed.
    DestroyPipeline(GpuPipeline),
    /// A pass debug region was opened.
    BeginPass {
        /// Pass name.
        name: String,
        /// Pass type.
        pass_type: PassType,
    },
    /// A pass debug region was closed.
    EndPass,
    /// One batched barrier call.
    Barrier(Vec<ResourceBarrier>),
    /// A render pass began.
    BeginRenderPass(RenderPassDescriptor),
    /// A render pass ended.
    EndRenderPass,
    /// The viewport was set.
    SetViewport(Viewport),
    /// A texture was cleared.
    ClearTexture {
        /// Target texture.
        texture: GpuTexture,
        /// Clear value.
        value: ClearValue,
    },
    /// Bytes were uploaded into a buffer.
    WriteBuffer {
        /// Target buffer.
        buffer: GpuBuffer,
        /// Byte offset.
        offset: u64,
        /// Number of bytes.
        size: usize,
    },
    /// A texture was copied.
    CopyTexture {
        /// Source.
        src: GpuTexture,
        /// Destination.
        dst: GpuTexture,
    },
    /// A buffer range was copied.
    CopyBuffer {
        /// Source.
        src: GpuBuffer,
        /// Destination.
        dst: GpuBuffer,
        /// Number of bytes.
        size: u64,
    },
    /// A pipeline was bound.
    BindPipeline(GpuPipeline),
    /// A draw was issued.
    Draw {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
    },
    /// An indirect draw was issued.
    DrawIndirect {
        /// Argument buffer.
        args: GpuBuffer,
        /// Byte offset.
        offset: u64,
    },
    /// Compute workgroups were dispatched.
    Dispatch {
        /// Groups in X.
        x: u32,
        /// Groups in Y.
        y: u32,
        /// Groups in Z.
        z: u32,
    },
    /// An indirect dispatch was issued.
    DispatchIndirect {
        /// Argument buffer.
        args: GpuBuffer,
        /// Byte offset.
        offset: u64,
    },
    /// Rays were launched.
    DispatchRays {
        /// Launch width.
        width: u32,
        /// Launch height.
        height: u32,
        /// Launch depth.
        depth: u32,
    },
    /// The frame was submitted.
    Submit,
}

/// Recording device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: u64,
    commands: Vec<DeviceCommand>,
    textures: HashMap<GpuTexture, u64>,
    buffers: HashMap<GpuBuffer, u64>,
    pipelines: HashSet<GpuPipeline>,
    texture_contents: HashMap<GpuTexture, ClearValue>,
    buffer_contents: HashMap<GpuBuffer, Vec<u8>>,
    open_render_pass: Option<RenderPassDescriptor>,
    memory_budget: Option<u64>,
    memory_used: u64,
    created_textures: usize,
    created_buffers: usize,
    submissions: usize,
    fail_submissions: bool,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail allocations with [`GraphicsError::OutOfMemory`] once `bytes`
    /// are in use.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Make every subsequent submission fail with [`GraphicsError::DeviceLost`].
    pub fn fail_submissions(&mut self, fail: bool) {
        self.fail_submissions = fail;
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn reserve(&mut self, bytes: u64) -> Result<(), GraphicsError> {
        if let Some(budget) = self.memory_budget {
            if self.memory_used + bytes > budget {
                log::trace!(
                    "DummyDevice: out of memory ({} + {bytes} > {budget})",
                    self.memory_used
                );
                return Err(GraphicsError::OutOfMemory);
            }
        }
        self.memory_used += bytes;
        Ok(())
    }

    fn record(&mut self, command: DeviceCommand) {
        log::trace!("DummyDevice: {command:?}");
        self.commands.push(command);
    }

    /// Every recorded call, oldest first.
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget recorded calls. Resources and content are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Every barrier recorded, across all batches.
    pub fn barriers(&self) -> impl Iterator<Item = &ResourceBarrier> + '_ {
        self.commands.iter().flat_map(|command| match command {
            DeviceCommand::Barrier(batch) => batch.as_slice(),
            _ => &[][..],
        })
    }

    /// Number of `resource_barrier` calls.
    pub fn barrier_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, DeviceCommand::Barrier(_)))
            .count()
    }

    /// All transitions recorded for one resource, as (before, after).
    pub fn transitions_for(&self, target: BarrierTarget) -> Vec<(ResourceState, ResourceState)> {
        self.barriers()
            .filter(|barrier| barrier.target == target)
            .filter_map(ResourceBarrier::as_transition)
            .collect()
    }

    /// Number of UAV barriers recorded for one resource.
    pub fn uav_barriers_for(&self, target: BarrierTarget) -> usize {
        self.barriers()
            .filter(|barrier| {
                barrier.target == target && barrier.kind == BarrierKind::UnorderedAccess
            })
            .count()
    }

    /// Names of the passes that ran, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::BeginPass { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Simulated content of a texture: the last clear value written to it.
    pub fn texture_content(&self, texture: GpuTexture) -> Option<ClearValue> {
        self.texture_contents.get(&texture).copied()
    }

    /// Simulated content of a buffer.
    pub fn buffer_content(&self, buffer: GpuBuffer) -> Option<&[u8]> {
        self.buffer_contents.get(&buffer).map(Vec::as_slice)
    }

    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Textures created over the device's lifetime.
    pub fn created_textures(&self) -> usize {
        self.created_textures
    }

    /// Buffers created over the device's lifetime.
    pub fn created_buffers(&self) -> usize {
        self.created_buffers
    }

    /// Pipelines currently alive.
    pub fn live_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Bytes currently allocated.
    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    /// Successful submissions.
    pub fn submissions(&self) -> usize {
        self.submissions
    }
}

impl RenderDevice for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy Device"
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuTexture, GraphicsError> {
        let size = descriptor.size_in_bytes();
        self.reserve(size)?;
        let texture = GpuTexture::from_raw(self.next_handle());
        self.textures.insert(texture, size);
        self.created_textures += 1;
        self.record(DeviceCommand::CreateTexture {
            texture,
            label: descriptor.label.clone(),
            state: initial_state,
        });
        Ok(texture)
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        initial_state: ResourceState,
    ) -> Result<GpuBuffer, GraphicsError> {
        self.reserve(descriptor.size)?;
        let buffer = GpuBuffer::from_raw(self.next_handle());
        self.buffers.insert(buffer, descriptor.size);
        self.created_buffers += 1;
        self.record(DeviceCommand::CreateBuffer {
            buffer,
            label: descriptor.label.clone(),
            state: initial_state,
        });
        Ok(buffer)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        if let Some(size) = self.textures.remove(&texture) {
            self.memory_used -= size;
        }
        self.texture_contents.remove(&texture);
        self.record(DeviceCommand::DestroyTexture(texture));
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        if let Some(size) = self.buffers.remove(&buffer) {
            self.memory_used -= size;
        }
        self.buffer_contents.remove(&buffer);
        self.record(DeviceCommand::DestroyBuffer(buffer));
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<GpuPipeline, GraphicsError> {
        let pipeline = GpuPipeline::from_raw(self.next_handle());
        self.pipelines.insert(pipeline);
        self.record(DeviceCommand::CreatePipeline {
            pipeline,
            label: descriptor.label().to_string(),
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: GpuPipeline) {
        self.pipelines.remove(&pipeline);
        self.record(DeviceCommand::DestroyPipeline(pipeline));
    }

    fn begin_pass(&mut self, name: &str, pass_type: PassType) {
        self.record(DeviceCommand::BeginPass {
            name: name.to_string(),
            pass_type,
        });
    }

    fn end_pass(&mut self) {
        self.record(DeviceCommand::EndPass);
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]) {
        self.record(DeviceCommand::Barrier(barriers.to_vec()));
    }

    fn begin_render_pass(&mut self, descriptor: &RenderPassDescriptor) {
        let loads = descriptor
            .color_attachments
            .iter()
            .map(|color| (color.texture, color.load_op))
            .chain(
                descriptor
                    .depth_stencil_attachment
                    .iter()
                    .map(|depth| (depth.texture, depth.load_op)),
            );
        for (texture, load_op) in loads {
            match load_op {
                LoadOp::Clear(value) => {
                    self.texture_contents.insert(texture, value);
                }
                LoadOp::DontCare => {
                    self.texture_contents.remove(&texture);
                }
                LoadOp::Load => {}
            }
        }
        self.open_render_pass = Some(descriptor.clone());
        self.record(DeviceCommand::BeginRenderPass(descriptor.clone()));
    }

    fn end_render_pass(&mut self) {
        if let Some(descriptor) = self.open_render_pass.take() {
            let stores = descriptor
                .color_attachments
                .iter()
                .map(|color| (color.texture, color.store_op))
                .chain(
                    descriptor
                        .depth_stencil_attachment
                        .iter()
                        .map(|depth| (depth.texture, depth.store_op)),
                );
            for (texture, store_op) in stores {
                if store_op == StoreOp::DontCare {
                    self.texture_contents.remove(&texture);
                }
            }
        }
        self.record(DeviceCommand::EndRenderPass);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(DeviceCommand::SetViewport(viewport));
    }

    fn clear_texture(&mut self, texture: GpuTexture, value: ClearValue) {
        self.texture_contents.insert(texture, value);
        self.record(DeviceCommand::ClearTexture { texture, value });
    }

    fn write_buffer(&mut self, buffer: GpuBuffer, offset: u64, data: &[u8]) {
        let size = self.buffers.get(&buffer).copied().unwrap_or(0);
        let in_bounds = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= size);
        if !in_bounds {
            log::warn!(
                "DummyDevice: dropped write of {} bytes at {offset} into {buffer:?} ({size} bytes)",
                data.len()
            );
            return;
        }

        let content = self.buffer_contents.entry(buffer).or_default();
        let end = offset as usize + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[offset as usize..end].copy_from_slice(data);
        self.record(DeviceCommand::WriteBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn copy_texture(&mut self, src: GpuTexture, dst: GpuTexture) {
        match self.texture_contents.get(&src).copied() {
            Some(value) => self.texture_contents.insert(dst, value),
            None => self.texture_contents.remove(&dst),
        };
        self.record(DeviceCommand::CopyTexture { src, dst });
    }

    fn copy_buffer(&mut self, src: GpuBuffer, dst: GpuBuffer, size: u64) {
        let bytes: Vec<u8> = self
            .buffer_contents
            .get(&src)
            .map(|content| content.iter().copied().take(size as usize).collect())
            .unwrap_or_default();
        let content = self.buffer_contents.entry(dst).or_default();
        if content.len() < bytes.len() {
            content.resize(bytes.len(), 0);
        }
        content[..bytes.len()].copy_from_slice(&bytes);
        self.record(DeviceCommand::CopyBuffer { src, dst, size });
    }

    fn bind_pipeline(&mut self, pipeline: GpuPipeline) {
        self.record(DeviceCommand::BindPipeline(pipeline));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.record(DeviceCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indirect(&mut self, args: GpuBuffer, offset: u64) {
        self.record(DeviceCommand::DrawIndirect { args, offset });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(DeviceCommand::Dispatch { x, y, z });
    }

    fn dispatch_indirect(&mut self, args: GpuBuffer, offset: u64) {
        self.record(DeviceCommand::DispatchIndirect { args, offset });
    }

    fn dispatch_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.record(DeviceCommand::DispatchRays {
            width,
            height,
            depth,
        });
    }

    fn submit(&mut self) -> Result<(), GraphicsError> {
        if self.fail_submissions {
            log::trace!("DummyDevice: simulated device loss on submit");
            return Err(GraphicsError::DeviceLost);
        }
        self.submissions += 1;
        self.record(DeviceCommand::Submit);
        Ok(())
    }
}
