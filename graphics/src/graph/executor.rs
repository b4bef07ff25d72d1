//! Frame execution: binding, barriers and pass replay.

use ember_core::Blackboard;

use crate::backend::{
    BarrierTarget, ColorAttachment, DepthStencilAttachment, RenderDevice, RenderPassDescriptor,
};
use crate::barrier::{BarrierBatch, ResourceState, StateTracker};
use crate::compiler::CompiledGraph;
use crate::error::{GraphError, GraphicsError};
use crate::pool::ResourcePool;
use crate::types::Viewport;

use super::{
    AccessClass, Binding, FrameGraph, GraphState, PassContext, PassDeclaration, PassFlags,
    PassNode, ResourceHandle, ResourceRegistry,
};

/// Counters collected while executing a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Passes that ran.
    pub executed_passes: usize,
    /// Passes removed by culling.
    pub culled_passes: usize,
    /// State transitions emitted.
    pub transitions: usize,
    /// Unordered-access barriers emitted.
    pub uav_barriers: usize,
    /// Transient resources acquired from the pool.
    pub transient_acquisitions: usize,
}

/// Per-frame execution state that must be cleaned up on failure.
struct Frame {
    bindings: Vec<Option<Binding>>,
    remaining_uses: Vec<u32>,
    tracker: StateTracker,
    batch: BarrierBatch,
    stats: ExecutionStats,
}

impl Frame {
    fn new(resource_count: usize) -> Self {
        Self {
            bindings: vec![None; resource_count],
            remaining_uses: vec![0; resource_count],
            tracker: StateTracker::new(),
            batch: BarrierBatch::new(),
            stats: ExecutionStats::default(),
        }
    }

    fn flush_barriers(&mut self, device: &mut dyn RenderDevice) {
        self.stats.transitions += self.batch.transition_count();
        self.stats.uav_barriers += self.batch.uav_count();
        self.batch.submit(device);
        self.batch.clear();
    }

    fn target(&self, resource: ResourceHandle) -> Result<BarrierTarget, GraphError> {
        self.bindings
            .get(resource.index())
            .copied()
            .flatten()
            .map(|binding| binding.target)
            .ok_or(GraphError::InvalidResourceHandle(resource))
    }

    fn release(&mut self, resource: ResourceHandle, pool: &mut ResourcePool) {
        let Some(binding) = self.bindings[resource.index()] else {
            return;
        };
        if let Some(id) = binding.pooled {
            let state = self
                .tracker
                .forget(binding.target)
                .unwrap_or(ResourceState::COMMON);
            log::trace!("FrameGraph: release {resource:?} -> {id:?} in {state:?}");
            pool.release(id, state);
            self.bindings[resource.index()] = None;
        }
    }

    /// Return every pooled resource still held.
    fn release_all(&mut self, pool: &mut ResourcePool) {
        for index in 0..self.bindings.len() {
            self.release(ResourceHandle::new(index as u32), pool);
        }
    }
}

/// Borrowed pieces of a graph during execution.
struct Replay<'g, 'a> {
    registry: &'g ResourceRegistry,
    blackboard: &'g Blackboard,
    passes: &'g mut [PassNode<'a>],
    compiled: &'g CompiledGraph,
}

impl FrameGraph<'_> {
    /// Execute the built graph on `device`, backing transients from `pool`.
    ///
    /// Kept passes run in compiled order. Each transient is acquired right
    /// before its first use and released after its last, every pass gets
    /// one barrier batch, and the frame is submitted once at the end.
    ///
    /// On error, every pooled resource still held goes back to `pool` and
    /// the graph is retired. A successful submission ends the profiler frame.
    pub fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        pool: &mut ResourcePool,
    ) -> Result<ExecutionStats, GraphicsError> {
        ember_core::profile_function!();

        let invalid = GraphError::InvalidState {
            operation: "execute",
            state: self.state,
        };
        if self.state != GraphState::Built {
            return Err(invalid.into());
        }
        let Some(compiled) = self.compiled.as_ref() else {
            return Err(invalid.into());
        };
        self.state = GraphState::Executing;

        let mut frame = Frame::new(self.registry.len());
        let mut replay = Replay {
            registry: &self.registry,
            blackboard: &self.blackboard,
            passes: &mut self.passes,
            compiled,
        };

        let result = replay.run(&mut frame, device, pool);
        if result.is_err() {
            frame.release_all(pool);
        }

        self.state = GraphState::Retired;
        result?;
        ember_core::frame_mark!();
        Ok(frame.stats)
    }
}

impl Replay<'_, '_> {
    fn run(
        &mut self,
        frame: &mut Frame,
        device: &mut dyn RenderDevice,
        pool: &mut ResourcePool,
    ) -> Result<(), GraphicsError> {
        frame.stats.culled_passes = self.compiled.culled().len();
        self.bind_imports(frame);

        let order = self.compiled.pass_order();
        for (position, &handle) in order.iter().enumerate() {
            let node = self
                .passes
                .get_mut(handle.index())
                .ok_or(GraphError::InvalidPassHandle(handle))?;
            let PassNode {
                declaration,
                execution,
            } = node;
            let declaration: &PassDeclaration = declaration;

            ember_core::profile_scope!("frame_graph_pass");
            log::trace!("FrameGraph: [{position}] executing `{}`", declaration.name);

            // Acquire transients at first use.
            let mut fresh = Vec::new();
            for request in self.compiled.pass_states(handle) {
                if frame.bindings[request.resource.index()].is_none()
                    && acquire(self.registry, self.compiled, request.resource, frame, device, pool)?
                {
                    fresh.push(request.resource);
                }
            }

            // Barriers.
            for request in self.compiled.pass_states(handle) {
                let target = frame.target(request.resource)?;
                if declaration.flags.contains(PassFlags::SKIP_AUTO_BARRIERS) {
                    frame.tracker.set(target, request.state);
                } else if fresh.contains(&request.resource)
                    && frame.tracker.get(target) == Some(request.state)
                {
                    // New allocation already in the required state; no prior work to wait on.
                    continue;
                } else {
                    frame
                        .tracker
                        .request(target, request.state, &mut frame.batch);
                }
            }
            frame.flush_barriers(device);

            device.begin_pass(&declaration.name, declaration.pass_type);

            let render_pass = if declaration.pass_type.is_graphics()
                && !declaration
                    .flags
                    .contains(PassFlags::SKIP_AUTO_RENDER_PASS)
                && declaration.has_attachments()
            {
                Some(render_pass_for(declaration, self.registry, frame)?)
            } else {
                None
            };
            match &render_pass {
                Some(descriptor) => device.begin_render_pass(descriptor),
                None => {
                    if let Some(viewport) = declaration.viewport {
                        device.set_viewport(viewport);
                    }
                }
            }

            let result = {
                let mut ctx = PassContext::new(
                    declaration,
                    self.registry,
                    &frame.bindings,
                    self.blackboard,
                    &mut *device,
                );
                execution.execute(&mut ctx)
            };

            // Close the pass even on failure so the device sees balanced calls.
            if render_pass.is_some() {
                device.end_render_pass();
            }
            device.end_pass();
            result.map_err(|source| GraphicsError::Pass {
                pass: declaration.name.clone(),
                source: Box::new(source),
            })?;
            frame.stats.executed_passes += 1;

            // Release transients whose last use was this pass.
            for request in self.compiled.pass_states(handle) {
                let index = request.resource.index();
                frame.remaining_uses[index] = frame.remaining_uses[index].saturating_sub(1);
                let held = self
                    .compiled
                    .lifetime(request.resource)
                    .is_some_and(|lifetime| lifetime.held_until_end);
                if frame.remaining_uses[index] == 0 && !held {
                    frame.release(request.resource, pool);
                }
            }
        }

        self.export(frame, device)?;
        frame.release_all(pool);
        self.restore_imports(frame, device);

        device.submit()
    }

    /// Bind every imported resource at its recorded state.
    fn bind_imports(&self, frame: &mut Frame) {
        for (handle, resource) in self.registry.iter() {
            let Some(imported) = resource.imported() else {
                continue;
            };
            frame.bindings[handle.index()] = Some(Binding {
                target: imported.physical(),
                pooled: None,
            });
            frame.tracker.set(imported.physical(), imported.initial_state());
        }
    }

    /// Copy the final content of exported resources into their targets.
    fn export(&self, frame: &mut Frame, device: &mut dyn RenderDevice) -> Result<(), GraphicsError> {
        for (handle, resource) in self.registry.iter() {
            if !resource.is_exported() {
                continue;
            }
            let Some(binding) = frame.bindings[handle.index()] else {
                log::warn!(
                    "FrameGraph: `{}` is exported but was never written, skipping export",
                    resource.name()
                );
                continue;
            };
            let source = binding.target;

            for export in resource.exports() {
                if export.target == source {
                    continue;
                }
                if frame.tracker.get(export.target).is_none() {
                    frame.tracker.set(export.target, export.state);
                }
                frame
                    .tracker
                    .request(source, ResourceState::COPY_SRC, &mut frame.batch);
                frame
                    .tracker
                    .request(export.target, ResourceState::COPY_DST, &mut frame.batch);
                frame.flush_barriers(device);

                match (source, export.target) {
                    (BarrierTarget::Texture(src), BarrierTarget::Texture(dst)) => {
                        device.copy_texture(src, dst);
                    }
                    (BarrierTarget::Buffer(src), BarrierTarget::Buffer(dst)) => {
                        device.copy_buffer(src, dst, resource.descriptor().size_in_bytes());
                    }
                    _ => return Err(GraphError::InvalidResourceHandle(handle).into()),
                }

                frame
                    .batch
                    .add_transition(export.target, ResourceState::COPY_DST, export.state);
                frame.tracker.set(export.target, export.state);
                frame.flush_barriers(device);
                log::trace!("FrameGraph: exported `{}`", resource.name());
            }
        }
        Ok(())
    }

    /// Move imported resources to their requested final state.
    fn restore_imports(&self, frame: &mut Frame, device: &mut dyn RenderDevice) {
        for (_, resource) in self.registry.iter() {
            let Some(imported) = resource.imported() else {
                continue;
            };
            let Some(final_state) = imported.final_state() else {
                continue;
            };
            let target = imported.physical();
            let current = frame
                .tracker
                .get(target)
                .unwrap_or(imported.initial_state());
            frame.batch.add_transition(target, current, final_state);
            frame.tracker.set(target, final_state);
        }
        frame.flush_barriers(device);
    }
}

/// Back a transient with a pool entry, created in its first required state.
///
/// Returns whether the entry was newly allocated. Reused entries, including
/// ones another resource released earlier this frame, carry prior work.
fn acquire(
    registry: &ResourceRegistry,
    compiled: &CompiledGraph,
    resource: ResourceHandle,
    frame: &mut Frame,
    device: &mut dyn RenderDevice,
    pool: &mut ResourcePool,
) -> Result<bool, GraphicsError> {
    let logical = registry.resource(resource)?;
    let lifetime = compiled
        .lifetime(resource)
        .ok_or(GraphError::InvalidResourceHandle(resource))?;

    let id = pool.acquire(logical.descriptor(), lifetime.first_state, device)?;
    let target = pool
        .target(id)
        .ok_or(GraphError::InvalidResourceHandle(resource))?;
    let state = pool.state(id).unwrap_or(lifetime.first_state);
    let fresh = pool.is_fresh(id);

    log::trace!(
        "FrameGraph: acquire `{}` -> {id:?} in {state:?} (fresh: {fresh})",
        logical.name()
    );
    frame.tracker.set(target, state);
    frame.bindings[resource.index()] = Some(Binding {
        target,
        pooled: Some(id),
    });
    frame.remaining_uses[resource.index()] = lifetime.uses;
    frame.stats.transient_acquisitions += 1;
    Ok(fresh)
}

/// Build the automatic render pass over a pass's attachments.
fn render_pass_for(
    declaration: &PassDeclaration,
    registry: &ResourceRegistry,
    frame: &Frame,
) -> Result<RenderPassDescriptor, GraphError> {
    let mut color_attachments = Vec::new();
    let mut depth_stencil_attachment = None;
    let mut extent = None;

    for access in &declaration.accesses {
        let (Some(class), Some(ops)) = (access.class, access.attachment) else {
            continue;
        };
        let BarrierTarget::Texture(texture) = frame.target(access.resource)? else {
            return Err(GraphError::InvalidResourceHandle(access.resource));
        };
        if extent.is_none() {
            extent = registry
                .resource(access.resource)?
                .descriptor()
                .as_texture()
                .map(|desc| (desc.size.width, desc.size.height));
        }

        match class {
            AccessClass::RenderTarget => color_attachments.push(ColorAttachment {
                texture,
                load_op: ops.load_op,
                store_op: ops.store_op,
            }),
            AccessClass::DepthStencilWrite | AccessClass::DepthStencilRead => {
                depth_stencil_attachment = Some(DepthStencilAttachment {
                    texture,
                    load_op: ops.load_op,
                    store_op: ops.store_op,
                    read_only: class == AccessClass::DepthStencilRead,
                });
            }
            _ => {}
        }
    }

    let viewport = declaration.viewport.unwrap_or_else(|| {
        let (width, height) = extent.unwrap_or((1, 1));
        Viewport::from_dimensions(width, height)
    });

    Ok(RenderPassDescriptor {
        color_attachments,
        depth_stencil_attachment,
        viewport,
    })
}
