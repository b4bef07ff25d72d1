//! Frame graph infrastructure.
//!
//! The frame graph provides a declarative way to describe one frame of
//! rendering. Passes declare which logical resources they create, read and
//! write; the graph then works out the rest:
//!
//! - Execution order from writer/reader relationships (stable topological sort)
//! - Culling of passes whose results nobody consumes
//! - Resource lifetimes and pooled allocations with memory aliasing
//! - State transitions, batched per pass
//!
//! # Architecture
//!
//! | Stage | Type | Purpose |
//! |-------|------|---------|
//! | Registration | [`FrameGraph::add_pass`], [`PassBuilder`] | Record declarations, hand out typed ids |
//! | Build | [`FrameGraph::build`], [`CompiledGraph`] | Analyze dependencies, cull, order, plan states |
//! | Execution | [`FrameGraph::execute`], [`PassContext`] | Bind physical resources, emit barriers, run passes |
//!
//! A graph lives for exactly one frame and moves through
//! [`GraphState::Registering`] → [`GraphState::Built`] →
//! [`GraphState::Executing`] → [`GraphState::Retired`].
//!
//! # Example
//!
//! ```ignore
//! use ember_graphics::*;
//!
//! let mut graph = FrameGraph::new();
//!
//! graph.add_graphics_pass("depth_prepass", |builder| {
//!     builder.create_texture("Depth", depth_desc)?;
//!     builder.write_depth_stencil("Depth", LoadOp::clear_depth(1.0))?;
//!     Ok(NoExecution)
//! })?;
//!
//! graph.add_graphics_pass("forward", |builder| {
//!     builder.read_depth_stencil("Depth")?;
//!     let color = builder.write_render_target("Backbuffer", LoadOp::Load)?;
//!     Ok(pass_fn(move |ctx| {
//!         ctx.bind_pipeline(&pipelines, "forward")?;
//!         ctx.draw(3, 1);
//!         Ok(())
//!     }))
//! })?;
//!
//! graph.build()?;
//! let stats = graph.execute(&mut device, &mut pool)?;
//! ```

mod access;
mod builder;
mod config;
mod context;
mod executor;
mod ids;
mod pass;
mod resource;

use ember_core::Blackboard;

pub use access::{AccessClass, AccessMode, AttachmentOps, ReadAccess, ResourceAccess};
pub use builder::PassBuilder;
pub use config::FrameGraphConfig;
pub use context::PassContext;
pub use executor::ExecutionStats;
pub use ids::{
    BufferAccessId, BufferCopyDstId, BufferCopySrcId, BufferReadId, BufferReadWriteId,
    DepthStencilId, IndirectArgsId, RawId, RenderTargetId, TextureAccessId, TextureCopyDstId,
    TextureCopySrcId, TextureReadId, TextureReadWriteId,
};
pub use pass::{pass_fn, NoExecution, PassDeclaration, PassExecution, PassFlags, PassFn, PassType};
pub use resource::{ExportTarget, ImportedResource, LogicalResource, ResourceName, ResourceRegistry};

pub(crate) use context::Binding;
pub(crate) use pass::PassNode;

use crate::backend::{BarrierTarget, GpuBuffer, GpuTexture};
use crate::barrier::ResourceState;
use crate::compiler::{self, CompiledGraph};
use crate::error::GraphError;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Handle to a pass in the frame graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the `FrameGraph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a logical resource in the frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphState {
    /// Accepting declarations, imports, exports and passes.
    Registering,
    /// Analyzed and ready to execute.
    Built,
    /// Currently executing.
    Executing,
    /// Executed, or abandoned after an error. Nothing further is allowed.
    Retired,
}

/// One frame's worth of passes and resources.
///
/// The lifetime `'a` bounds what pass executions may borrow (a pipeline
/// cache, scene data). See the [module docs](self) for the full flow.
pub struct FrameGraph<'a> {
    config: FrameGraphConfig,
    state: GraphState,
    registry: ResourceRegistry,
    passes: Vec<PassNode<'a>>,
    blackboard: Blackboard,
    compiled: Option<CompiledGraph>,
}

impl Default for FrameGraph<'_> {
    fn default() -> Self {
        Self::with_config(FrameGraphConfig::default())
    }
}

impl std::fmt::Debug for FrameGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("resources", &self.registry.len())
            .field("passes", &self.passes.len())
            .finish_non_exhaustive()
    }
}

impl<'a> FrameGraph<'a> {
    /// Create a new empty frame graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty frame graph.
    pub fn with_config(config: FrameGraphConfig) -> Self {
        Self {
            config,
            state: GraphState::Registering,
            registry: ResourceRegistry::new(),
            passes: Vec::new(),
            blackboard: Blackboard::new(),
            compiled: None,
        }
    }

    /// The graph configuration.
    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    /// The current lifecycle state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// The frame's blackboard.
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Mutable access to the frame's blackboard, for publishing values
    /// between pass registrations.
    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    fn ensure_registering(&self, operation: &'static str) -> Result<(), GraphError> {
        if self.state == GraphState::Registering {
            Ok(())
        } else {
            Err(GraphError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Declare a transient texture outside any pass.
    pub fn declare_texture(
        &mut self,
        name: impl Into<ResourceName>,
        descriptor: TextureDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        self.ensure_registering("declare_texture")?;
        self.registry.declare(name.into(), descriptor.into())
    }

    /// Declare a transient buffer outside any pass.
    pub fn declare_buffer(
        &mut self,
        name: impl Into<ResourceName>,
        descriptor: BufferDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        self.ensure_registering("declare_buffer")?;
        self.registry.declare(name.into(), descriptor.into())
    }

    /// Import an externally owned resource.
    pub fn import(
        &mut self,
        name: impl Into<ResourceName>,
        imported: ImportedResource,
    ) -> Result<ResourceHandle, GraphError> {
        self.ensure_registering("import")?;
        self.registry.import(name.into(), imported)
    }

    /// Import an externally owned texture currently in `state`.
    pub fn import_texture(
        &mut self,
        name: impl Into<ResourceName>,
        texture: GpuTexture,
        descriptor: TextureDescriptor,
        state: ResourceState,
    ) -> Result<ResourceHandle, GraphError> {
        self.import(name, ImportedResource::texture(texture, descriptor, state))
    }

    /// Import an externally owned buffer currently in `state`.
    pub fn import_buffer(
        &mut self,
        name: impl Into<ResourceName>,
        buffer: GpuBuffer,
        descriptor: BufferDescriptor,
        state: ResourceState,
    ) -> Result<ResourceHandle, GraphError> {
        self.import(name, ImportedResource::buffer(buffer, descriptor, state))
    }

    /// Copy the final content of a texture into `target` at frame end.
    ///
    /// `state` is the state `target` is in now and is returned to after the
    /// copy.
    pub fn export_texture(
        &mut self,
        name: impl Into<ResourceName>,
        target: GpuTexture,
        state: ResourceState,
    ) -> Result<ResourceHandle, GraphError> {
        self.ensure_registering("export_texture")?;
        self.registry.export(
            &name.into(),
            ExportTarget {
                target: BarrierTarget::Texture(target),
                state,
            },
        )
    }

    /// Copy the final content of a buffer into `target` at frame end.
    pub fn export_buffer(
        &mut self,
        name: impl Into<ResourceName>,
        target: GpuBuffer,
        state: ResourceState,
    ) -> Result<ResourceHandle, GraphError> {
        self.ensure_registering("export_buffer")?;
        self.registry.export(
            &name.into(),
            ExportTarget {
                target: BarrierTarget::Buffer(target),
                state,
            },
        )
    }

    /// All logical resources.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Look up a logical resource by name.
    pub fn resource(&self, name: impl Into<ResourceName>) -> Result<&LogicalResource, GraphError> {
        let handle = self.registry.lookup(&name.into())?;
        self.registry.resource(handle)
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    /// Register a pass.
    ///
    /// `setup` runs immediately against a [`PassBuilder`] and returns the
    /// pass's [`PassExecution`]. A declaration error retires the graph, since
    /// the registry may already hold part of the failed declaration.
    pub fn add_pass<E, F>(
        &mut self,
        name: impl Into<String>,
        pass_type: PassType,
        flags: PassFlags,
        setup: F,
    ) -> Result<PassHandle, GraphError>
    where
        E: PassExecution + 'a,
        F: FnOnce(&mut PassBuilder<'_>) -> Result<E, GraphError>,
    {
        self.ensure_registering("add_pass")?;

        let handle = PassHandle::new(self.passes.len() as u32);
        let declaration = PassDeclaration::new(handle, name.into(), pass_type, flags);
        let mut builder = PassBuilder::new(&mut self.registry, &self.blackboard, declaration);

        let execution = match setup(&mut builder) {
            Ok(execution) => execution,
            Err(err) => {
                log::debug!("FrameGraph: pass setup failed: {err}");
                self.state = GraphState::Retired;
                return Err(err);
            }
        };

        let declaration = builder.finish();
        log::trace!(
            "FrameGraph: registered pass `{}` ({:?}) with {} accesses",
            declaration.name,
            declaration.pass_type,
            declaration.accesses.len()
        );
        self.passes.push(PassNode {
            declaration,
            execution: Box::new(execution),
        });
        Ok(handle)
    }

    /// Register a graphics pass with default flags.
    pub fn add_graphics_pass<E, F>(
        &mut self,
        name: impl Into<String>,
        setup: F,
    ) -> Result<PassHandle, GraphError>
    where
        E: PassExecution + 'a,
        F: FnOnce(&mut PassBuilder<'_>) -> Result<E, GraphError>,
    {
        self.add_pass(name, PassType::Graphics, PassFlags::empty(), setup)
    }

    /// Register a compute pass with default flags.
    pub fn add_compute_pass<E, F>(
        &mut self,
        name: impl Into<String>,
        setup: F,
    ) -> Result<PassHandle, GraphError>
    where
        E: PassExecution + 'a,
        F: FnOnce(&mut PassBuilder<'_>) -> Result<E, GraphError>,
    {
        self.add_pass(name, PassType::Compute, PassFlags::empty(), setup)
    }

    /// Register a copy pass with default flags.
    pub fn add_copy_pass<E, F>(
        &mut self,
        name: impl Into<String>,
        setup: F,
    ) -> Result<PassHandle, GraphError>
    where
        E: PassExecution + 'a,
        F: FnOnce(&mut PassBuilder<'_>) -> Result<E, GraphError>,
    {
        self.add_pass(name, PassType::Copy, PassFlags::empty(), setup)
    }

    /// Get a pass declaration by handle.
    pub fn pass(&self, handle: PassHandle) -> Result<&PassDeclaration, GraphError> {
        self.passes
            .get(handle.index())
            .map(|node| &node.declaration)
            .ok_or(GraphError::InvalidPassHandle(handle))
    }

    /// All pass declarations in registration order.
    pub fn passes(&self) -> impl Iterator<Item = &PassDeclaration> + '_ {
        self.passes.iter().map(|node| &node.declaration)
    }

    /// Number of registered passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Analyze the graph: dependencies, culling, order, lifetimes and
    /// per-pass states.
    ///
    /// Must be called exactly once, after registration and before
    /// [`execute`](Self::execute). A failure retires the graph.
    pub fn build(&mut self) -> Result<&CompiledGraph, GraphError> {
        ember_core::profile_function!();
        self.ensure_registering("build")?;

        let declarations: Vec<&PassDeclaration> =
            self.passes.iter().map(|node| &node.declaration).collect();

        match compiler::compile(&declarations, &self.registry, &self.config) {
            Ok(compiled) => {
                log::debug!(
                    "FrameGraph: built {} passes ({} kept, {} culled), {} resources",
                    self.passes.len(),
                    compiled.pass_count(),
                    compiled.culled().len(),
                    self.registry.len()
                );
                self.state = GraphState::Built;
                Ok(self.compiled.insert(compiled))
            }
            Err(err) => {
                self.state = GraphState::Retired;
                Err(err)
            }
        }
    }

    /// The analysis result, once built.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LoadOp;
    use crate::types::{TextureFormat, TextureUsage};

    fn depth_desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Depth32Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_new_graph_is_registering() {
        let graph = FrameGraph::new();
        assert_eq!(graph.state(), GraphState::Registering);
        assert_eq!(graph.pass_count(), 0);
        assert!(graph.compiled().is_none());
    }

    #[test]
    fn test_add_pass_returns_sequential_handles() {
        let mut graph = FrameGraph::new();
        let a = graph
            .add_graphics_pass("a", |builder| {
                builder.create_texture("Depth", depth_desc())?;
                builder.write_depth_stencil("Depth", LoadOp::clear_depth(1.0))?;
                Ok(NoExecution)
            })
            .unwrap();
        let b = graph
            .add_graphics_pass("b", |builder| {
                builder.read_depth_stencil("Depth")?;
                Ok(NoExecution)
            })
            .unwrap();

        assert_eq!(a, PassHandle::new(0));
        assert_eq!(b, PassHandle::new(1));
        assert_eq!(graph.pass(b).unwrap().name(), "b");
        assert_eq!(graph.resource("Depth").unwrap().version(), 1);
    }

    #[test]
    fn test_build_twice_is_invalid() {
        let mut graph = FrameGraph::new();
        graph.build().unwrap();
        assert_eq!(
            graph.build().unwrap_err(),
            GraphError::InvalidState {
                operation: "build",
                state: GraphState::Built,
            }
        );
    }

    #[test]
    fn test_registration_closed_after_build() {
        let mut graph = FrameGraph::new();
        graph.build().unwrap();
        assert!(matches!(
            graph.declare_texture("Late", depth_desc()),
            Err(GraphError::InvalidState { .. })
        ));
        assert!(matches!(
            graph.add_compute_pass("late", |_| Ok(NoExecution)),
            Err(GraphError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_failed_setup_retires_graph() {
        let mut graph = FrameGraph::new();
        let err = graph
            .add_graphics_pass("reader", |builder| {
                builder.read_texture("Missing", ReadAccess::PixelShader)?;
                Ok(NoExecution)
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownResource { .. }));
        assert_eq!(graph.state(), GraphState::Retired);
    }

    #[test]
    fn test_invalid_pass_handle() {
        let graph = FrameGraph::new();
        assert_eq!(
            graph.pass(PassHandle::new(3)).unwrap_err(),
            GraphError::InvalidPassHandle(PassHandle::new(3))
        );
    }
}
