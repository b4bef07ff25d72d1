//! Named pipeline registry with lazy compilation.
//!
//! Effects register pipeline descriptors under a name at startup (data
//! driven: the name → descriptor table can come from anywhere). Passes then
//! ask for a pipeline by name during execution; the first request compiles
//! it on the device and later requests hit the cache.
//!
//! ```text
//! register("tonemap", desc)        get_or_create("tonemap")
//!          │                                │
//!          ▼                                ▼
//! ┌──────────────────┐  miss   ┌───────────────────────┐
//! │   descriptors    │ ──────► │ device.create_pipeline│
//! │ name → (id, desc)│         └───────────┬───────────┘
//! └──────────────────┘                     ▼
//!                               ┌──────────────────┐
//!                               │     compiled     │  hit: read lock only
//!                               │ id → GpuPipeline │
//!                               └──────────────────┘
//! ```
//!
//! # Ray tracing
//!
//! Each ray-tracing effect registers its own [`RayTracingPipelineDescriptor`]
//! carrying a dedicated binding layout and shader table. There is no shared
//! descriptor heap between effects.
//!
//! # Example
//!
//! ```ignore
//! let pipelines = PipelineCache::new();
//! pipelines.register(
//!     "tonemap",
//!     PipelineDescriptor::Graphics(GraphicsPipelineDescriptor::new(
//!         "tonemap",
//!         ShaderRef::new("fullscreen", "vs_main"),
//!     )
//!     .with_fragment(ShaderRef::new("tonemap", "fs_main"))
//!     .with_color_format(TextureFormat::Bgra8UnormSrgb)),
//! )?;
//!
//! graph.add_graphics_pass("tonemap", |builder| {
//!     builder.write_render_target("Backbuffer", LoadOp::DontCare)?;
//!     Ok(pass_fn(|ctx| {
//!         ctx.bind_pipeline(&pipelines, "tonemap")?;
//!         ctx.draw(3, 1);
//!         Ok(())
//!     }))
//! })?;
//!
//! // At shutdown:
//! pipelines.clear(&mut device);
//! ```

use std::collections::HashMap;

use parking_lot::RwLock;
use static_assertions::assert_impl_all;

use crate::backend::{GpuPipeline, RenderDevice};
use crate::error::GraphicsError;
use crate::types::TextureFormat;

/// A shader entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderRef {
    /// Shader module name.
    pub module: String,
    /// Entry point inside the module.
    pub entry_point: String,
}

impl ShaderRef {
    /// Create a shader reference.
    pub fn new(module: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// Rasterization pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineDescriptor {
    /// Debug label.
    pub label: String,
    /// Vertex stage.
    pub vertex: ShaderRef,
    /// Fragment stage, if any (depth-only passes have none).
    pub fragment: Option<ShaderRef>,
    /// Color attachment formats.
    pub color_formats: Vec<TextureFormat>,
    /// Depth attachment format.
    pub depth_format: Option<TextureFormat>,
}

impl GraphicsPipelineDescriptor {
    /// Create a vertex-only pipeline.
    pub fn new(label: impl Into<String>, vertex: ShaderRef) -> Self {
        Self {
            label: label.into(),
            vertex,
            fragment: None,
            color_formats: Vec::new(),
            depth_format: None,
        }
    }

    /// Set the fragment stage.
    pub fn with_fragment(mut self, fragment: ShaderRef) -> Self {
        self.fragment = Some(fragment);
        self
    }

    /// Add a color attachment format.
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    /// Set the depth attachment format.
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }
}

/// Compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineDescriptor {
    /// Debug label.
    pub label: String,
    /// Compute stage.
    pub shader: ShaderRef,
}

/// A closest-hit / any-hit pair sharing one hit group record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitGroup {
    /// Closest-hit stage.
    pub closest_hit: ShaderRef,
    /// Optional any-hit stage.
    pub any_hit: Option<ShaderRef>,
}

/// The binding layout owned by one ray-tracing pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RayTracingBindings {
    /// Constant buffers.
    pub constant_buffers: u32,
    /// Read-only resources (acceleration structures, textures).
    pub read_only: u32,
    /// Read-write resources (output images).
    pub read_write: u32,
}

/// Ray-tracing pipeline with its own shader table and binding layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RayTracingPipelineDescriptor {
    /// Debug label.
    pub label: String,
    /// Ray generation stage.
    pub ray_generation: ShaderRef,
    /// Miss stages, indexed by miss shader index.
    pub miss: Vec<ShaderRef>,
    /// Hit groups, indexed by hit group index.
    pub hit_groups: Vec<HitGroup>,
    /// Maximum trace recursion depth.
    pub max_recursion_depth: u32,
    /// Binding layout.
    pub bindings: RayTracingBindings,
}

/// Any pipeline the cache can compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineDescriptor {
    /// Rasterization.
    Graphics(GraphicsPipelineDescriptor),
    /// Compute.
    Compute(ComputePipelineDescriptor),
    /// Ray tracing.
    RayTracing(RayTracingPipelineDescriptor),
}

impl PipelineDescriptor {
    /// The debug label.
    pub fn label(&self) -> &str {
        match self {
            Self::Graphics(desc) => &desc.label,
            Self::Compute(desc) => &desc.label,
            Self::RayTracing(desc) => &desc.label,
        }
    }
}

/// Index of a registered pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(u32);

/// Owned name → pipeline cache.
///
/// Shared by reference between passes; compilation on a miss takes the
/// write lock, hits only the read lock.
#[derive(Debug, Default)]
pub struct PipelineCache {
    descriptors: RwLock<HashMap<String, (PipelineId, PipelineDescriptor)>>,
    compiled: RwLock<HashMap<PipelineId, GpuPipeline>>,
}

assert_impl_all!(PipelineCache: Send, Sync);

impl PipelineCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under `name`.
    ///
    /// Registering the same descriptor again returns the existing id; a
    /// different descriptor under a taken name is rejected.
    pub fn register(
        &self,
        name: impl Into<String>,
        descriptor: PipelineDescriptor,
    ) -> Result<PipelineId, GraphicsError> {
        let name = name.into();
        let mut descriptors = self.descriptors.write();

        if let Some((id, existing)) = descriptors.get(&name) {
            if *existing == descriptor {
                return Ok(*id);
            }
            return Err(GraphicsError::DuplicatePipeline(name));
        }

        let id = PipelineId(descriptors.len() as u32);
        log::debug!("PipelineCache: registered `{name}` as {id:?}");
        descriptors.insert(name, (id, descriptor));
        Ok(id)
    }

    /// The id registered under `name`.
    pub fn id(&self, name: &str) -> Option<PipelineId> {
        self.descriptors.read().get(name).map(|(id, _)| *id)
    }

    /// Get the compiled pipeline for `name`, compiling it on first use.
    pub fn get_or_create(
        &self,
        name: &str,
        device: &mut dyn RenderDevice,
    ) -> Result<GpuPipeline, GraphicsError> {
        let id = self
            .id(name)
            .ok_or_else(|| GraphicsError::UnknownPipeline(name.to_string()))?;

        // Fast path: already compiled.
        if let Some(&pipeline) = self.compiled.read().get(&id) {
            return Ok(pipeline);
        }

        // Slow path: compile under the write lock, re-checking first.
        // Registered descriptors never change, so the copy stays current.
        let descriptor = self
            .descriptors
            .read()
            .get(name)
            .map(|(_, desc)| desc.clone())
            .ok_or_else(|| GraphicsError::UnknownPipeline(name.to_string()))?;
        let mut compiled = self.compiled.write();
        if let Some(&pipeline) = compiled.get(&id) {
            return Ok(pipeline);
        }
        let pipeline = device.create_pipeline(&descriptor)?;
        log::debug!("PipelineCache: compiled `{name}` -> {pipeline:?}");
        compiled.insert(id, pipeline);
        Ok(pipeline)
    }

    /// Destroy the compiled pipeline for `name`, keeping its descriptor.
    ///
    /// The next [`get_or_create`](Self::get_or_create) recompiles it. Used
    /// after shader reloads.
    pub fn invalidate(&self, name: &str, device: &mut dyn RenderDevice) -> bool {
        let Some(id) = self.id(name) else {
            return false;
        };
        match self.compiled.write().remove(&id) {
            Some(pipeline) => {
                device.destroy_pipeline(pipeline);
                log::debug!("PipelineCache: invalidated `{name}`");
                true
            }
            None => false,
        }
    }

    /// Destroy every compiled pipeline. Descriptors stay registered.
    pub fn clear(&self, device: &mut dyn RenderDevice) {
        for (_, pipeline) in self.compiled.write().drain() {
            device.destroy_pipeline(pipeline);
        }
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }

    /// Number of compiled pipelines.
    pub fn compiled_count(&self) -> usize {
        self.compiled.read().len()
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        let remaining = self.compiled.get_mut().len();
        if remaining > 0 {
            log::warn!("PipelineCache dropped with {remaining} compiled pipelines; call clear() first");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    fn compute(label: &str) -> PipelineDescriptor {
        PipelineDescriptor::Compute(ComputePipelineDescriptor {
            label: label.into(),
            shader: ShaderRef::new(label, "cs_main"),
        })
    }

    #[test]
    fn test_compiles_once() {
        let mut device = DummyDevice::new();
        let cache = PipelineCache::new();
        cache.register("blur", compute("blur")).unwrap();

        let first = cache.get_or_create("blur", &mut device).unwrap();
        let second = cache.get_or_create("blur", &mut device).unwrap();
        assert_eq!(first, second);
        assert_eq!(device.live_pipelines(), 1);
        assert_eq!(cache.compiled_count(), 1);

        cache.clear(&mut device);
    }

    #[test]
    fn test_cache_hit_leaves_device_untouched() {
        let mut device = DummyDevice::new();
        let cache = PipelineCache::new();
        cache.register("blur", compute("blur")).unwrap();
        let pipeline = cache.get_or_create("blur", &mut device).unwrap();

        let recorded = device.commands().len();
        for _ in 0..4 {
            assert_eq!(cache.get_or_create("blur", &mut device).unwrap(), pipeline);
        }
        assert_eq!(device.commands().len(), recorded);

        cache.clear(&mut device);
    }

    #[test]
    fn test_register_is_idempotent_for_same_descriptor() {
        let cache = PipelineCache::new();
        let a = cache.register("blur", compute("blur")).unwrap();
        let b = cache.register("blur", compute("blur")).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);

        assert_eq!(
            cache.register("blur", compute("sharpen")),
            Err(GraphicsError::DuplicatePipeline("blur".into()))
        );
    }

    #[test]
    fn test_unknown_pipeline() {
        let mut device = DummyDevice::new();
        let cache = PipelineCache::new();
        assert_eq!(
            cache.get_or_create("missing", &mut device),
            Err(GraphicsError::UnknownPipeline("missing".into()))
        );
    }

    #[test]
    fn test_invalidate_recompiles() {
        let mut device = DummyDevice::new();
        let cache = PipelineCache::new();
        cache.register("blur", compute("blur")).unwrap();

        let first = cache.get_or_create("blur", &mut device).unwrap();
        assert!(cache.invalidate("blur", &mut device));
        assert!(!cache.invalidate("blur", &mut device));
        let second = cache.get_or_create("blur", &mut device).unwrap();

        assert_ne!(first, second);
        assert_eq!(device.live_pipelines(), 1);
        cache.clear(&mut device);
        assert_eq!(device.live_pipelines(), 0);
    }

    #[test]
    fn test_ray_tracing_pipeline_owns_its_layout() {
        let mut device = DummyDevice::new();
        let cache = PipelineCache::new();
        let descriptor = PipelineDescriptor::RayTracing(RayTracingPipelineDescriptor {
            label: "rt_shadows".into(),
            ray_generation: ShaderRef::new("rt_shadows", "raygen"),
            miss: vec![ShaderRef::new("rt_shadows", "miss")],
            hit_groups: vec![HitGroup {
                closest_hit: ShaderRef::new("rt_shadows", "closest_hit"),
                any_hit: Some(ShaderRef::new("rt_shadows", "alpha_test")),
            }],
            max_recursion_depth: 1,
            bindings: RayTracingBindings {
                constant_buffers: 1,
                read_only: 2,
                read_write: 1,
            },
        });
        cache.register("rt_shadows", descriptor).unwrap();
        cache.get_or_create("rt_shadows", &mut device).unwrap();
        cache.clear(&mut device);
    }
}
