//! Common utilities for frame graph integration tests.
//!
//! Tests are parameterized over [`Backend`] so device implementations beyond
//! the recording dummy can be added as new cases.

#![allow(dead_code)]

use ember_graphics::{
    BufferDescriptor, BufferUsage, DummyDevice, GpuBuffer, GpuTexture, PoolConfig,
    RenderDevice, ResourcePool, ResourceState, TextureDescriptor, TextureFormat, TextureUsage,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Devices available for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Recording device (no GPU).
    Dummy,
}

impl Backend {
    /// Get the backend name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
        }
    }

    /// Create a device for this backend.
    pub fn create_device(self) -> DummyDevice {
        match self {
            Backend::Dummy => DummyDevice::new(),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Device plus transient pool for one test.
pub struct TestContext {
    /// The backend being tested.
    pub backend: Backend,
    /// The device.
    pub device: DummyDevice,
    /// Transient pool shared across frames.
    pub pool: ResourcePool,
}

impl TestContext {
    /// Create a context with a default pool.
    pub fn new(backend: Backend) -> Self {
        Self::with_pool(backend, PoolConfig::default())
    }

    /// Create a context with a custom pool configuration.
    pub fn with_pool(backend: Backend, config: PoolConfig) -> Self {
        init_logging();
        Self {
            backend,
            device: backend.create_device(),
            pool: ResourcePool::new(config),
        }
    }

    /// Create an externally owned texture, as the application would.
    pub fn external_texture(&mut self, desc: &TextureDescriptor, state: ResourceState) -> GpuTexture {
        self.device
            .create_texture(desc, state)
            .expect("Failed to create external texture")
    }

    /// Create an externally owned buffer.
    pub fn external_buffer(&mut self, desc: &BufferDescriptor, state: ResourceState) -> GpuBuffer {
        self.device
            .create_buffer(desc, state)
            .expect("Failed to create external buffer")
    }
}

/// Route `log` output to the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Descriptors
// ============================================================================

/// A color target that can also be sampled and copied.
pub fn color_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT
            | TextureUsage::TEXTURE_BINDING
            | TextureUsage::COPY_SRC
            | TextureUsage::COPY_DST,
    )
}

/// A depth target that can be sampled.
pub fn depth_target(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
    .with_label("Depth")
}

/// A storage texture for compute passes.
pub fn storage_texture(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba16Float,
        TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_SRC,
    )
}

/// A buffer usable as storage and as copy source/destination.
pub fn storage_buffer(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(
        size,
        BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
    )
}
