//! Pooled physical resources for frame graph transients.
//!
//! The [`ResourcePool`] owns every GPU allocation that backs a transient
//! logical resource. The executor lends entries out for the span between a
//! resource's first and last use and takes them back right after, so two
//! logical resources whose lifetimes do not overlap end up sharing one
//! allocation (memory aliasing).
//!
//! ```text
//! pass:        0     1     2     3
//! "GBuffer"  [=========]
//! "Bloom"                [=====]          <- reuses the GBuffer allocation
//! "History"  [=======================]    <- exported, held to frame end
//! ```
//!
//! Entries survive across frames and remember the state they were released
//! in. Entries left idle for more than [`PoolConfig::max_idle_frames`]
//! frames are destroyed by [`ResourcePool::begin_frame`].
//!
//! # Example
//!
//! ```ignore
//! let mut pool = ResourcePool::new(PoolConfig::default());
//!
//! loop {
//!     pool.begin_frame(&mut device);
//!
//!     let mut graph = FrameGraph::new();
//!     // ... add passes ...
//!     graph.build()?;
//!     graph.execute(&mut device, &mut pool)?;
//! }
//!
//! pool.clear(&mut device);
//! ```

use static_assertions::assert_impl_all;

use crate::backend::{BarrierTarget, RenderDevice};
use crate::barrier::ResourceState;
use crate::error::GraphicsError;
use crate::types::ResourceDescriptor;

/// Identifies one pooled allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalId(u32);

impl PhysicalId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Pool limits and eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Destroy entries left idle for more than this many frames.
    pub max_idle_frames: u64,
    /// Maximum number of allocated entries, unlimited if `None`.
    pub max_resources: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_frames: 3,
            max_resources: None,
        }
    }
}

impl PoolConfig {
    /// Set the idle frame limit.
    pub fn with_max_idle_frames(mut self, frames: u64) -> Self {
        self.max_idle_frames = frames;
        self
    }

    /// Set the maximum number of entries.
    pub fn with_max_resources(mut self, limit: usize) -> Self {
        self.max_resources = Some(limit);
        self
    }
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Entries currently allocated, in use or idle.
    pub allocated: usize,
    /// Entries currently lent out.
    pub live: usize,
    /// Highest `live` value since creation or the last [`ResourcePool::reset_peak`].
    pub peak_live: usize,
    /// Device allocations made over the pool's lifetime.
    pub total_allocations: usize,
    /// Acquisitions served by an existing entry.
    pub reuse_hits: usize,
}

#[derive(Debug)]
struct PoolEntry {
    descriptor: ResourceDescriptor,
    target: BarrierTarget,
    state: ResourceState,
    in_use: bool,
    fresh: bool,
    last_release_frame: u64,
}

/// Owner of every pooled GPU allocation.
///
/// Mutated only by the frame-driving thread; see the [module docs](self).
#[derive(Debug, Default)]
pub struct ResourcePool {
    config: PoolConfig,
    entries: Vec<Option<PoolEntry>>,
    frame_index: u64,
    stats: PoolStats,
}

assert_impl_all!(ResourcePool: Send, Sync);

impl ResourcePool {
    /// Create an empty pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Lend out an entry compatible with `descriptor`.
    ///
    /// Reuses the first idle compatible entry; its state is whatever it was
    /// released in. Otherwise allocates a new entry directly in
    /// `initial_state`.
    pub fn acquire(
        &mut self,
        descriptor: &ResourceDescriptor,
        initial_state: ResourceState,
        device: &mut dyn RenderDevice,
    ) -> Result<PhysicalId, GraphicsError> {
        let reusable = self.entries.iter().position(|entry| {
            entry
                .as_ref()
                .is_some_and(|e| !e.in_use && e.descriptor.is_compatible_with(descriptor))
        });

        if let Some(index) = reusable {
            if let Some(entry) = self.entries[index].as_mut() {
                entry.in_use = true;
                entry.fresh = false;
            }
            self.stats.reuse_hits += 1;
            self.mark_live();
            let id = PhysicalId(index as u32);
            log::trace!("ResourcePool: reuse {id:?}");
            return Ok(id);
        }

        if let Some(limit) = self.config.max_resources {
            if self.stats.allocated >= limit {
                return Err(GraphicsError::PoolExhausted { limit });
            }
        }

        let target = match descriptor {
            ResourceDescriptor::Texture(desc) => {
                BarrierTarget::Texture(device.create_texture(desc, initial_state)?)
            }
            ResourceDescriptor::Buffer(desc) => {
                BarrierTarget::Buffer(device.create_buffer(desc, initial_state)?)
            }
        };
        let entry = PoolEntry {
            descriptor: descriptor.clone(),
            target,
            state: initial_state,
            in_use: true,
            fresh: true,
            last_release_frame: self.frame_index,
        };

        let index = match self.entries.iter().position(Option::is_none) {
            Some(index) => {
                self.entries[index] = Some(entry);
                index
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        self.stats.allocated += 1;
        self.stats.total_allocations += 1;
        self.mark_live();
        log::debug!(
            "ResourcePool: allocated {} ({:?}), {} entries",
            descriptor.label().unwrap_or("<unnamed>"),
            descriptor.kind(),
            self.stats.allocated
        );
        Ok(PhysicalId(index as u32))
    }

    fn mark_live(&mut self) {
        self.stats.live += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.stats.live);
    }

    /// Return an entry, recording the state it was left in.
    pub fn release(&mut self, id: PhysicalId, state: ResourceState) {
        let frame = self.frame_index;
        match self.entries.get_mut(id.index()).and_then(Option::as_mut) {
            Some(entry) if entry.in_use => {
                entry.in_use = false;
                entry.state = state;
                entry.last_release_frame = frame;
                self.stats.live -= 1;
            }
            _ => log::warn!("ResourcePool: release of {id:?} which is not lent out"),
        }
    }

    /// The physical resource behind an entry.
    pub fn target(&self, id: PhysicalId) -> Option<BarrierTarget> {
        self.entry(id).map(|entry| entry.target)
    }

    /// The last recorded state of an entry.
    pub fn state(&self, id: PhysicalId) -> Option<ResourceState> {
        self.entry(id).map(|entry| entry.state)
    }

    /// Whether an entry was allocated by its current acquisition.
    ///
    /// A fresh entry has no earlier work on it. A reused entry may still be
    /// the target of commands recorded for a previous owner.
    pub fn is_fresh(&self, id: PhysicalId) -> bool {
        self.entry(id).is_some_and(|entry| entry.fresh)
    }

    /// The descriptor an entry was created with.
    pub fn descriptor(&self, id: PhysicalId) -> Option<&ResourceDescriptor> {
        self.entry(id).map(|entry| &entry.descriptor)
    }

    fn entry(&self, id: PhysicalId) -> Option<&PoolEntry> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    /// Advance to the next frame.
    ///
    /// Warns about entries still lent out and destroys entries idle for too
    /// long.
    pub fn begin_frame(&mut self, device: &mut dyn RenderDevice) {
        self.frame_index += 1;

        let leaked = self
            .entries
            .iter()
            .flatten()
            .filter(|entry| entry.in_use)
            .count();
        if leaked > 0 {
            log::warn!(
                "ResourcePool: {leaked} entries still in use at frame {}",
                self.frame_index
            );
        }

        self.trim(device);
        ember_core::profile_plot!("pool_allocated", self.stats.allocated);
        ember_core::profile_plot!("pool_peak_live", self.stats.peak_live);
        log::trace!("ResourcePool: begin frame {}", self.frame_index);
    }

    /// Destroy idle entries older than the configured idle limit.
    pub fn trim(&mut self, device: &mut dyn RenderDevice) {
        let frame = self.frame_index;
        let max_idle = self.config.max_idle_frames;
        self.evict(device, |entry| {
            frame.saturating_sub(entry.last_release_frame) > max_idle
        });
    }

    /// Destroy every idle entry.
    pub fn clear(&mut self, device: &mut dyn RenderDevice) {
        self.evict(device, |_| true);
    }

    fn evict(
        &mut self,
        device: &mut dyn RenderDevice,
        mut should_evict: impl FnMut(&PoolEntry) -> bool,
    ) {
        let mut evicted = 0usize;
        for slot in &mut self.entries {
            let Some(entry) = slot.as_ref() else {
                continue;
            };
            if entry.in_use || !should_evict(entry) {
                continue;
            }
            match entry.target {
                BarrierTarget::Texture(texture) => device.destroy_texture(texture),
                BarrierTarget::Buffer(buffer) => device.destroy_buffer(buffer),
            }
            *slot = None;
            evicted += 1;
        }

        if evicted > 0 {
            self.stats.allocated -= evicted;
            log::debug!(
                "ResourcePool: destroyed {evicted} idle entries, {} remain",
                self.stats.allocated
            );
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Restart peak tracking from the current live count.
    pub fn reset_peak(&mut self) {
        self.stats.peak_live = self.stats.live;
    }

    /// The current frame index.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Number of allocated entries.
    pub fn len(&self) -> usize {
        self.stats.allocated
    }

    /// Check if no entry is allocated.
    pub fn is_empty(&self) -> bool {
        self.stats.allocated == 0
    }

    /// Number of entries currently lent out.
    pub fn live_count(&self) -> usize {
        self.stats.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::types::{
        BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage,
    };

    fn color(width: u32) -> ResourceDescriptor {
        TextureDescriptor::new_2d(
            width,
            width,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
        .into()
    }

    #[test]
    fn test_release_then_acquire_reuses() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default());

        let a = pool
            .acquire(&color(64), ResourceState::RENDER_TARGET, &mut device)
            .unwrap();
        assert!(pool.is_fresh(a));
        pool.release(a, ResourceState::PIXEL_SHADER_RESOURCE);
        let b = pool
            .acquire(&color(64), ResourceState::RENDER_TARGET, &mut device)
            .unwrap();

        assert_eq!(a, b);
        assert!(!pool.is_fresh(b));
        assert_eq!(pool.state(b), Some(ResourceState::PIXEL_SHADER_RESOURCE));
        let stats = pool.stats();
        assert_eq!(stats.total_allocations, 1);
        assert_eq!(stats.reuse_hits, 1);
    }

    #[test]
    fn test_incompatible_descriptor_allocates() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default());

        let a = pool
            .acquire(&color(64), ResourceState::RENDER_TARGET, &mut device)
            .unwrap();
        pool.release(a, ResourceState::RENDER_TARGET);
        let b = pool
            .acquire(&color(128), ResourceState::RENDER_TARGET, &mut device)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_peak_tracks_concurrent_use() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default());

        let a = pool
            .acquire(&color(64), ResourceState::COMMON, &mut device)
            .unwrap();
        let b = pool
            .acquire(&color(64), ResourceState::COMMON, &mut device)
            .unwrap();
        pool.release(a, ResourceState::COMMON);
        pool.release(b, ResourceState::COMMON);
        let _c = pool
            .acquire(&color(64), ResourceState::COMMON, &mut device)
            .unwrap();

        let stats = pool.stats();
        assert_eq!(stats.peak_live, 2);
        assert_eq!(stats.live, 1);
        assert_eq!(stats.allocated, 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default().with_max_resources(1));

        pool.acquire(&color(64), ResourceState::COMMON, &mut device)
            .unwrap();
        let err = pool
            .acquire(&color(64), ResourceState::COMMON, &mut device)
            .unwrap_err();
        assert_eq!(err, GraphicsError::PoolExhausted { limit: 1 });
    }

    #[test]
    fn test_idle_entries_are_trimmed() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default().with_max_idle_frames(1));

        let id = pool
            .acquire(
                &BufferDescriptor::new(256, BufferUsage::STORAGE).into(),
                ResourceState::UNORDERED_ACCESS,
                &mut device,
            )
            .unwrap();
        pool.release(id, ResourceState::UNORDERED_ACCESS);

        pool.begin_frame(&mut device);
        assert_eq!(pool.len(), 1);
        pool.begin_frame(&mut device);
        assert!(pool.is_empty());
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_clear_keeps_lent_entries() {
        let mut device = DummyDevice::new();
        let mut pool = ResourcePool::new(PoolConfig::default());

        let held = pool
            .acquire(&color(32), ResourceState::COMMON, &mut device)
            .unwrap();
        let idle = pool
            .acquire(&color(32), ResourceState::COMMON, &mut device)
            .unwrap();
        pool.release(idle, ResourceState::COMMON);

        pool.clear(&mut device);
        assert_eq!(pool.len(), 1);
        assert!(pool.target(held).is_some());
        assert!(pool.target(idle).is_none());
    }
}
