//! Resource usage states and per-frame state tracking.

use std::collections::HashMap;

use bitflags::bitflags;

use super::BarrierBatch;
use crate::backend::BarrierTarget;

bitflags! {
    /// Usage state of a physical resource.
    ///
    /// Read-only states may be combined (a texture can be a pixel and
    /// non-pixel shader resource at once); write states are exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        /// Generic state with no particular optimization.
        const COMMON = 1 << 0;
        /// Bound as a color attachment.
        const RENDER_TARGET = 1 << 1;
        /// Bound as a writable depth/stencil attachment.
        const DEPTH_WRITE = 1 << 2;
        /// Bound as a read-only depth/stencil attachment.
        const DEPTH_READ = 1 << 3;
        /// Read by pixel shaders.
        const PIXEL_SHADER_RESOURCE = 1 << 4;
        /// Read by any non-pixel shader stage.
        const NON_PIXEL_SHADER_RESOURCE = 1 << 5;
        /// Read and written through unordered access views.
        const UNORDERED_ACCESS = 1 << 6;
        /// Source of a copy.
        const COPY_SRC = 1 << 7;
        /// Destination of a copy.
        const COPY_DST = 1 << 8;
        /// Source of indirect draw/dispatch arguments.
        const INDIRECT_ARGUMENT = 1 << 9;
        /// Ready for presentation.
        const PRESENT = 1 << 10;

        /// Readable by every shader stage.
        const ALL_SHADER_RESOURCE =
            Self::PIXEL_SHADER_RESOURCE.bits() | Self::NON_PIXEL_SHADER_RESOURCE.bits();
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::COMMON
    }
}

impl ResourceState {
    const WRITE_STATES: Self = Self::RENDER_TARGET
        .union(Self::DEPTH_WRITE)
        .union(Self::UNORDERED_ACCESS)
        .union(Self::COPY_DST);

    /// Returns true if the state allows the GPU to write the resource.
    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITE_STATES)
    }

    /// Returns true if the state only allows reads.
    pub fn is_read_only(self) -> bool {
        !self.is_write() && !self.is_empty() && self != Self::COMMON && self != Self::PRESENT
    }

    /// Returns true if a resource currently in `self` can be used as
    /// `required` without a transition.
    pub fn satisfies(self, required: ResourceState) -> bool {
        if self == required {
            return true;
        }
        // A combined read state serves any subset of its reads.
        self.is_read_only() && required.is_read_only() && self.contains(required)
    }
}

/// Tracks the last known state of every physical resource touched this frame.
///
/// The tracker holds no defaults: a resource must be registered with
/// [`set`](Self::set) (imported state or pooled state) before it is
/// requested in a new state.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<BarrierTarget, ResourceState>,
}

impl StateTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of a resource.
    pub fn set(&mut self, target: BarrierTarget, state: ResourceState) {
        self.states.insert(target, state);
    }

    /// Get the last recorded state of a resource.
    pub fn get(&self, target: BarrierTarget) -> Option<ResourceState> {
        self.states.get(&target).copied()
    }

    /// Stop tracking a resource, returning its last state.
    pub fn forget(&mut self, target: BarrierTarget) -> Option<ResourceState> {
        self.states.remove(&target)
    }

    /// Request `required` for a resource, adding whatever barrier is needed to
    /// `batch`, and record the new state.
    ///
    /// Untracked resources are assumed to be in `required` already.
    pub fn request(
        &mut self,
        target: BarrierTarget,
        required: ResourceState,
        batch: &mut BarrierBatch,
    ) {
        let Some(current) = self.states.get(&target).copied() else {
            log::warn!("StateTracker: {target:?} requested before registration");
            self.states.insert(target, required);
            return;
        };

        if current == ResourceState::UNORDERED_ACCESS && required == ResourceState::UNORDERED_ACCESS
        {
            batch.add_uav(target);
        } else if !current.satisfies(required) {
            batch.add_transition(target, current, required);
            self.states.insert(target, required);
        }
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if no resource is tracked.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GpuTexture;

    fn texture(raw: u64) -> BarrierTarget {
        BarrierTarget::Texture(GpuTexture::from_raw(raw))
    }

    #[test]
    fn test_write_states() {
        assert!(ResourceState::RENDER_TARGET.is_write());
        assert!(ResourceState::UNORDERED_ACCESS.is_write());
        assert!(!ResourceState::DEPTH_READ.is_write());
        assert!(ResourceState::DEPTH_READ.is_read_only());
        assert!(!ResourceState::COMMON.is_read_only());
    }

    #[test]
    fn test_combined_read_satisfies_subset() {
        assert!(ResourceState::ALL_SHADER_RESOURCE.satisfies(ResourceState::PIXEL_SHADER_RESOURCE));
        assert!(!ResourceState::PIXEL_SHADER_RESOURCE.satisfies(ResourceState::ALL_SHADER_RESOURCE));
        assert!(!ResourceState::RENDER_TARGET.satisfies(ResourceState::PIXEL_SHADER_RESOURCE));
    }

    #[test]
    fn test_request_emits_transition_once() {
        let mut tracker = StateTracker::new();
        let mut batch = BarrierBatch::new();
        tracker.set(texture(1), ResourceState::RENDER_TARGET);

        tracker.request(texture(1), ResourceState::PIXEL_SHADER_RESOURCE, &mut batch);
        tracker.request(texture(1), ResourceState::PIXEL_SHADER_RESOURCE, &mut batch);

        assert_eq!(batch.len(), 1);
        assert_eq!(
            tracker.get(texture(1)),
            Some(ResourceState::PIXEL_SHADER_RESOURCE)
        );
    }

    #[test]
    fn test_consecutive_unordered_access_gets_uav_barrier() {
        let mut tracker = StateTracker::new();
        let mut batch = BarrierBatch::new();
        tracker.set(texture(3), ResourceState::UNORDERED_ACCESS);

        tracker.request(texture(3), ResourceState::UNORDERED_ACCESS, &mut batch);

        assert_eq!(batch.transition_count(), 0);
        assert_eq!(batch.uav_count(), 1);
    }

    #[test]
    fn test_forget_returns_last_state() {
        let mut tracker = StateTracker::new();
        tracker.set(texture(5), ResourceState::COPY_DST);
        assert_eq!(tracker.forget(texture(5)), Some(ResourceState::COPY_DST));
        assert!(tracker.is_empty());
    }
}
