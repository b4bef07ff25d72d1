//! Barrier batching.
//!
//! Barriers are collected for all resources a pass needs, then handed to the
//! device as one [`RenderDevice::resource_barrier`] call.

use super::ResourceState;
use crate::backend::{BarrierTarget, RenderDevice};

/// The kind of synchronization a barrier performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierKind {
    /// Change the usage state of a resource.
    Transition {
        /// State before the barrier.
        before: ResourceState,
        /// State after the barrier.
        after: ResourceState,
    },
    /// Order two unordered-access uses of the same resource.
    UnorderedAccess,
}

/// A single barrier on one physical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBarrier {
    /// The resource the barrier applies to.
    pub target: BarrierTarget,
    /// What the barrier does.
    pub kind: BarrierKind,
}

impl ResourceBarrier {
    /// Create a state transition barrier.
    pub fn transition(target: BarrierTarget, before: ResourceState, after: ResourceState) -> Self {
        Self {
            target,
            kind: BarrierKind::Transition { before, after },
        }
    }

    /// Create an unordered-access barrier.
    pub fn uav(target: BarrierTarget) -> Self {
        Self {
            target,
            kind: BarrierKind::UnorderedAccess,
        }
    }

    /// Returns the `(before, after)` pair for transitions.
    pub fn as_transition(&self) -> Option<(ResourceState, ResourceState)> {
        match self.kind {
            BarrierKind::Transition { before, after } => Some((before, after)),
            BarrierKind::UnorderedAccess => None,
        }
    }
}

/// A batch of barriers to submit together.
///
/// At most one barrier per resource is kept; adding a second transition for
/// the same resource folds it into the first.
#[derive(Debug, Default)]
pub struct BarrierBatch {
    barriers: Vec<ResourceBarrier>,
}

impl BarrierBatch {
    /// Create a new empty barrier batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state transition.
    ///
    /// Transitions where `before == after` are skipped.
    pub fn add_transition(
        &mut self,
        target: BarrierTarget,
        before: ResourceState,
        after: ResourceState,
    ) {
        if before == after {
            return;
        }

        match self.position(target) {
            Some(index) => {
                let folded_before = match self.barriers[index].kind {
                    BarrierKind::Transition { before, .. } => before,
                    BarrierKind::UnorderedAccess => before,
                };
                if folded_before == after {
                    self.barriers.remove(index);
                } else {
                    self.barriers[index] = ResourceBarrier::transition(target, folded_before, after);
                }
            }
            None => self
                .barriers
                .push(ResourceBarrier::transition(target, before, after)),
        }
    }

    /// Add an unordered-access barrier.
    pub fn add_uav(&mut self, target: BarrierTarget) {
        if self.position(target).is_none() {
            self.barriers.push(ResourceBarrier::uav(target));
        }
    }

    fn position(&self, target: BarrierTarget) -> Option<usize> {
        self.barriers.iter().position(|b| b.target == target)
    }

    /// Check if the batch has any barriers.
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// Get the number of barriers in the batch.
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    /// Number of state transitions in the batch.
    pub fn transition_count(&self) -> usize {
        self.barriers
            .iter()
            .filter(|b| matches!(b.kind, BarrierKind::Transition { .. }))
            .count()
    }

    /// Number of unordered-access barriers in the batch.
    pub fn uav_count(&self) -> usize {
        self.len() - self.transition_count()
    }

    /// The collected barriers in insertion order.
    pub fn barriers(&self) -> &[ResourceBarrier] {
        &self.barriers
    }

    /// Submit all barriers in a single device call.
    ///
    /// Does nothing if the batch is empty.
    pub fn submit(&self, device: &mut dyn RenderDevice) {
        if self.is_empty() {
            return;
        }
        log::trace!("BarrierBatch: submitting {} barriers", self.barriers.len());
        device.resource_barrier(&self.barriers);
    }

    /// Clear all barriers from the batch.
    pub fn clear(&mut self) {
        self.barriers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuBuffer, GpuTexture};

    #[test]
    fn test_same_state_skipped() {
        let mut batch = BarrierBatch::new();
        let target = BarrierTarget::Texture(GpuTexture::from_raw(1));
        batch.add_transition(target, ResourceState::COPY_SRC, ResourceState::COPY_SRC);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_transitions_fold_per_resource() {
        let mut batch = BarrierBatch::new();
        let target = BarrierTarget::Buffer(GpuBuffer::from_raw(2));
        batch.add_transition(target, ResourceState::COMMON, ResourceState::COPY_DST);
        batch.add_transition(target, ResourceState::COPY_DST, ResourceState::INDIRECT_ARGUMENT);

        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.barriers()[0].as_transition(),
            Some((ResourceState::COMMON, ResourceState::INDIRECT_ARGUMENT))
        );

        // Folding back to the original state cancels the barrier
        batch.add_transition(target, ResourceState::INDIRECT_ARGUMENT, ResourceState::COMMON);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_counts_and_clear() {
        let mut batch = BarrierBatch::new();
        batch.add_transition(
            BarrierTarget::Texture(GpuTexture::from_raw(1)),
            ResourceState::RENDER_TARGET,
            ResourceState::PIXEL_SHADER_RESOURCE,
        );
        batch.add_uav(BarrierTarget::Texture(GpuTexture::from_raw(2)));
        assert_eq!(batch.transition_count(), 1);
        assert_eq!(batch.uav_count(), 1);

        batch.clear();
        assert!(batch.is_empty());
    }
}
