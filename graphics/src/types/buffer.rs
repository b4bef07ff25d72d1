//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Capability flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add usage flags.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage |= usage;
        self
    }

    /// Check whether a physical buffer created from `self` can back a logical
    /// buffer described by `request`.
    ///
    /// `self` must be at least as large and its usage flags a superset.
    pub fn is_compatible_with(&self, request: &BufferDescriptor) -> bool {
        self.size >= request.size && self.usage.contains(request.usage)
    }
}

// ============================================================================
// Indirect Arguments
// ============================================================================

/// Arguments for a non-indexed indirect draw call.
///
/// Layout matches `DrawIndirect` in the explicit APIs: four tightly packed
/// `u32` values, 16 bytes total.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DrawIndirectArgs {
    /// Number of vertices to draw.
    pub vertex_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Index of the first vertex to draw.
    pub first_vertex: u32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new indirect draw arguments.
    pub fn new(vertex_count: u32, instance_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Little-endian byte representation for uploading.
    pub fn to_bytes(&self) -> [u8; 16] {
        pack_u32s([
            self.vertex_count,
            self.instance_count,
            self.first_vertex,
            self.first_instance,
        ])
    }
}

/// Arguments for an indirect compute dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DispatchIndirectArgs {
    /// Workgroups in X.
    pub x: u32,
    /// Workgroups in Y.
    pub y: u32,
    /// Workgroups in Z.
    pub z: u32,
}

impl DispatchIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new dispatch arguments.
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Little-endian byte representation for uploading.
    pub fn to_bytes(&self) -> [u8; 12] {
        pack_u32s([self.x, self.y, self.z])
    }
}

fn pack_u32s<const N: usize, const B: usize>(values: [u32; N]) -> [u8; B] {
    let mut bytes = [0u8; B];
    for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_compatibility() {
        let pooled = BufferDescriptor::new(1024, BufferUsage::STORAGE | BufferUsage::COPY_SRC);
        assert!(pooled.is_compatible_with(&BufferDescriptor::new(1024, BufferUsage::STORAGE)));
        assert!(pooled.is_compatible_with(&BufferDescriptor::new(512, BufferUsage::STORAGE)));
        assert!(!pooled.is_compatible_with(&BufferDescriptor::new(2048, BufferUsage::STORAGE)));
        assert!(!pooled.is_compatible_with(&BufferDescriptor::new(1024, BufferUsage::INDIRECT)));
    }

    #[test]
    fn test_indirect_args_layout() {
        assert_eq!(DrawIndirectArgs::SIZE, 16);
        assert_eq!(DispatchIndirectArgs::SIZE, 12);

        let bytes = DispatchIndirectArgs::new(8, 4, 1).to_bytes();
        assert_eq!(&bytes[0..4], &8u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());

        let draw = DrawIndirectArgs::new(36, 2).to_bytes();
        assert_eq!(&draw[4..8], &2u32.to_le_bytes());
    }
}
