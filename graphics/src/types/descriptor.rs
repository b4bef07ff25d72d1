//! Kind-tagged resource descriptors.

use std::fmt;

use super::{BufferDescriptor, TextureDescriptor};

/// Semantic type of a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A texture (image) resource.
    Texture,
    /// A linear buffer resource.
    Buffer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture => write!(f, "texture"),
            Self::Buffer => write!(f, "buffer"),
        }
    }
}

/// Descriptor of either a texture or a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceDescriptor {
    /// Texture descriptor.
    Texture(TextureDescriptor),
    /// Buffer descriptor.
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    /// The resource kind this descriptor creates.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Texture(_) => ResourceKind::Texture,
            Self::Buffer(_) => ResourceKind::Buffer,
        }
    }

    /// The debug label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Texture(desc) => desc.label.as_deref(),
            Self::Buffer(desc) => desc.label.as_deref(),
        }
    }

    /// Get the texture descriptor, if this is a texture.
    pub fn as_texture(&self) -> Option<&TextureDescriptor> {
        match self {
            Self::Texture(desc) => Some(desc),
            Self::Buffer(_) => None,
        }
    }

    /// Get the buffer descriptor, if this is a buffer.
    pub fn as_buffer(&self) -> Option<&BufferDescriptor> {
        match self {
            Self::Buffer(desc) => Some(desc),
            Self::Texture(_) => None,
        }
    }

    /// Check whether a physical resource created from `self` can back
    /// `request`. Different kinds are never compatible.
    pub fn is_compatible_with(&self, request: &ResourceDescriptor) -> bool {
        match (self, request) {
            (Self::Texture(a), Self::Texture(b)) => a.is_compatible_with(b),
            (Self::Buffer(a), Self::Buffer(b)) => a.is_compatible_with(b),
            _ => false,
        }
    }

    /// Approximate memory footprint in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            Self::Texture(desc) => desc.size_in_bytes(),
            Self::Buffer(desc) => desc.size,
        }
    }
}

impl From<TextureDescriptor> for ResourceDescriptor {
    fn from(desc: TextureDescriptor) -> Self {
        Self::Texture(desc)
    }
}

impl From<BufferDescriptor> for ResourceDescriptor {
    fn from(desc: BufferDescriptor) -> Self {
        Self::Buffer(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    #[test]
    fn test_kinds_never_compatible() {
        let texture: ResourceDescriptor =
            TextureDescriptor::new_2d(16, 16, TextureFormat::R32Float, TextureUsage::all()).into();
        let buffer: ResourceDescriptor = BufferDescriptor::new(1024, BufferUsage::all()).into();
        assert!(!texture.is_compatible_with(&buffer));
        assert!(!buffer.is_compatible_with(&texture));
        assert_eq!(texture.kind(), ResourceKind::Texture);
        assert_eq!(buffer.kind(), ResourceKind::Buffer);
    }

    #[test]
    fn test_label_passthrough() {
        let desc: ResourceDescriptor = BufferDescriptor::new(64, BufferUsage::UNIFORM)
            .with_label("constants")
            .into();
        assert_eq!(desc.label(), Some("constants"));
        assert_eq!(desc.size_in_bytes(), 64);
    }
}
