//! Resource access declarations.
//!
//! Every resource a pass touches is declared with an [`AccessClass`], which
//! fixes both the capability the resource descriptor must provide and the
//! [`ResourceState`] the resource must be in while the pass runs.

use crate::backend::{LoadOp, StoreOp};
use crate::barrier::ResourceState;
use crate::types::{BufferUsage, ResourceDescriptor, TextureUsage};

use super::ResourceHandle;

/// Which shader stages read a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadAccess {
    /// Read by pixel shaders only.
    #[default]
    PixelShader,
    /// Read by vertex, compute or other non-pixel stages only.
    NonPixelShader,
    /// Read by every stage.
    AllShaders,
}

impl ReadAccess {
    /// The resource state this read requires.
    pub fn state(self) -> ResourceState {
        match self {
            Self::PixelShader => ResourceState::PIXEL_SHADER_RESOURCE,
            Self::NonPixelShader => ResourceState::NON_PIXEL_SHADER_RESOURCE,
            Self::AllShaders => ResourceState::ALL_SHADER_RESOURCE,
        }
    }
}

/// How a pass uses a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessClass {
    /// Sampled or loaded from shaders.
    ShaderRead(ReadAccess),
    /// Read and written through an unordered access view.
    UnorderedAccess,
    /// Color attachment write.
    RenderTarget,
    /// Depth/stencil attachment write.
    DepthStencilWrite,
    /// Depth/stencil attachment test without writes.
    DepthStencilRead,
    /// Copy source.
    CopySrc,
    /// Copy destination.
    CopyDst,
    /// Indirect draw or dispatch arguments.
    IndirectArgs,
}

impl AccessClass {
    /// Returns true if this access writes the resource.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::UnorderedAccess | Self::RenderTarget | Self::DepthStencilWrite | Self::CopyDst
        )
    }

    /// Returns true if this access only reads the resource.
    pub fn is_read(self) -> bool {
        !self.is_write()
    }

    /// Returns true for render pass attachments.
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            Self::RenderTarget | Self::DepthStencilWrite | Self::DepthStencilRead
        )
    }

    /// The resource state this access requires.
    pub fn state(self) -> ResourceState {
        match self {
            Self::ShaderRead(read) => read.state(),
            Self::UnorderedAccess => ResourceState::UNORDERED_ACCESS,
            Self::RenderTarget => ResourceState::RENDER_TARGET,
            Self::DepthStencilWrite => ResourceState::DEPTH_WRITE,
            Self::DepthStencilRead => ResourceState::DEPTH_READ,
            Self::CopySrc => ResourceState::COPY_SRC,
            Self::CopyDst => ResourceState::COPY_DST,
            Self::IndirectArgs => ResourceState::INDIRECT_ARGUMENT,
        }
    }

    /// Whether a write with this class keeps the previous contents.
    ///
    /// Attachments depend on their load operation; unordered-access writes
    /// and copy destinations always do (partial writes are allowed).
    pub fn preserves_contents(self, load_op: Option<LoadOp>) -> bool {
        match self {
            Self::RenderTarget | Self::DepthStencilWrite => {
                load_op.map_or(true, |op| op.preserves_contents())
            }
            Self::UnorderedAccess | Self::CopyDst => true,
            _ => false,
        }
    }

    /// Check that `descriptor` declares the capability this access needs.
    pub fn is_supported_by(self, descriptor: &ResourceDescriptor) -> bool {
        match descriptor {
            ResourceDescriptor::Texture(desc) => {
                let usage = desc.usage;
                match self {
                    Self::ShaderRead(_) => usage.contains(TextureUsage::TEXTURE_BINDING),
                    Self::UnorderedAccess => usage.contains(TextureUsage::STORAGE_BINDING),
                    Self::RenderTarget => {
                        usage.contains(TextureUsage::RENDER_ATTACHMENT)
                            && !desc.format.is_depth_stencil()
                    }
                    Self::DepthStencilWrite | Self::DepthStencilRead => {
                        usage.contains(TextureUsage::RENDER_ATTACHMENT)
                            && desc.format.is_depth_stencil()
                    }
                    Self::CopySrc => usage.contains(TextureUsage::COPY_SRC),
                    Self::CopyDst => usage.contains(TextureUsage::COPY_DST),
                    Self::IndirectArgs => false,
                }
            }
            ResourceDescriptor::Buffer(desc) => {
                let usage = desc.usage;
                match self {
                    Self::ShaderRead(_) => {
                        usage.intersects(BufferUsage::STORAGE | BufferUsage::UNIFORM)
                    }
                    Self::UnorderedAccess => usage.contains(BufferUsage::STORAGE),
                    Self::CopySrc => usage.contains(BufferUsage::COPY_SRC),
                    Self::CopyDst => usage.contains(BufferUsage::COPY_DST),
                    Self::IndirectArgs => usage.contains(BufferUsage::INDIRECT),
                    Self::RenderTarget | Self::DepthStencilWrite | Self::DepthStencilRead => false,
                }
            }
        }
    }
}

/// What a declared access does to the resource's version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// The pass declared the resource. No GPU access by itself.
    Create,
    /// The pass reads the current version.
    Read,
    /// The pass produces a new version.
    Write,
}

/// Load/store configuration of an attachment access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentOps {
    /// Load operation at render pass begin.
    pub load_op: LoadOp,
    /// Store operation at render pass end.
    pub store_op: StoreOp,
}

impl AttachmentOps {
    /// Load with `load_op` and keep the result.
    pub fn store(load_op: LoadOp) -> Self {
        Self {
            load_op,
            store_op: StoreOp::Store,
        }
    }

    /// Load with `load_op` and let the device drop the result at pass end.
    ///
    /// For attachments only needed inside the pass, such as a depth buffer
    /// used for a single shadow render.
    pub fn discard(load_op: LoadOp) -> Self {
        Self {
            load_op,
            store_op: StoreOp::DontCare,
        }
    }
}

/// One resource access recorded by the pass builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAccess {
    /// The accessed resource.
    pub resource: ResourceHandle,
    /// Create, read or write.
    pub mode: AccessMode,
    /// Access class. `None` for [`AccessMode::Create`].
    pub class: Option<AccessClass>,
    /// Version consumed by this access, if any.
    pub read_version: Option<u32>,
    /// Version produced by this access, if any.
    pub write_version: Option<u32>,
    /// Load/store operations for attachments.
    pub attachment: Option<AttachmentOps>,
}

impl ResourceAccess {
    /// The state the resource must be in, or `None` for creation records.
    pub fn state(&self) -> Option<ResourceState> {
        self.class.map(AccessClass::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferDescriptor, TextureDescriptor, TextureFormat};

    fn texture(format: TextureFormat, usage: TextureUsage) -> ResourceDescriptor {
        TextureDescriptor::new_2d(64, 64, format, usage).into()
    }

    #[test]
    fn test_storage_requires_flag() {
        let sampled = texture(TextureFormat::Rgba8Unorm, TextureUsage::TEXTURE_BINDING);
        assert!(!AccessClass::UnorderedAccess.is_supported_by(&sampled));
        assert!(AccessClass::ShaderRead(ReadAccess::AllShaders).is_supported_by(&sampled));

        let storage = texture(TextureFormat::Rgba8Unorm, TextureUsage::STORAGE_BINDING);
        assert!(AccessClass::UnorderedAccess.is_supported_by(&storage));
    }

    #[test]
    fn test_attachment_format_rules() {
        let depth = texture(TextureFormat::Depth32Float, TextureUsage::RENDER_ATTACHMENT);
        let color = texture(TextureFormat::Rgba16Float, TextureUsage::RENDER_ATTACHMENT);

        assert!(AccessClass::DepthStencilWrite.is_supported_by(&depth));
        assert!(AccessClass::DepthStencilRead.is_supported_by(&depth));
        assert!(!AccessClass::RenderTarget.is_supported_by(&depth));
        assert!(AccessClass::RenderTarget.is_supported_by(&color));
        assert!(!AccessClass::DepthStencilWrite.is_supported_by(&color));
    }

    #[test]
    fn test_buffer_classes() {
        let args: ResourceDescriptor =
            BufferDescriptor::new(16, BufferUsage::INDIRECT | BufferUsage::STORAGE).into();
        assert!(AccessClass::IndirectArgs.is_supported_by(&args));
        assert!(AccessClass::UnorderedAccess.is_supported_by(&args));
        assert!(!AccessClass::RenderTarget.is_supported_by(&args));
        assert!(!AccessClass::CopySrc.is_supported_by(&args));
    }

    #[test]
    fn test_content_preservation() {
        assert!(AccessClass::UnorderedAccess.preserves_contents(None));
        assert!(AccessClass::RenderTarget.preserves_contents(Some(LoadOp::Load)));
        assert!(!AccessClass::RenderTarget.preserves_contents(Some(LoadOp::DontCare)));
        assert!(!AccessClass::DepthStencilWrite.preserves_contents(Some(LoadOp::clear_depth(1.0))));
    }

    #[test]
    fn test_states() {
        assert_eq!(
            AccessClass::DepthStencilRead.state(),
            ResourceState::DEPTH_READ
        );
        assert_eq!(
            AccessClass::ShaderRead(ReadAccess::NonPixelShader).state(),
            ResourceState::NON_PIXEL_SHADER_RESOURCE
        );
        assert!(AccessClass::CopyDst.is_write());
        assert!(AccessClass::IndirectArgs.is_read());
    }
}
