//! The pass builder.

use ember_core::Blackboard;

use crate::backend::LoadOp;
use crate::error::GraphError;
use crate::types::{BufferDescriptor, ResourceDescriptor, ResourceKind, TextureDescriptor, Viewport};

use super::ids::*;
use super::{
    AccessClass, AccessMode, AttachmentOps, PassDeclaration, PassHandle, ReadAccess,
    ResourceAccess, ResourceHandle, ResourceName, ResourceRegistry,
};

/// Records the resources a pass creates, reads and writes.
///
/// Handed to the setup function of [`FrameGraph::add_pass`](super::FrameGraph::add_pass).
/// Every call validates the declaration immediately and returns a typed id
/// that only this pass's execution can redeem. Nothing touches the GPU.
pub struct PassBuilder<'g> {
    registry: &'g mut ResourceRegistry,
    blackboard: &'g Blackboard,
    declaration: PassDeclaration,
}

impl<'g> PassBuilder<'g> {
    pub(crate) fn new(
        registry: &'g mut ResourceRegistry,
        blackboard: &'g Blackboard,
        declaration: PassDeclaration,
    ) -> Self {
        Self {
            registry,
            blackboard,
            declaration,
        }
    }

    pub(crate) fn finish(self) -> PassDeclaration {
        self.declaration
    }

    /// The handle of the pass being declared.
    pub fn pass(&self) -> PassHandle {
        self.declaration.handle
    }

    /// Values published to the frame's blackboard so far.
    pub fn blackboard(&self) -> &Blackboard {
        self.blackboard
    }

    /// Override the viewport of the automatic render pass.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.declaration.viewport = Some(viewport);
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Declare a transient texture created by this pass.
    pub fn create_texture(
        &mut self,
        name: impl Into<ResourceName>,
        descriptor: TextureDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        self.create(name.into(), descriptor.into())
    }

    /// Declare a transient buffer created by this pass.
    pub fn create_buffer(
        &mut self,
        name: impl Into<ResourceName>,
        descriptor: BufferDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        self.create(name.into(), descriptor.into())
    }

    fn create(
        &mut self,
        name: ResourceName,
        descriptor: ResourceDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        let handle = self.registry.declare(name, descriptor)?;
        if let Some(resource) = self.registry.get_mut(handle) {
            resource.record_creator(self.declaration.handle);
        }
        self.declaration.accesses.push(ResourceAccess {
            resource: handle,
            mode: AccessMode::Create,
            class: None,
            read_version: None,
            write_version: None,
            attachment: None,
        });
        Ok(handle)
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Read a texture from shaders.
    pub fn read_texture(
        &mut self,
        name: impl Into<ResourceName>,
        access: ReadAccess,
    ) -> Result<TextureReadId, GraphError> {
        self.texture(name.into(), AccessClass::ShaderRead(access), None)
            .map(TextureReadId::new)
    }

    /// Read and write a texture through an unordered access view.
    pub fn write_texture(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<TextureReadWriteId, GraphError> {
        self.texture(name.into(), AccessClass::UnorderedAccess, None)
            .map(TextureReadWriteId::new)
    }

    /// Render into a texture as a color attachment, storing the result.
    pub fn write_render_target(
        &mut self,
        name: impl Into<ResourceName>,
        load_op: LoadOp,
    ) -> Result<RenderTargetId, GraphError> {
        self.write_render_target_with(name, AttachmentOps::store(load_op))
    }

    /// Render into a texture as a color attachment with explicit load/store ops.
    pub fn write_render_target_with(
        &mut self,
        name: impl Into<ResourceName>,
        ops: AttachmentOps,
    ) -> Result<RenderTargetId, GraphError> {
        self.texture(name.into(), AccessClass::RenderTarget, Some(ops))
            .map(RenderTargetId::new)
    }

    /// Bind a texture as a writable depth/stencil attachment, storing the result.
    pub fn write_depth_stencil(
        &mut self,
        name: impl Into<ResourceName>,
        load_op: LoadOp,
    ) -> Result<DepthStencilId, GraphError> {
        self.write_depth_stencil_with(name, AttachmentOps::store(load_op))
    }

    /// Bind a texture as a writable depth/stencil attachment with explicit
    /// load/store ops.
    pub fn write_depth_stencil_with(
        &mut self,
        name: impl Into<ResourceName>,
        ops: AttachmentOps,
    ) -> Result<DepthStencilId, GraphError> {
        self.texture(name.into(), AccessClass::DepthStencilWrite, Some(ops))
            .map(DepthStencilId::new)
    }

    /// Bind a texture as a read-only depth/stencil attachment.
    pub fn read_depth_stencil(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<DepthStencilId, GraphError> {
        let ops = AttachmentOps::store(LoadOp::Load);
        self.texture(name.into(), AccessClass::DepthStencilRead, Some(ops))
            .map(DepthStencilId::new)
    }

    /// Read a texture as a copy source.
    pub fn read_copy_src_texture(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<TextureCopySrcId, GraphError> {
        self.texture(name.into(), AccessClass::CopySrc, None)
            .map(TextureCopySrcId::new)
    }

    /// Write a texture as a copy destination.
    pub fn write_copy_dst_texture(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<TextureCopyDstId, GraphError> {
        self.texture(name.into(), AccessClass::CopyDst, None)
            .map(TextureCopyDstId::new)
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Read a buffer from shaders.
    pub fn read_buffer(
        &mut self,
        name: impl Into<ResourceName>,
        access: ReadAccess,
    ) -> Result<BufferReadId, GraphError> {
        self.buffer(name.into(), AccessClass::ShaderRead(access))
            .map(BufferReadId::new)
    }

    /// Read and write a buffer through an unordered access view.
    pub fn write_buffer(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<BufferReadWriteId, GraphError> {
        self.buffer(name.into(), AccessClass::UnorderedAccess)
            .map(BufferReadWriteId::new)
    }

    /// Read a buffer as a copy source.
    pub fn read_copy_src_buffer(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<BufferCopySrcId, GraphError> {
        self.buffer(name.into(), AccessClass::CopySrc)
            .map(BufferCopySrcId::new)
    }

    /// Write a buffer as a copy destination.
    pub fn write_copy_dst_buffer(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<BufferCopyDstId, GraphError> {
        self.buffer(name.into(), AccessClass::CopyDst)
            .map(BufferCopyDstId::new)
    }

    /// Read indirect draw or dispatch arguments from a buffer.
    pub fn read_indirect_args(
        &mut self,
        name: impl Into<ResourceName>,
    ) -> Result<IndirectArgsId, GraphError> {
        self.buffer(name.into(), AccessClass::IndirectArgs)
            .map(IndirectArgsId::new)
    }

    // ------------------------------------------------------------------
    // Declaration core
    // ------------------------------------------------------------------

    fn texture(
        &mut self,
        name: ResourceName,
        class: AccessClass,
        attachment: Option<AttachmentOps>,
    ) -> Result<RawId, GraphError> {
        self.declare_access(name, ResourceKind::Texture, class, attachment)
    }

    fn buffer(&mut self, name: ResourceName, class: AccessClass) -> Result<RawId, GraphError> {
        self.declare_access(name, ResourceKind::Buffer, class, None)
    }

    fn declare_access(
        &mut self,
        name: ResourceName,
        kind: ResourceKind,
        class: AccessClass,
        attachment: Option<AttachmentOps>,
    ) -> Result<RawId, GraphError> {
        let pass = self.declaration.handle;
        let handle = self.registry.lookup(&name)?;
        let resource = self.registry.resource(handle)?;

        if resource.kind() != kind {
            return Err(GraphError::KindMismatch {
                name,
                expected: kind,
                actual: resource.kind(),
            });
        }
        if !class.is_supported_by(resource.descriptor()) {
            return Err(GraphError::IncompatibleAccess {
                pass: self.declaration.name.clone(),
                name,
                access: class,
            });
        }

        // Reads of the same resource merge; anything involving a write does not.
        let conflicting = self.declaration.accesses.iter().any(|existing| {
            existing.resource == handle
                && existing.mode != AccessMode::Create
                && (existing.mode == AccessMode::Write || class.is_write())
        });
        if conflicting {
            return Err(GraphError::ConflictingAccess {
                pass: self.declaration.name.clone(),
                name,
            });
        }

        let has_content = resource.version() > 0 || resource.is_imported();
        let (read_version, write_version, mode) = if class.is_write() {
            let preserves = class.preserves_contents(attachment.map(|ops| ops.load_op));
            let resource = self
                .registry
                .get_mut(handle)
                .ok_or(GraphError::InvalidResourceHandle(handle))?;
            let read_version = if preserves && has_content {
                Some(resource.record_read(pass))
            } else {
                None
            };
            (read_version, Some(resource.record_write(pass)), AccessMode::Write)
        } else {
            if !has_content {
                return Err(GraphError::ReadBeforeWrite {
                    pass: self.declaration.name.clone(),
                    name,
                });
            }
            let resource = self
                .registry
                .get_mut(handle)
                .ok_or(GraphError::InvalidResourceHandle(handle))?;
            (Some(resource.record_read(pass)), None, AccessMode::Read)
        };

        let slot = self.declaration.accesses.len() as u32;
        self.declaration.accesses.push(ResourceAccess {
            resource: handle,
            mode,
            class: Some(class),
            read_version,
            write_version,
            attachment,
        });

        Ok(RawId {
            pass,
            resource: handle,
            slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreOp;
    use crate::graph::PassFlags;
    use crate::graph::PassType;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn declaration(index: u32, name: &str) -> PassDeclaration {
        PassDeclaration::new(
            PassHandle::new(index),
            name.into(),
            PassType::Graphics,
            PassFlags::empty(),
        )
    }

    fn color() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            128,
            128,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    #[test]
    fn test_write_bumps_version_and_read_binds_latest() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "a"));
        builder.create_texture("Color", color()).unwrap();
        builder
            .write_render_target("Color", LoadOp::clear_color(0.0, 0.0, 0.0, 1.0))
            .unwrap();
        let first = builder.finish();
        assert_eq!(first.accesses()[1].write_version, Some(1));
        assert_eq!(first.accesses()[1].read_version, None);

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(1, "b"));
        let id = builder
            .read_texture("Color", ReadAccess::PixelShader)
            .unwrap();
        let second = builder.finish();
        assert_eq!(second.accesses()[0].read_version, Some(1));
        assert_eq!(id.pass(), PassHandle::new(1));
    }

    #[test]
    fn test_attachment_store_ops() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();
        let mut depth = color();
        depth.format = TextureFormat::Depth32Float;

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "shadow"));
        builder.create_texture("Color", color()).unwrap();
        builder.create_texture("Depth", depth).unwrap();
        builder
            .write_render_target("Color", LoadOp::DontCare)
            .unwrap();
        builder
            .write_depth_stencil_with("Depth", AttachmentOps::discard(LoadOp::clear_depth(1.0)))
            .unwrap();
        let declaration = builder.finish();

        let store_ops: Vec<_> = declaration
            .accesses()
            .iter()
            .filter_map(|access| access.attachment.map(|ops| ops.store_op))
            .collect();
        assert_eq!(store_ops, vec![StoreOp::Store, StoreOp::DontCare]);
    }

    #[test]
    fn test_read_before_write_rejected() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();
        registry.declare("Color".into(), color().into()).unwrap();

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "reader"));
        let err = builder
            .read_texture("Color", ReadAccess::PixelShader)
            .unwrap_err();
        assert!(matches!(err, GraphError::ReadBeforeWrite { .. }));
    }

    #[test]
    fn test_uav_without_storage_flag_rejected() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "cs"));
        builder.create_texture("Color", color()).unwrap();
        let err = builder.write_texture("Color").unwrap_err();
        assert_eq!(
            err,
            GraphError::IncompatibleAccess {
                pass: "cs".into(),
                name: "Color".into(),
                access: AccessClass::UnorderedAccess,
            }
        );
    }

    #[test]
    fn test_kind_mismatch() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "cs"));
        builder
            .create_buffer("Args", BufferDescriptor::new(16, BufferUsage::INDIRECT))
            .unwrap();
        let err = builder
            .read_texture("Args", ReadAccess::AllShaders)
            .unwrap_err();
        assert!(matches!(err, GraphError::KindMismatch { .. }));
    }

    #[test]
    fn test_double_write_in_one_pass_conflicts() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();
        let desc = color().with_usage(TextureUsage::STORAGE_BINDING);

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "cs"));
        builder.create_texture("Color", desc).unwrap();
        builder.write_texture("Color").unwrap();
        let err = builder
            .read_texture("Color", ReadAccess::NonPixelShader)
            .unwrap_err();
        assert!(matches!(err, GraphError::ConflictingAccess { .. }));
    }

    #[test]
    fn test_preserving_write_consumes_previous_version() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();
        let desc = color().with_usage(TextureUsage::STORAGE_BINDING);

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "a"));
        builder.create_texture("Color", desc).unwrap();
        builder.write_texture("Color").unwrap();
        builder.finish();

        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(1, "b"));
        builder.write_texture("Color").unwrap();
        let second = builder.finish();
        assert_eq!(second.accesses()[0].read_version, Some(1));
        assert_eq!(second.accesses()[0].write_version, Some(2));
    }

    #[test]
    fn test_unknown_resource() {
        let mut registry = ResourceRegistry::new();
        let blackboard = Blackboard::new();
        let mut builder = PassBuilder::new(&mut registry, &blackboard, declaration(0, "a"));
        assert!(matches!(
            builder.read_indirect_args("Nope"),
            Err(GraphError::UnknownResource { .. })
        ));
    }
}
