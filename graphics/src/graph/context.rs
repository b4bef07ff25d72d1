//! The execution-time view of a pass.

use ember_core::Blackboard;

use crate::backend::{BarrierTarget, GpuBuffer, GpuPipeline, GpuTexture, RenderDevice};
use crate::error::{GraphError, GraphicsError};
use crate::pipeline::PipelineCache;
use crate::pool::PhysicalId;
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor};

use super::ids::*;
use super::{PassDeclaration, PassType, ResourceRegistry};

/// The physical resource backing a logical resource during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Binding {
    pub(crate) target: BarrierTarget,
    /// Pool entry, or `None` for imported resources.
    pub(crate) pooled: Option<PhysicalId>,
}

/// Handed to [`PassExecution::execute`](super::PassExecution::execute).
///
/// Resolves the ids the pass obtained during setup into device handles and
/// records commands on the device. Ids from other passes are rejected with
/// [`GraphError::ForeignId`].
pub struct PassContext<'f> {
    declaration: &'f PassDeclaration,
    registry: &'f ResourceRegistry,
    bindings: &'f [Option<Binding>],
    blackboard: &'f Blackboard,
    device: &'f mut dyn RenderDevice,
}

impl<'f> PassContext<'f> {
    pub(crate) fn new(
        declaration: &'f PassDeclaration,
        registry: &'f ResourceRegistry,
        bindings: &'f [Option<Binding>],
        blackboard: &'f Blackboard,
        device: &'f mut dyn RenderDevice,
    ) -> Self {
        Self {
            declaration,
            registry,
            bindings,
            blackboard,
            device,
        }
    }

    /// The executing pass's name.
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    /// The executing pass's type.
    pub fn pass_type(&self) -> PassType {
        self.declaration.pass_type
    }

    /// Everything the pass declared.
    pub fn declaration(&self) -> &PassDeclaration {
        self.declaration
    }

    /// The frame's blackboard.
    pub fn blackboard(&self) -> &Blackboard {
        self.blackboard
    }

    /// Direct device access for commands without a helper.
    pub fn device(&mut self) -> &mut dyn RenderDevice {
        &mut *self.device
    }

    fn resolve(&self, raw: RawId) -> Result<BarrierTarget, GraphError> {
        if raw.pass != self.declaration.handle {
            return Err(GraphError::ForeignId {
                pass: self.declaration.name.clone(),
                owner: raw.pass,
            });
        }

        let declared = self
            .declaration
            .accesses
            .get(raw.slot as usize)
            .is_some_and(|access| access.resource == raw.resource);
        if !declared {
            return Err(GraphError::InvalidResourceHandle(raw.resource));
        }

        self.bindings
            .get(raw.resource.index())
            .copied()
            .flatten()
            .map(|binding| binding.target)
            .ok_or(GraphError::InvalidResourceHandle(raw.resource))
    }

    /// Resolve a texture id.
    pub fn texture<I: TextureAccessId>(&self, id: I) -> Result<GpuTexture, GraphError> {
        let raw = id.raw();
        match self.resolve(raw)? {
            BarrierTarget::Texture(texture) => Ok(texture),
            BarrierTarget::Buffer(_) => Err(GraphError::InvalidResourceHandle(raw.resource)),
        }
    }

    /// Resolve a buffer id.
    pub fn buffer<I: BufferAccessId>(&self, id: I) -> Result<GpuBuffer, GraphError> {
        let raw = id.raw();
        match self.resolve(raw)? {
            BarrierTarget::Buffer(buffer) => Ok(buffer),
            BarrierTarget::Texture(_) => Err(GraphError::InvalidResourceHandle(raw.resource)),
        }
    }

    /// The logical descriptor behind a texture id.
    pub fn texture_descriptor<I: TextureAccessId>(
        &self,
        id: I,
    ) -> Result<&TextureDescriptor, GraphError> {
        let raw = id.raw();
        self.resolve(raw)?;
        self.registry
            .resource(raw.resource)?
            .descriptor()
            .as_texture()
            .ok_or(GraphError::InvalidResourceHandle(raw.resource))
    }

    /// The logical descriptor behind a buffer id.
    pub fn buffer_descriptor<I: BufferAccessId>(
        &self,
        id: I,
    ) -> Result<&BufferDescriptor, GraphError> {
        let raw = id.raw();
        self.resolve(raw)?;
        self.registry
            .resource(raw.resource)?
            .descriptor()
            .as_buffer()
            .ok_or(GraphError::InvalidResourceHandle(raw.resource))
    }

    // ------------------------------------------------------------------
    // Command helpers
    // ------------------------------------------------------------------

    /// Clear a texture the pass writes.
    pub fn clear_texture<I: TextureAccessId>(
        &mut self,
        id: I,
        value: ClearValue,
    ) -> Result<(), GraphError> {
        let texture = self.texture(id)?;
        self.device.clear_texture(texture, value);
        Ok(())
    }

    /// Copy a whole texture.
    pub fn copy_texture(
        &mut self,
        src: TextureCopySrcId,
        dst: TextureCopyDstId,
    ) -> Result<(), GraphError> {
        let (src, dst) = (self.texture(src)?, self.texture(dst)?);
        self.device.copy_texture(src, dst);
        Ok(())
    }

    /// Copy as many bytes as both buffers hold.
    pub fn copy_buffer(
        &mut self,
        src: BufferCopySrcId,
        dst: BufferCopyDstId,
    ) -> Result<(), GraphError> {
        let size = self
            .buffer_descriptor(src)?
            .size
            .min(self.buffer_descriptor(dst)?.size);
        let (src, dst) = (self.buffer(src)?, self.buffer(dst)?);
        self.device.copy_buffer(src, dst, size);
        Ok(())
    }

    /// Upload bytes into a buffer declared as copy destination.
    ///
    /// Fails with [`GraphError::BufferOutOfBounds`] unless the whole range
    /// lies inside the buffer.
    pub fn write_buffer(
        &mut self,
        dst: BufferCopyDstId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphError> {
        let size = self.buffer_descriptor(dst)?.size;
        let len = data.len() as u64;
        if !offset.checked_add(len).is_some_and(|end| end <= size) {
            return Err(GraphError::BufferOutOfBounds {
                pass: self.declaration.name.clone(),
                name: self.registry.resource(dst.resource())?.name().clone(),
                offset,
                len,
                size,
            });
        }
        let buffer = self.buffer(dst)?;
        self.device.write_buffer(buffer, offset, data);
        Ok(())
    }

    /// Look up (compiling on first use) and bind a named pipeline.
    pub fn bind_pipeline(
        &mut self,
        pipelines: &PipelineCache,
        name: &str,
    ) -> Result<GpuPipeline, GraphicsError> {
        let pipeline = pipelines.get_or_create(name, &mut *self.device)?;
        self.device.bind_pipeline(pipeline);
        Ok(pipeline)
    }

    /// Issue a non-indexed draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.device.draw(vertex_count, instance_count);
    }

    /// Issue a draw with arguments read from `args`.
    pub fn draw_indirect(&mut self, args: IndirectArgsId, offset: u64) -> Result<(), GraphError> {
        let buffer = self.buffer(args)?;
        self.device.draw_indirect(buffer, offset);
        Ok(())
    }

    /// Dispatch compute workgroups.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.device.dispatch(x, y, z);
    }

    /// Dispatch compute workgroups with arguments read from `args`.
    pub fn dispatch_indirect(
        &mut self,
        args: IndirectArgsId,
        offset: u64,
    ) -> Result<(), GraphError> {
        let buffer = self.buffer(args)?;
        self.device.dispatch_indirect(buffer, offset);
        Ok(())
    }

    /// Launch rays with the bound ray-tracing pipeline.
    pub fn dispatch_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.device.dispatch_rays(width, height, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;
    use crate::graph::{
        AccessClass, AccessMode, PassFlags, PassHandle, ReadAccess, ResourceAccess,
        ResourceHandle,
    };
    use crate::types::{TextureFormat, TextureUsage};

    fn setup() -> (PassDeclaration, ResourceRegistry, Vec<Option<Binding>>) {
        let mut registry = ResourceRegistry::new();
        let handle = registry
            .declare(
                "Color".into(),
                TextureDescriptor::new_2d(
                    16,
                    16,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::TEXTURE_BINDING,
                )
                .into(),
            )
            .unwrap();
        let mut declaration = PassDeclaration::new(
            PassHandle::new(1),
            "reader".into(),
            PassType::Graphics,
            PassFlags::empty(),
        );
        declaration.accesses.push(ResourceAccess {
            resource: handle,
            mode: AccessMode::Read,
            class: Some(AccessClass::ShaderRead(ReadAccess::PixelShader)),
            read_version: Some(1),
            write_version: None,
            attachment: None,
        });
        let bindings = vec![Some(Binding {
            target: BarrierTarget::Texture(GpuTexture::from_raw(42)),
            pooled: None,
        })];
        (declaration, registry, bindings)
    }

    #[test]
    fn test_resolves_own_id() {
        let (declaration, registry, bindings) = setup();
        let blackboard = Blackboard::new();
        let mut device = DummyDevice::new();
        let ctx = PassContext::new(&declaration, &registry, &bindings, &blackboard, &mut device);

        let id = TextureReadId::new(RawId {
            pass: PassHandle::new(1),
            resource: ResourceHandle::new(0),
            slot: 0,
        });
        assert_eq!(ctx.texture(id).unwrap(), GpuTexture::from_raw(42));
        assert_eq!(ctx.texture_descriptor(id).unwrap().size.width, 16);
    }

    #[test]
    fn test_rejects_foreign_id() {
        let (declaration, registry, bindings) = setup();
        let blackboard = Blackboard::new();
        let mut device = DummyDevice::new();
        let ctx = PassContext::new(&declaration, &registry, &bindings, &blackboard, &mut device);

        let foreign = TextureReadId::new(RawId {
            pass: PassHandle::new(0),
            resource: ResourceHandle::new(0),
            slot: 0,
        });
        assert_eq!(
            ctx.texture(foreign),
            Err(GraphError::ForeignId {
                pass: "reader".into(),
                owner: PassHandle::new(0),
            })
        );
    }

    #[test]
    fn test_rejects_undeclared_slot() {
        let (declaration, registry, bindings) = setup();
        let blackboard = Blackboard::new();
        let mut device = DummyDevice::new();
        let ctx = PassContext::new(&declaration, &registry, &bindings, &blackboard, &mut device);

        let bogus = TextureReadId::new(RawId {
            pass: PassHandle::new(1),
            resource: ResourceHandle::new(0),
            slot: 7,
        });
        assert!(matches!(
            ctx.texture(bogus),
            Err(GraphError::InvalidResourceHandle(_))
        ));
    }
}
