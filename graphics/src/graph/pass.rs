//! Pass declarations and execution.
//!
//! A pass lives in two phases:
//!
//! 1. **Declaration**: the setup function runs once at registration against a
//!    [`PassBuilder`](super::PassBuilder). What it declares is frozen into a
//!    [`PassDeclaration`] and never changes afterwards.
//! 2. **Execution**: the setup function returns a [`PassExecution`] value,
//!    typically a small struct holding the ids it obtained. The executor
//!    invokes it later with a [`PassContext`] that resolves those ids.

use bitflags::bitflags;

use crate::error::GraphicsError;
use crate::types::Viewport;

use super::{AccessClass, AccessMode, PassContext, PassHandle, ResourceAccess, ResourceHandle};

/// The kind of GPU work a pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    /// Rasterization work. Gets an automatic render pass over its attachments.
    Graphics,
    /// Compute dispatches, including ray dispatches.
    Compute,
    /// Copies and uploads.
    Copy,
}

impl PassType {
    /// Check if this is a graphics pass.
    pub fn is_graphics(self) -> bool {
        matches!(self, Self::Graphics)
    }

    /// Check if this is a compute pass.
    pub fn is_compute(self) -> bool {
        matches!(self, Self::Compute)
    }

    /// Check if this is a copy pass.
    pub fn is_copy(self) -> bool {
        matches!(self, Self::Copy)
    }
}

bitflags! {
    /// Per-pass scheduling flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PassFlags: u32 {
        /// Keep the pass even if nothing reads its outputs.
        const FORCE_NO_CULL = 1 << 0;
        /// Do not emit barriers for this pass. The pass is trusted to leave
        /// its resources in the declared states.
        const SKIP_AUTO_BARRIERS = 1 << 1;
        /// Do not begin a render pass or set a viewport automatically.
        const SKIP_AUTO_RENDER_PASS = 1 << 2;
    }
}

/// Everything a pass declared during setup.
#[derive(Debug, Clone)]
pub struct PassDeclaration {
    pub(crate) handle: PassHandle,
    pub(crate) name: String,
    pub(crate) pass_type: PassType,
    pub(crate) flags: PassFlags,
    pub(crate) accesses: Vec<ResourceAccess>,
    pub(crate) viewport: Option<Viewport>,
}

impl PassDeclaration {
    pub(crate) fn new(
        handle: PassHandle,
        name: String,
        pass_type: PassType,
        flags: PassFlags,
    ) -> Self {
        Self {
            handle,
            name,
            pass_type,
            flags,
            accesses: Vec::new(),
            viewport: None,
        }
    }

    /// The pass handle.
    pub fn handle(&self) -> PassHandle {
        self.handle
    }

    /// The pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pass type.
    pub fn pass_type(&self) -> PassType {
        self.pass_type
    }

    /// The pass flags.
    pub fn flags(&self) -> PassFlags {
        self.flags
    }

    /// All declared accesses in declaration order.
    pub fn accesses(&self) -> &[ResourceAccess] {
        &self.accesses
    }

    /// Viewport override, if set.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Accesses that read a version.
    pub fn reads(&self) -> impl Iterator<Item = &ResourceAccess> + '_ {
        self.accesses.iter().filter(|a| a.read_version.is_some())
    }

    /// Accesses that produce a version.
    pub fn writes(&self) -> impl Iterator<Item = &ResourceAccess> + '_ {
        self.accesses.iter().filter(|a| a.mode == AccessMode::Write)
    }

    /// Resources this pass created.
    pub fn creates(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.accesses
            .iter()
            .filter(|a| a.mode == AccessMode::Create)
            .map(|a| a.resource)
    }

    /// Returns true if the pass produces no versions (pure side effects).
    pub fn has_no_outputs(&self) -> bool {
        self.writes().next().is_none()
    }

    /// Returns true if the pass binds render pass attachments.
    pub fn has_attachments(&self) -> bool {
        self.accesses
            .iter()
            .any(|a| a.class.is_some_and(AccessClass::is_attachment))
    }
}

/// The execution half of a pass.
///
/// Implemented by whatever the setup function returns. Errors abort the
/// frame and are reported as [`GraphicsError::Pass`].
pub trait PassExecution {
    /// Record the pass's commands.
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), GraphicsError>;
}

/// A [`PassExecution`] backed by a closure. Build one with [`pass_fn`].
pub struct PassFn<F>(F);

/// Wrap a closure as a [`PassExecution`].
///
/// ```ignore
/// graph.add_graphics_pass("tonemap", |builder| {
///     let hdr = builder.read_texture("HDR", ReadAccess::PixelShader)?;
///     let ldr = builder.write_render_target("LDR", LoadOp::DontCare)?;
///     Ok(pass_fn(move |ctx| {
///         ctx.bind_pipeline(&pipelines, "tonemap")?;
///         ctx.draw(3, 1);
///         Ok(())
///     }))
/// })?;
/// ```
pub fn pass_fn<F>(f: F) -> PassFn<F>
where
    F: FnMut(&mut PassContext<'_>) -> Result<(), GraphicsError>,
{
    PassFn(f)
}

impl<F> PassExecution for PassFn<F>
where
    F: FnMut(&mut PassContext<'_>) -> Result<(), GraphicsError>,
{
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), GraphicsError> {
        (self.0)(ctx)
    }
}

/// A pass that records nothing itself.
///
/// Useful for passes whose whole effect is the automatic render pass
/// (clears through load operations) or the barriers emitted before them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExecution;

impl PassExecution for NoExecution {
    fn execute(&mut self, _ctx: &mut PassContext<'_>) -> Result<(), GraphicsError> {
        Ok(())
    }
}

/// A registered pass: frozen declaration plus its execution.
pub(crate) struct PassNode<'a> {
    pub(crate) declaration: PassDeclaration,
    pub(crate) execution: Box<dyn PassExecution + 'a>,
}

impl std::fmt::Debug for PassNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassNode")
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_type_queries() {
        assert!(PassType::Graphics.is_graphics());
        assert!(PassType::Compute.is_compute());
        assert!(PassType::Copy.is_copy());
        assert!(!PassType::Copy.is_graphics());
    }

    #[test]
    fn test_flags_default_empty() {
        let flags = PassFlags::default();
        assert!(!flags.contains(PassFlags::FORCE_NO_CULL));
        let flags = PassFlags::FORCE_NO_CULL | PassFlags::SKIP_AUTO_BARRIERS;
        assert!(flags.contains(PassFlags::SKIP_AUTO_BARRIERS));
    }

    #[test]
    fn test_empty_declaration_has_no_outputs() {
        let decl = PassDeclaration::new(
            PassHandle::new(0),
            "debug_draw".into(),
            PassType::Graphics,
            PassFlags::empty(),
        );
        assert!(decl.has_no_outputs());
        assert!(!decl.has_attachments());
        assert_eq!(decl.creates().count(), 0);
    }
}
