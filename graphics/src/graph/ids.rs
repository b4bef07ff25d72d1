//! Typed resource ids handed out by the pass builder.
//!
//! An id names one declared access of one pass. It can only be redeemed
//! through the [`PassContext`](super::PassContext) of that same pass; the
//! context checks the owner and returns [`GraphError::ForeignId`] otherwise.
//! Texture ids and buffer ids are distinct types, so mixing them up is a
//! compile error.
//!
//! [`GraphError::ForeignId`]: crate::GraphError::ForeignId

use super::{PassHandle, ResourceHandle};

/// The untyped contents of every id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawId {
    pub(crate) pass: PassHandle,
    pub(crate) resource: ResourceHandle,
    pub(crate) slot: u32,
}

impl RawId {
    /// The pass that obtained the id.
    pub fn pass(&self) -> PassHandle {
        self.pass
    }

    /// The logical resource the id refers to.
    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }
}

/// Implemented by every id that resolves to a texture.
pub trait TextureAccessId: Copy {
    /// The untyped id.
    fn raw(&self) -> RawId;
}

/// Implemented by every id that resolves to a buffer.
pub trait BufferAccessId: Copy {
    /// The untyped id.
    fn raw(&self) -> RawId;
}

macro_rules! define_ids {
    ($access_trait:ident: $($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(RawId);

            impl $name {
                pub(crate) fn new(raw: RawId) -> Self {
                    Self(raw)
                }

                /// The pass that obtained this id.
                pub fn pass(&self) -> PassHandle {
                    self.0.pass
                }

                /// The logical resource this id refers to.
                pub fn resource(&self) -> ResourceHandle {
                    self.0.resource
                }
            }

            impl $access_trait for $name {
                fn raw(&self) -> RawId {
                    self.0
                }
            }
        )*
    };
}

define_ids!(TextureAccessId:
    /// Shader-readable texture view.
    TextureReadId,
    /// Unordered-access (read/write) texture view.
    TextureReadWriteId,
    /// Color attachment.
    RenderTargetId,
    /// Depth/stencil attachment, writable or read-only.
    DepthStencilId,
    /// Texture used as copy source.
    TextureCopySrcId,
    /// Texture used as copy destination.
    TextureCopyDstId,
);

define_ids!(BufferAccessId:
    /// Shader-readable buffer view.
    BufferReadId,
    /// Unordered-access (read/write) buffer view.
    BufferReadWriteId,
    /// Buffer used as copy source.
    BufferCopySrcId,
    /// Buffer used as copy destination.
    BufferCopyDstId,
    /// Buffer holding indirect draw or dispatch arguments.
    IndirectArgsId,
);
