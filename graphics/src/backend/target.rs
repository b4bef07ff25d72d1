//! Render pass attachment configuration.

use crate::types::{ClearValue, Viewport};

use super::GpuTexture;

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }

    /// Whether the previous contents are read.
    pub fn preserves_contents(&self) -> bool {
        matches!(self, Self::Load)
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// A color attachment bound for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// The attached texture.
    pub texture: GpuTexture,
    /// Load operation.
    pub load_op: LoadOp,
    /// Store operation.
    pub store_op: StoreOp,
}

/// A depth/stencil attachment bound for a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilAttachment {
    /// The attached texture (must be a depth/stencil format).
    pub texture: GpuTexture,
    /// Load operation.
    pub load_op: LoadOp,
    /// Store operation.
    pub store_op: StoreOp,
    /// Whether depth/stencil is only tested, never written.
    pub read_only: bool,
}

/// Everything a device needs to begin a render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor {
    /// Color attachments in declaration order.
    pub color_attachments: Vec<ColorAttachment>,
    /// Optional depth/stencil attachment.
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
    /// Viewport covering the render area.
    pub viewport: Viewport,
}

impl RenderPassDescriptor {
    /// Check if the render pass has no attachments.
    pub fn is_empty(&self) -> bool {
        self.color_attachments.is_empty() && self.depth_stencil_attachment.is_none()
    }
}
