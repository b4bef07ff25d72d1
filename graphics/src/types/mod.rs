//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the graphics system.

mod buffer;
mod common;
mod descriptor;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage, DispatchIndirectArgs, DrawIndirectArgs};
pub use common::{ClearValue, Extent3d, Viewport};
pub use descriptor::{ResourceDescriptor, ResourceKind};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
