//! Logical resources and the per-frame resource registry.

use std::collections::HashMap;
use std::fmt;

use crate::backend::{BarrierTarget, GpuBuffer, GpuTexture};
use crate::barrier::ResourceState;
use crate::error::GraphError;
use crate::types::{BufferDescriptor, ResourceDescriptor, ResourceKind, TextureDescriptor};

use super::{AccessClass, PassHandle, ResourceHandle};

/// Stable name of a logical resource.
///
/// Per-instance variants of the same resource (one shadow map per light,
/// say) share a base name and differ by index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName {
    name: String,
    index: Option<u32>,
}

impl ResourceName {
    /// Create a plain name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// Create a name with an instance index.
    pub fn indexed(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }

    /// The base name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance index, if any.
    pub fn index(&self) -> Option<u32> {
        self.index
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.name, index),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<(&str, u32)> for ResourceName {
    fn from((name, index): (&str, u32)) -> Self {
        Self::indexed(name, index)
    }
}

/// A resource owned outside the graph that takes part in dependency tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedResource {
    descriptor: ResourceDescriptor,
    physical: BarrierTarget,
    initial_state: ResourceState,
    final_state: Option<ResourceState>,
}

impl ImportedResource {
    /// Wrap an external texture currently in `state`.
    pub fn texture(texture: GpuTexture, descriptor: TextureDescriptor, state: ResourceState) -> Self {
        Self {
            descriptor: descriptor.into(),
            physical: BarrierTarget::Texture(texture),
            initial_state: state,
            final_state: None,
        }
    }

    /// Wrap an external buffer currently in `state`.
    pub fn buffer(buffer: GpuBuffer, descriptor: BufferDescriptor, state: ResourceState) -> Self {
        Self {
            descriptor: descriptor.into(),
            physical: BarrierTarget::Buffer(buffer),
            initial_state: state,
            final_state: None,
        }
    }

    /// Transition the resource to `state` once the frame is done.
    pub fn with_final_state(mut self, state: ResourceState) -> Self {
        self.final_state = Some(state);
        self
    }

    /// The external physical resource.
    pub fn physical(&self) -> BarrierTarget {
        self.physical
    }

    /// The state recorded at import.
    pub fn initial_state(&self) -> ResourceState {
        self.initial_state
    }

    /// The state to restore at frame end, if any.
    pub fn final_state(&self) -> Option<ResourceState> {
        self.final_state
    }
}

/// Caller-owned storage that receives a resource's final content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportTarget {
    /// The destination resource.
    pub target: BarrierTarget,
    /// The destination's state before and after the copy.
    pub state: ResourceState,
}

/// A frame-scoped resource tracked by the graph.
#[derive(Debug, Clone)]
pub struct LogicalResource {
    name: ResourceName,
    descriptor: ResourceDescriptor,
    imported: Option<ImportedResource>,
    exports: Vec<ExportTarget>,
    version: u32,
    ref_count: u32,
    creator: Option<PassHandle>,
    writer: Option<PassHandle>,
    last_used_by: Option<PassHandle>,
    /// Producer of each version; index 0 is the initial (unwritten or imported) content.
    producers: Vec<Option<PassHandle>>,
}

impl LogicalResource {
    fn new(name: ResourceName, descriptor: ResourceDescriptor) -> Self {
        Self {
            name,
            descriptor,
            imported: None,
            exports: Vec::new(),
            version: 0,
            ref_count: 0,
            creator: None,
            writer: None,
            last_used_by: None,
            producers: vec![None],
        }
    }

    /// The resource name.
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Texture or buffer.
    pub fn kind(&self) -> ResourceKind {
        self.descriptor.kind()
    }

    /// The resource descriptor.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Returns true if the resource is backed by an external allocation.
    pub fn is_imported(&self) -> bool {
        self.imported.is_some()
    }

    /// Import information, if imported.
    pub fn imported(&self) -> Option<&ImportedResource> {
        self.imported.as_ref()
    }

    /// Returns true if the final content is copied out at frame end.
    pub fn is_exported(&self) -> bool {
        !self.exports.is_empty()
    }

    /// Export destinations.
    pub fn exports(&self) -> &[ExportTarget] {
        &self.exports
    }

    /// The current version. Zero until the first write.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of declared reads of the current version.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// The pass that declared the resource, if declared from a pass.
    pub fn creator(&self) -> Option<PassHandle> {
        self.creator
    }

    /// The pass that produced the current version.
    pub fn writer(&self) -> Option<PassHandle> {
        self.writer
    }

    /// The last pass that accessed the resource.
    pub fn last_used_by(&self) -> Option<PassHandle> {
        self.last_used_by
    }

    /// The pass that produced `version`.
    pub fn producer(&self, version: u32) -> Option<PassHandle> {
        self.producers.get(version as usize).copied().flatten()
    }

    pub(crate) fn record_read(&mut self, pass: PassHandle) -> u32 {
        self.ref_count += 1;
        self.last_used_by = Some(pass);
        self.version
    }

    pub(crate) fn record_write(&mut self, pass: PassHandle) -> u32 {
        self.version += 1;
        self.producers.push(Some(pass));
        self.ref_count = 0;
        self.writer = Some(pass);
        self.last_used_by = Some(pass);
        self.version
    }

    pub(crate) fn record_creator(&mut self, pass: PassHandle) {
        self.creator = Some(pass);
        self.last_used_by = Some(pass);
    }
}

/// Owns every logical resource declared for one frame.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<LogicalResource>,
    by_name: HashMap<ResourceName, ResourceHandle>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a transient resource.
    ///
    /// Re-declaring an imported name returns the imported handle as long as
    /// the kinds agree; any other collision is an error.
    pub fn declare(
        &mut self,
        name: ResourceName,
        descriptor: ResourceDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        if let Some(&handle) = self.by_name.get(&name) {
            let existing = &self.resources[handle.index()];
            if !existing.is_imported() {
                return Err(GraphError::DuplicateResource { name });
            }
            if existing.kind() != descriptor.kind() {
                return Err(GraphError::KindMismatch {
                    name,
                    expected: descriptor.kind(),
                    actual: existing.kind(),
                });
            }
            log::trace!("ResourceRegistry: `{name}` re-declared over its import");
            return Ok(handle);
        }

        Ok(self.insert(LogicalResource::new(name, descriptor)))
    }

    /// Register an externally owned resource.
    pub fn import(
        &mut self,
        name: ResourceName,
        imported: ImportedResource,
    ) -> Result<ResourceHandle, GraphError> {
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateResource { name });
        }

        let mut resource = LogicalResource::new(name, imported.descriptor.clone());
        resource.imported = Some(imported);
        Ok(self.insert(resource))
    }

    /// Schedule the final content of `name` to be copied into `target`.
    ///
    /// The source needs copy-source capability unless `target` is the very
    /// resource it was imported from.
    pub fn export(
        &mut self,
        name: &ResourceName,
        target: ExportTarget,
    ) -> Result<ResourceHandle, GraphError> {
        let handle = self.lookup(name)?;
        let resource = &mut self.resources[handle.index()];

        let target_kind = match target.target {
            BarrierTarget::Texture(_) => ResourceKind::Texture,
            BarrierTarget::Buffer(_) => ResourceKind::Buffer,
        };
        if resource.kind() != target_kind {
            return Err(GraphError::KindMismatch {
                name: name.clone(),
                expected: target_kind,
                actual: resource.kind(),
            });
        }

        let in_place = resource
            .imported
            .as_ref()
            .is_some_and(|imported| imported.physical == target.target);
        if !in_place && !AccessClass::CopySrc.is_supported_by(&resource.descriptor) {
            return Err(GraphError::IncompatibleAccess {
                pass: "<export>".into(),
                name: name.clone(),
                access: AccessClass::CopySrc,
            });
        }

        resource.exports.push(target);
        Ok(handle)
    }

    fn insert(&mut self, resource: LogicalResource) -> ResourceHandle {
        let handle = ResourceHandle::new(self.resources.len() as u32);
        self.by_name.insert(resource.name.clone(), handle);
        self.resources.push(resource);
        handle
    }

    /// Find a resource by name.
    pub fn lookup(&self, name: &ResourceName) -> Result<ResourceHandle, GraphError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownResource { name: name.clone() })
    }

    /// Get a resource by handle.
    pub fn get(&self, handle: ResourceHandle) -> Option<&LogicalResource> {
        self.resources.get(handle.index())
    }

    pub(crate) fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut LogicalResource> {
        self.resources.get_mut(handle.index())
    }

    /// Get a resource by handle, failing with [`GraphError::InvalidResourceHandle`].
    pub fn resource(&self, handle: ResourceHandle) -> Result<&LogicalResource, GraphError> {
        self.get(handle)
            .ok_or(GraphError::InvalidResourceHandle(handle))
    }

    /// Iterate over all resources with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &LogicalResource)> + '_ {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, resource)| (ResourceHandle::new(i as u32), resource))
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if no resource is declared.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
