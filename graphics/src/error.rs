//! Graphics error types.
//!
//! Two layers:
//!
//! - [`GraphError`] covers frame graph misuse: declaration errors raised by
//!   the pass builder, lifecycle errors from the graph state machine and the
//!   invariant checks run by `build()`. These are programmer errors.
//! - [`GraphicsError`] covers everything that can fail while realizing a
//!   frame on a device: allocation, pool exhaustion, device loss, plus
//!   wrapped graph and blackboard errors.

use ember_core::BlackboardError;

use crate::graph::{AccessClass, GraphState, PassHandle, ResourceHandle, ResourceName};
use crate::types::ResourceKind;

/// Errors raised while declaring, building or resolving a frame graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A pass referenced a resource name that was never declared or imported.
    #[error("unknown resource `{name}`")]
    UnknownResource {
        /// The missing name.
        name: ResourceName,
    },

    /// A resource name was declared twice in the same frame.
    #[error("resource `{name}` is already declared this frame")]
    DuplicateResource {
        /// The duplicated name.
        name: ResourceName,
    },

    /// A texture was used as a buffer or vice versa.
    #[error("resource `{name}` is a {actual}, expected a {expected}")]
    KindMismatch {
        /// The resource name.
        name: ResourceName,
        /// The kind the call required.
        expected: ResourceKind,
        /// The kind the resource was declared with.
        actual: ResourceKind,
    },

    /// A non-imported resource was read before any pass wrote it.
    #[error("pass `{pass}` reads `{name}` before any pass writes it")]
    ReadBeforeWrite {
        /// The reading pass.
        pass: String,
        /// The resource name.
        name: ResourceName,
    },

    /// The access class requires a capability missing from the descriptor.
    #[error("pass `{pass}` cannot access `{name}` as {access:?}: descriptor lacks the required usage")]
    IncompatibleAccess {
        /// The accessing pass.
        pass: String,
        /// The resource name.
        name: ResourceName,
        /// The requested access class.
        access: AccessClass,
    },

    /// A pass accessed the same resource twice in a way that cannot be merged.
    #[error("pass `{pass}` accesses `{name}` more than once with a write")]
    ConflictingAccess {
        /// The accessing pass.
        pass: String,
        /// The resource name.
        name: ResourceName,
    },

    /// A resource id obtained by one pass was redeemed in another.
    #[error("pass `{pass}` used a resource id that belongs to pass {owner:?}")]
    ForeignId {
        /// The pass that tried to redeem the id.
        pass: String,
        /// The pass that obtained the id.
        owner: PassHandle,
    },

    /// A buffer upload does not fit inside the buffer.
    #[error("pass `{pass}` writes {len} bytes at offset {offset} into `{name}` of {size} bytes")]
    BufferOutOfBounds {
        /// The writing pass.
        pass: String,
        /// The resource name.
        name: ResourceName,
        /// Byte offset of the write.
        offset: u64,
        /// Number of bytes written.
        len: u64,
        /// Size of the buffer.
        size: u64,
    },

    /// An operation was called in the wrong graph state.
    #[error("`{operation}` is not allowed while the graph is {state:?}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the graph was in.
        state: GraphState,
    },

    /// A reader was registered before the producer of the version it binds.
    #[error("pass `{reader}` reads version {version} of `{name}` before its producer `{writer}`")]
    VersionOrder {
        /// The resource name.
        name: ResourceName,
        /// The version read.
        version: u32,
        /// The producing pass.
        writer: String,
        /// The reading pass.
        reader: String,
    },

    /// The pass dependency graph contains a cycle.
    #[error("frame graph contains a cyclic dependency")]
    CyclicDependency,

    /// A pass handle does not belong to this graph.
    #[error("invalid pass handle: {0:?}")]
    InvalidPassHandle(PassHandle),

    /// A resource handle does not belong to this graph, or has no physical
    /// backing at the point it was resolved.
    #[error("invalid resource handle: {0:?}")]
    InvalidResourceHandle(ResourceHandle),
}

/// Errors that can occur while realizing a frame on a device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// The device ran out of memory.
    #[error("out of GPU memory")]
    OutOfMemory,

    /// The resource pool hit its configured entry limit.
    #[error("resource pool exhausted ({limit} entries)")]
    PoolExhausted {
        /// The configured limit.
        limit: usize,
    },

    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,

    /// Command submission failed.
    #[error("command submission failed: {0}")]
    SubmissionFailed(String),

    /// No pipeline was registered under this name.
    #[error("unknown pipeline `{0}`")]
    UnknownPipeline(String),

    /// A different pipeline descriptor is already registered under this name.
    #[error("pipeline `{0}` is already registered with a different descriptor")]
    DuplicatePipeline(String),

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Frame graph misuse.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Blackboard lookup failure.
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),

    /// A pass's execution returned an error.
    #[error("pass `{pass}` failed: {source}")]
    Pass {
        /// The failing pass.
        pass: String,
        /// The underlying error.
        #[source]
        source: Box<GraphicsError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphError::UnknownResource {
            name: ResourceName::indexed("Shadow", 2),
        };
        assert_eq!(err.to_string(), "unknown resource `Shadow[2]`");
    }

    #[test]
    fn test_graph_error_converts() {
        let err: GraphicsError = GraphError::CyclicDependency.into();
        assert_eq!(err.to_string(), "frame graph contains a cyclic dependency");
    }

    #[test]
    fn test_pass_error_keeps_source() {
        use std::error::Error;

        let err = GraphicsError::Pass {
            pass: "tonemap".into(),
            source: Box::new(GraphicsError::DeviceLost),
        };
        assert_eq!(err.to_string(), "pass `tonemap` failed: GPU device lost");
        assert!(err.source().is_some());
    }
}
