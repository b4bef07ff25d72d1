//! Type-keyed per-frame data store.
//!
//! A [`Blackboard`] carries plain data between passes that have no direct
//! producer/consumer relationship through GPU resources: camera matrices,
//! global constant addresses, frame settings and so on.
//!
//! Each Rust type acts as its own key, so at most one value of a given type
//! can be stored at a time. Looking up a type that was never published is an
//! error rather than a silent default.
//!
//! # Example
//!
//! ```
//! use ember_core::blackboard::Blackboard;
//!
//! #[derive(Debug, PartialEq)]
//! struct CameraData {
//!     near: f32,
//!     far: f32,
//! }
//!
//! let mut board = Blackboard::new();
//! board.add(CameraData { near: 0.1, far: 100.0 }).unwrap();
//!
//! let camera = board.get::<CameraData>().unwrap();
//! assert_eq!(camera.far, 100.0);
//!
//! // Only one value per type
//! assert!(board.add(CameraData { near: 1.0, far: 2.0 }).is_err());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Errors returned by [`Blackboard`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlackboardError {
    /// No value of the requested type has been published this frame.
    #[error("blackboard has no value of type `{type_name}`")]
    Missing {
        /// Name of the requested type.
        type_name: &'static str,
    },

    /// A value of this type is already stored.
    #[error("blackboard already holds a value of type `{type_name}`")]
    AlreadyPresent {
        /// Name of the duplicated type.
        type_name: &'static str,
    },
}

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Per-frame store holding at most one value per type.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<TypeId, Entry>,
}

static_assertions::assert_impl_all!(Blackboard: Send, Sync);

impl Blackboard {
    /// Create an empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value.
    ///
    /// Fails with [`BlackboardError::AlreadyPresent`] if a value of type `T`
    /// is already stored; use [`replace`](Self::replace) to overwrite.
    pub fn add<T: Any + Send + Sync>(&mut self, value: T) -> Result<&mut T, BlackboardError> {
        let type_name = std::any::type_name::<T>();
        if self.entries.contains_key(&TypeId::of::<T>()) {
            return Err(BlackboardError::AlreadyPresent { type_name });
        }

        log::trace!("Blackboard: publishing {type_name}");
        let entry = self.entries.entry(TypeId::of::<T>()).or_insert(Entry {
            value: Box::new(value),
            type_name,
        });
        entry
            .value
            .downcast_mut::<T>()
            .ok_or(BlackboardError::Missing { type_name })
    }

    /// Store a value, returning the previous value of the same type if any.
    pub fn replace<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        let previous = self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                value: Box::new(value),
                type_name: std::any::type_name::<T>(),
            },
        )?;
        previous.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Look up the value of type `T`.
    pub fn get<T: Any>(&self) -> Result<&T, BlackboardError> {
        self.try_get::<T>().ok_or(BlackboardError::Missing {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Look up the value of type `T` mutably.
    pub fn get_mut<T: Any>(&mut self) -> Result<&mut T, BlackboardError> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_mut::<T>())
            .ok_or(BlackboardError::Missing {
                type_name: std::any::type_name::<T>(),
            })
    }

    /// Look up the value of type `T`, returning `None` if absent.
    pub fn try_get<T: Any>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Remove and return the value of type `T`.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        let entry = self.entries.remove(&TypeId::of::<T>())?;
        entry.value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// Check whether a value of type `T` is stored.
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the blackboard is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every stored value.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.entries.values().map(|entry| entry.type_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct FrameConstants {
        frame: u64,
    }

    #[derive(Debug, PartialEq)]
    struct Exposure(f32);

    #[test]
    fn test_add_and_get() {
        let mut board = Blackboard::new();
        board.add(FrameConstants { frame: 7 }).unwrap();
        board.add(Exposure(1.5)).unwrap();

        assert_eq!(board.get::<FrameConstants>().unwrap().frame, 7);
        assert_eq!(board.get::<Exposure>().unwrap(), &Exposure(1.5));
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn test_missing_value_is_error() {
        let board = Blackboard::new();
        let err = board.get::<Exposure>().unwrap_err();
        assert!(matches!(err, BlackboardError::Missing { .. }));
        assert!(err.to_string().contains("Exposure"));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut board = Blackboard::new();
        board.add(Exposure(1.0)).unwrap();
        let err = board.add(Exposure(2.0)).unwrap_err();
        assert!(matches!(err, BlackboardError::AlreadyPresent { .. }));
        assert_eq!(board.get::<Exposure>().unwrap(), &Exposure(1.0));
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut board = Blackboard::new();
        assert_eq!(board.replace(Exposure(1.0)), None);
        assert_eq!(board.replace(Exposure(2.0)), Some(Exposure(1.0)));
        assert_eq!(board.get::<Exposure>().unwrap(), &Exposure(2.0));
    }

    #[test]
    fn test_get_mut_and_remove() {
        let mut board = Blackboard::new();
        board.add(FrameConstants { frame: 1 }).unwrap();
        board.get_mut::<FrameConstants>().unwrap().frame = 2;
        assert_eq!(
            board.remove::<FrameConstants>(),
            Some(FrameConstants { frame: 2 })
        );
        assert!(!board.contains::<FrameConstants>());
        assert!(board.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut board = Blackboard::new();
        board.add(Exposure(1.0)).unwrap();
        board.add(FrameConstants { frame: 3 }).unwrap();
        board.clear();
        assert!(board.try_get::<Exposure>().is_none());
        assert!(board.is_empty());
    }
}
