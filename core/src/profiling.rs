//! Profiling support via Tracy.
//!
//! Instrumentation is enabled with the `profiling` Cargo feature. Without it,
//! every macro in this module expands to nothing.
//!
//! ```toml
//! [dependencies]
//! ember-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ember_core::{frame_mark, profile_function, profile_scope};
//!
//! fn build_frame() {
//!     profile_function!();
//!
//!     {
//!         profile_scope!("cull_passes");
//!         // ...
//!     }
//!
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, frame_mark as tracy_frame_mark, plot as tracy_plot, span};

/// Mark the end of a frame for Tracy's frame analysis.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span that ends with the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span covering the whole function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a value over time in Tracy.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        let _ = $value;
    };
}

/// Returns true if profiling support is compiled in.
pub const fn is_enabled() -> bool {
    cfg!(feature = "profiling")
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand() {
        profile_function!();
        profile_scope!("test_scope");
        profile_plot!("test_plot", 1u32);
        frame_mark!();
        assert_eq!(super::is_enabled(), cfg!(feature = "profiling"));
    }
}
