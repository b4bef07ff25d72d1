//! Frame graph configuration.

/// Per-graph scheduling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGraphConfig {
    /// Remove passes whose outputs nobody reads.
    pub culling: bool,
    /// Also remove passes that declare no writes at all.
    ///
    /// Such passes usually exist for their side effects (debug output,
    /// readbacks), so they are kept unless this is set.
    pub cull_side_effect_passes: bool,
    /// Release transients right after their last use so later resources can
    /// reuse the allocation. When off, transients stay acquired until the
    /// frame ends.
    pub aliasing: bool,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            culling: true,
            cull_side_effect_passes: false,
            aliasing: true,
        }
    }
}

impl FrameGraphConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable culling.
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.culling = enabled;
        self
    }

    /// Enable or disable culling of passes without writes.
    pub fn with_side_effect_culling(mut self, enabled: bool) -> Self {
        self.cull_side_effect_passes = enabled;
        self
    }

    /// Enable or disable memory aliasing of transients.
    pub fn with_aliasing(mut self, enabled: bool) -> Self {
        self.aliasing = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrameGraphConfig::default();
        assert!(config.culling);
        assert!(!config.cull_side_effect_passes);
        assert!(config.aliasing);
    }

    #[test]
    fn test_builder_methods() {
        let config = FrameGraphConfig::new()
            .with_culling(false)
            .with_side_effect_culling(true)
            .with_aliasing(false);
        assert!(!config.culling);
        assert!(config.cull_side_effect_passes);
        assert!(!config.aliasing);
    }
}
