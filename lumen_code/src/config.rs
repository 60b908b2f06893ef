//! Code cache configuration parameters.
//!
//! All sizes and thresholds are tunable. Defaults mirror a mid-sized
//! tiered-compilation workload.

/// Configuration for the executable-memory cache.
///
/// # Example
///
/// ```ignore
/// use lumen_code::CodeCacheConfig;
///
/// // Small cache for an embedded target
/// let config = CodeCacheConfig {
///     reserved_size: 16 * 1024 * 1024,
///     segmented: false,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CodeCacheConfig {
    /// Total virtual-memory budget for all code heaps, in bytes.
    ///
    /// The whole budget is reserved as one contiguous block at startup;
    /// only a working set is committed. Reservation failure is fatal.
    ///
    /// Default: 48MB
    pub reserved_size: usize,

    /// Bytes committed per heap at startup.
    ///
    /// Capped at the heap's reserved share. Heaps grow on demand in
    /// `expansion_size` steps up to their reservation.
    ///
    /// Default: 2MB
    pub initial_size: usize,

    /// Commit-growth step when a heap runs out of committed space.
    ///
    /// Rounded up to the page size.
    ///
    /// Default: 64KB
    pub expansion_size: usize,

    /// Free-space level below which a heap is considered full.
    ///
    /// Crossing this threshold triggers the one-time fullness report for
    /// the heap; allocation itself keeps working until the heap is
    /// genuinely exhausted.
    ///
    /// Default: 500KB
    pub min_free_space: usize,

    /// Allocation granule inside a heap, in bytes.
    ///
    /// Must be a power of two, at least 64. Every blob occupies a whole
    /// number of segments; the lock-free address index is one byte per
    /// segment.
    ///
    /// Default: 64
    pub segment_size: usize,

    /// Use three kind-dedicated heaps instead of a single one.
    ///
    /// Segmented mode separates non-method code (stubs, adapters) from
    /// profiled and non-profiled method code, each in its own sub-range
    /// of the reservation.
    ///
    /// Default: true
    pub segmented: bool,

    /// Reserved share of the non-method heap in segmented mode, in bytes.
    ///
    /// Must leave room for VM-internal stub code plus `min_free_space`.
    /// The remainder of `reserved_size` is split half/half between the
    /// profiled and non-profiled heaps.
    ///
    /// Default: 8MB
    pub non_method_size: usize,
}

impl Default for CodeCacheConfig {
    fn default() -> Self {
        Self {
            reserved_size: 48 * 1024 * 1024,
            initial_size: 2 * 1024 * 1024,
            expansion_size: 64 * 1024,
            min_free_space: 500 * 1024,
            segment_size: 64,
            segmented: true,
            non_method_size: 8 * 1024 * 1024,
        }
    }
}

impl CodeCacheConfig {
    /// Smallest configuration that still passes validation.
    ///
    /// Useful for tests that want to exercise exhaustion paths quickly.
    pub fn tiny() -> Self {
        Self {
            reserved_size: 1024 * 1024,
            initial_size: 64 * 1024,
            expansion_size: 64 * 1024,
            min_free_space: 0,
            segment_size: 64,
            segmented: false,
            non_method_size: 256 * 1024,
        }
    }

    /// Configuration for an interpreter-heavy workload: one small heap.
    pub fn unsegmented(reserved_size: usize) -> Self {
        Self {
            reserved_size,
            segmented: false,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.segment_size.is_power_of_two() || self.segment_size < 64 {
            return Err(ConfigError::InvalidSegmentSize);
        }
        if self.expansion_size == 0 {
            return Err(ConfigError::ZeroExpansion);
        }
        if self.reserved_size < self.segment_size * 16 {
            return Err(ConfigError::BudgetTooSmall);
        }
        if self.segmented {
            if self.non_method_size < self.min_free_space {
                return Err(ConfigError::NonMethodHeapTooSmall);
            }
            if self.non_method_size >= self.reserved_size {
                return Err(ConfigError::BudgetTooSmall);
            }
        }
        Ok(())
    }

    /// Reserved sizes of the individual heaps, low address first.
    ///
    /// Segmented mode yields (non-method, profiled, non-profiled); the
    /// method heaps split the remainder half/half. Unsegmented mode
    /// yields the whole budget for the single heap.
    pub(crate) fn heap_sizes(&self) -> Vec<(crate::heap::HeapKind, usize)> {
        use crate::heap::HeapKind;
        if !self.segmented {
            return vec![(HeapKind::All, self.reserved_size)];
        }
        let remaining = self.reserved_size - self.non_method_size;
        let profiled = remaining / 2;
        let non_profiled = remaining - profiled;
        vec![
            (HeapKind::NonMethod, self.non_method_size),
            (HeapKind::Profiled, profiled),
            (HeapKind::NonProfiled, non_profiled),
        ]
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Segment size must be a power of two, minimum 64.
    InvalidSegmentSize,
    /// Expansion increment must be non-zero.
    ZeroExpansion,
    /// Reserved budget cannot hold a minimal working set.
    BudgetTooSmall,
    /// Non-method heap cannot hold stub code plus the free margin.
    NonMethodHeapTooSmall,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidSegmentSize => {
                write!(f, "segment size must be a power of two, minimum 64")
            }
            ConfigError::ZeroExpansion => write!(f, "expansion increment must be non-zero"),
            ConfigError::BudgetTooSmall => {
                write!(f, "reserved code cache budget is too small")
            }
            ConfigError::NonMethodHeapTooSmall => {
                write!(f, "non-method heap cannot hold VM-internal code")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CodeCacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preset_configs_are_valid() {
        assert!(CodeCacheConfig::tiny().validate().is_ok());
        assert!(CodeCacheConfig::unsegmented(8 * 1024 * 1024).validate().is_ok());
    }

    #[test]
    fn test_invalid_segment_size() {
        let config = CodeCacheConfig {
            segment_size: 48,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSegmentSize));
    }

    #[test]
    fn test_zero_expansion_rejected() {
        let config = CodeCacheConfig {
            expansion_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroExpansion));
    }

    #[test]
    fn test_heap_split_covers_budget() {
        let config = CodeCacheConfig::default();
        let total: usize = config.heap_sizes().iter().map(|(_, s)| s).sum();
        assert_eq!(total, config.reserved_size);
    }
}
