//! FeatureFlags の実装
//!
//! - NoopFeatureFlags: 常に false（本物が配線されるまでの安全なデフォルト）
//! - StaticFeatureFlags: 実行時に on/off を切り替えられるメモリ上のフラグ

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::ports::FeatureFlags;

/// Every flag is off. With this in place the enforcer passes requests
/// straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFeatureFlags;

impl FeatureFlags for NoopFeatureFlags {
    fn is_enabled(&self, _key: &str) -> bool {
        false
    }
}

/// In-memory flag set that can be toggled while the enforcer is running.
#[derive(Debug, Default)]
pub struct StaticFeatureFlags {
    enabled: RwLock<HashSet<String>>,
}

impl StaticFeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(keys: &[&str]) -> Self {
        Self {
            enabled: RwLock::new(keys.iter().map(|k| k.to_string()).collect()),
        }
    }

    pub fn set(&self, key: &str, on: bool) {
        let mut enabled = self.enabled.write().unwrap_or_else(PoisonError::into_inner);
        if on {
            enabled.insert(key.to_string());
        } else {
            enabled.remove(key);
        }
    }
}

impl FeatureFlags for StaticFeatureFlags {
    fn is_enabled(&self, key: &str) -> bool {
        self.enabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::COALESCING_FLAG;

    #[test]
    fn noop_is_always_off() {
        assert!(!NoopFeatureFlags.is_enabled(COALESCING_FLAG));
    }

    #[test]
    fn static_flags_toggle() {
        let flags = StaticFeatureFlags::new();
        assert!(!flags.is_enabled(COALESCING_FLAG));

        flags.set(COALESCING_FLAG, true);
        assert!(flags.is_enabled(COALESCING_FLAG));

        flags.set(COALESCING_FLAG, false);
        assert!(!flags.is_enabled(COALESCING_FLAG));
    }

    #[test]
    fn with_enabled_seeds_keys() {
        let flags = StaticFeatureFlags::with_enabled(&[COALESCING_FLAG]);
        assert!(flags.is_enabled(COALESCING_FLAG));
        assert!(!flags.is_enabled("something_else"));
    }
}
