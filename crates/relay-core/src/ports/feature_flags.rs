//! FeatureFlags port - 実行時に切り替え可能なフラグ
//!
//! Enforcer は毎回 `is_enabled` を読み直します（キャッシュしない）。

/// Flag key that turns request coalescing on.
pub const COALESCING_FLAG: &str = "batch_coalescing";

pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, key: &str) -> bool;
}
