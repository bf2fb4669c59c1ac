//! ExternalSystemAdapter trait

use crate::domain::{RetryPolicy, is_transient};

/// One upstream system reached through the batch API.
///
/// # 使用例
/// ```ignore
/// struct DirectoryAdapter {
///     policy: RetryPolicy,
/// }
///
/// impl ExternalSystemAdapter for DirectoryAdapter {
///     fn system_name(&self) -> &str {
///         "directory"
///     }
///
///     fn retry_policy(&self) -> Option<&RetryPolicy> {
///         Some(&self.policy)
///     }
/// }
/// ```
///
/// `retry_policy` が `None` のアダプタは `AdapterRegistry` に登録できません。
pub trait ExternalSystemAdapter: Send + Sync {
    fn system_name(&self) -> &str;

    fn retry_policy(&self) -> Option<&RetryPolicy>;

    /// Transient under this adapter's policy. No policy means nothing is.
    fn is_transient(&self, status: u16) -> bool {
        self.retry_policy()
            .is_some_and(|policy| is_transient(status, policy))
    }
}
