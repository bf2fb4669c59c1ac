//! Retry helper - 呼び出し側で使う再試行ループ
//!
//! enforcer と transport は自動で再試行しません。
//! 再試行したい呼び出し元が、アダプタの RetryPolicy を渡してこの関数を使います。

use std::future::Future;

use crate::domain::{RelayError, RetryPolicy};

/// Run `op`, retrying while it fails with a status the policy calls transient.
///
/// - 最大 `max_retries` 回まで再試行（初回を含めて max_retries + 1 回）
/// - 待ち時間は `jittered_delay(retry)`（指数バックオフ + jitter）
/// - permanent な status や status を持たないエラーは即座に返す
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let max_retries = u32::try_from(policy.max_retries).unwrap_or(0);
    let mut retries = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let transient = err.status().is_some_and(|s| policy.is_transient(s));
                if !transient || retries >= max_retries {
                    return Err(err);
                }
                retries += 1;
                let delay = policy.jittered_delay(retries);
                tracing::debug!(
                    retry = retries,
                    max_retries,
                    status = ?err.status(),
                    delay_ms = delay.as_millis() as u64,
                    "transient failure; retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
