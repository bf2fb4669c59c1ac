//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **BatchTransport**: 論理リクエストを 20 件ずつの wire 呼び出しに分割して送信
//! - **CoalescingEnforcer**: 同時に届いたリクエストをまとめて transport に渡す
//! - **call_with_retry**: アダプタの RetryPolicy に従う再試行ループ
//! - **RelayBuilder**: ワイヤリングと起動時検証

pub mod config;
pub mod transport;
pub mod enforcer;
pub mod retry;
pub mod status;
pub mod builder;

// 主要な型を再エクスポート
pub use self::config::{ConfigError, EnforcerConfig, RelayConfig};
pub use self::transport::{BatchTransport, CHUNK_FAILURE_STATUS, assign_correlation_ids};
pub use self::enforcer::{CoalescingEnforcer, EnforcerBuilder, ResponseHandle};
pub use self::retry::call_with_retry;
pub use self::status::{EnforcerCounters, EnforcerStatus};
pub use self::builder::{BuildError, Relay, RelayBuilder};
