//! Domain model (requests, responses, batch results, retry policy, errors, events).
//!
//! ここには I/O を持たない型だけを置きます。
//! - request / response: バッチ API の 1 エントリ
//! - batch_result: status による分類（succeeded / permanent / transient）
//! - retry_policy: 外部システムごとの再試行ポリシー
//! - errors / events: エラー型と監査イベント

pub mod request;
pub mod response;
pub mod batch_result;
pub mod retry_policy;
pub mod errors;
pub mod events;
pub mod ids;

pub use self::request::{HttpMethod, LogicalRequest};
pub use self::response::LogicalResponse;
pub use self::batch_result::{BatchResult, StatusClass};
pub use self::retry_policy::{RetryPolicy, is_transient};
pub use self::errors::{DISPOSED_MESSAGE, RelayError};
pub use self::events::{AUDIT_ENTITY_TYPE, AuditAction, AuditEvent, ENFORCER_ENTITY_ID, SYSTEM_ACTOR};
pub use self::ids::BatchId;
