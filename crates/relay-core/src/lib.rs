//! relay-core
//!
//! Request batching, coalescing and resilience in front of a JSON batch API.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（request, response, batch_result, retry_policy, errors, events）
//! - **ports**: 抽象化レイヤー（BatchWire, BatchExecutor, AuditSink, FeatureFlags, Clock）
//! - **app**: アプリケーションロジック（transport, enforcer, retry, builder）
//! - **adapters**: 外部システムごとのアダプタと AdapterRegistry
//! - **impls**: 実装（InMemoryWire, 監査シンク, feature flag など）
//!
//! # 流れ
//! ```text
//! caller ─submit→ CoalescingEnforcer ─snapshot→ BatchTransport ─chunk(≤20)→ BatchWire
//!    ↑                    │                           │
//!    └── ResponseHandle ←─┘ (id で対応付け)            └→ AuditSink
//! ```

pub mod domain;
pub mod ports;
pub mod app;
pub mod adapters;
pub mod impls;

pub use crate::adapters::{AdapterRegistry, ExternalSystemAdapter};
pub use crate::app::{BatchTransport, CoalescingEnforcer, Relay, RelayBuilder, ResponseHandle};
pub use crate::domain::{BatchResult, LogicalRequest, LogicalResponse, RelayError, RetryPolicy};
