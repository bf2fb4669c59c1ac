//! Impls - ports の実装（開発用・テスト用・ログ用）
//!
//! # 含まれる実装
//! - **InMemoryWire**: 開発用の BatchWire
//! - **NoopAuditSink / TracingAuditSink / MemoryAuditSink / ChannelAuditSink**
//! - **NoopFeatureFlags / StaticFeatureFlags**
//!
//! 本番の HTTP クライアント（認証付き）はこの crate の外で BatchWire を実装します。

pub mod inmem_wire;
pub mod audit;
pub mod feature_flags;

pub use self::inmem_wire::InMemoryWire;
pub use self::audit::{ChannelAuditSink, MemoryAuditSink, NoopAuditSink, TracingAuditSink};
pub use self::feature_flags::{NoopFeatureFlags, StaticFeatureFlags};
