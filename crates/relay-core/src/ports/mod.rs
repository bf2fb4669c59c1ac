//! Ports - 外部との境界
//!
//! 各 trait は外部システム（batch API, 監査ログ, feature flag, 時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod wire;
pub mod batch_executor;
pub mod audit_sink;
pub mod feature_flags;
pub mod clock;

pub use self::wire::{BATCH_ENDPOINT, BatchWire, MAX_BATCH_SIZE, WireError, WireRequest, WireResponse};
pub use self::batch_executor::BatchExecutor;
pub use self::audit_sink::{AuditError, AuditSink, AuditWriter};
pub use self::feature_flags::{COALESCING_FLAG, FeatureFlags};
pub use self::clock::{Clock, FixedClock, SystemClock};
