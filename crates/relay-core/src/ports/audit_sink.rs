//! AuditSink port - 監査イベントの送り先
//!
//! `record` は同期かつ non-blocking であることが前提です。
//! 呼び出し側はエラーを握りつぶします（best-effort）。
//! 非同期の書き込み先は `AuditWriter` として実装し、
//! `impls::ChannelAuditSink` 経由で background task に流します。

use async_trait::async_trait;

use crate::domain::AuditEvent;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink is closed")]
    Closed,

    #[error("audit sink is full; event dropped")]
    Overflow,

    #[error("audit write failed: {0}")]
    Write(String),
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Closures work as sinks.
impl<F> AuditSink for F
where
    F: Fn(AuditEvent) -> Result<(), AuditError> + Send + Sync,
{
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self(event)
    }
}

/// Async destination behind a `ChannelAuditSink`.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    async fn write(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Record and discard any failure.
pub(crate) fn emit_best_effort(sink: &dyn AuditSink, event: AuditEvent) {
    let action = event.action;
    if let Err(e) = sink.record(event) {
        tracing::debug!(?action, error = %e, "audit event dropped");
    }
}
