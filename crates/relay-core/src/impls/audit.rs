//! AuditSink の実装
//!
//! # 含まれる実装
//! - **NoopAuditSink**: 何もしない
//! - **TracingAuditSink**: tracing の info イベントとして出力
//! - **MemoryAuditSink**: メモリに溜める（開発・テスト用）
//! - **ChannelAuditSink**: bounded channel + background task で AuditWriter に流す

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::domain::AuditEvent;
use crate::ports::{AuditError, AuditSink, AuditWriter};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            action = ?event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            actor = %event.actor,
            details = %event.details,
            "audit"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditWriter for TracingAuditSink {
    async fn write(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.record(event)
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditWriter for MemoryAuditSink {
    async fn write(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.record(event)
    }
}

/// Detached audit delivery.
///
/// `record` only does a `try_send`; a background task forwards events to the
/// writer and logs write failures. When the channel is full the event is
/// dropped and `AuditError::Overflow` is returned to the (ignoring) caller.
///
/// # 使用例
/// ```ignore
/// let (sink, task) = ChannelAuditSink::spawn(Arc::new(my_writer), 256);
/// transport.set_audit_logger(Arc::new(sink));
/// ```
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Must be called inside a tokio runtime.
    pub fn spawn(writer: Arc<dyn AuditWriter>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let action = event.action;
                if let Err(e) = writer.write(event).await {
                    tracing::warn!(?action, error = %e, "audit writer failed");
                }
            }
        });

        (Self { tx }, task)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => AuditError::Overflow,
            TrySendError::Closed(_) => AuditError::Closed,
        })
    }
}
