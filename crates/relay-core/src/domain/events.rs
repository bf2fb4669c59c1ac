//! Events - 監査イベント
//!
//! flush / backpressure / batch 実行ごとに 1 件発行されます。
//! 送信は best-effort で、失敗しても呼び出し元には影響しません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity type tag shared by every event of this subsystem.
pub const AUDIT_ENTITY_TYPE: &str = "GraphBatch";

/// Entity id used by the coalescing enforcer.
pub const ENFORCER_ENTITY_ID: &str = "BatchEnforcer";

/// Actor for all events; never an end user.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// One `execute_batch` call finished.
    BatchExecuted,
    /// The enforcer flushed a coalesced snapshot.
    BatchCoalesced,
    /// The enforcer rejected a request because its queue was full.
    BatchBackpressure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub actor: String,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity_id: impl Into<String>,
        details: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            entity_type: AUDIT_ENTITY_TYPE.to_string(),
            entity_id: entity_id.into(),
            actor: SYSTEM_ACTOR.to_string(),
            details: details.into(),
            recorded_at,
        }
    }
}
