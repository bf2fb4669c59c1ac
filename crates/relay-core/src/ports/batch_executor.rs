//! BatchExecutor port - Enforcer から見た Batch Transport
//!
//! Enforcer はこの trait だけに依存します。本番では `BatchTransport`、
//! テストでは呼び出しを記録する mock を差し込みます。

use async_trait::async_trait;

use crate::domain::{BatchResult, LogicalRequest, RelayError};

#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn execute_batch(&self, requests: Vec<LogicalRequest>) -> Result<BatchResult, RelayError>;
}
