//! Errors - relay のエラー型と分類
//!
//! # 分類
//! - 設定エラー: initialize 前の呼び出し（NotInitialized）
//! - Backpressure: キュー満杯（呼び出し元にのみ同期で返る）
//! - 個別エラー: status >= 400 の応答（その呼び出し元にのみ返る）
//! - Disposed: シャットダウンによる拒否（ネットワーク障害と区別できる）

use thiserror::Error;

use super::response::LogicalResponse;

/// Fixed rejection text for requests drained by `dispose()`.
pub const DISPOSED_MESSAGE: &str = "BatchEnforcer disposed: request was not sent";

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("batch transport is not initialized; call initialize() before execute_batch()")]
    NotInitialized,

    #[error("{component} backpressure: queue full ({pending_count}/{max_depth})")]
    Backpressure {
        component: String,
        pending_count: usize,
        max_depth: usize,
    },

    #[error("request {id} failed with status {status}: {body}")]
    RequestFailed {
        id: String,
        status: u16,
        body: String,
        response: Box<LogicalResponse>,
    },

    #[error("no response for request id {id}")]
    NoResponse { id: String },

    #[error("duplicate request id {id} in one batch")]
    DuplicateRequestId { id: String },

    #[error("BatchEnforcer disposed: request was not sent")]
    Disposed,

    #[error("request was dropped before a response was produced")]
    Canceled,
}

impl RelayError {
    pub fn request_failed(response: LogicalResponse) -> Self {
        RelayError::RequestFailed {
            id: response.id.clone(),
            status: response.status,
            body: response.body_text(),
            response: Box::new(response),
        }
    }

    /// The failing response, when the error came from a per-item status.
    pub fn response(&self) -> Option<&LogicalResponse> {
        match self {
            RelayError::RequestFailed { response, .. } => Some(response),
            _ => None,
        }
    }

    /// HTTP status behind this error, if there is one.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, RelayError::Disposed)
    }

    pub fn is_backpressure(&self) -> bool {
        matches!(self, RelayError::Backpressure { .. })
    }
}
