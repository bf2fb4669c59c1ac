//! BatchWire port - リモート API の batch エンドポイント
//!
//! 認証や HTTP の実装はこの crate の範囲外です。
//! BatchWire は「1 チャンク = 1 回の wire call」を表す最小の契約だけを定義します。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{HttpMethod, LogicalRequest, LogicalResponse};

/// Hard ceiling of entries per wire call, mirroring the remote API's limit.
pub const MAX_BATCH_SIZE: usize = 20;

/// Relative path of the batch endpoint. Used as the transport's audit entity id.
pub const BATCH_ENDPOINT: &str = "/$batch";

/// One entry of a wire call. `id` is always set at this point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub id: String,
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    pub headers: BTreeMap<String, String>,
}

impl WireRequest {
    /// Build from a request whose correlation id is already assigned.
    pub fn from_logical(id: String, request: &LogicalRequest) -> Self {
        let mut headers = request.headers.clone();
        if request.body.is_some()
            && !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        Self {
            id,
            method: request.method,
            url: request.url.clone(),
            body: request.body.clone(),
            headers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl WireResponse {
    pub fn new(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            headers: None,
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl From<WireResponse> for LogicalResponse {
    fn from(w: WireResponse) -> Self {
        LogicalResponse {
            id: w.id,
            status: w.status,
            headers: w.headers,
            body: w.body,
        }
    }
}

/// Failure of a whole wire call (network, auth, malformed envelope).
/// Per-item failures are not errors here; they are statuses.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("batch call failed: {0}")]
    Failed(String),

    #[error("batch call timed out after {0}ms")]
    Timeout(u64),
}

/// Connection handle to the remote batch endpoint.
#[async_trait]
pub trait BatchWire: Send + Sync {
    /// Send one chunk (at most `MAX_BATCH_SIZE` entries) and return the
    /// per-entry responses in whatever order the remote API produced them.
    async fn send(&self, chunk: Vec<WireRequest>) -> Result<Vec<WireResponse>, WireError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_type_is_added_for_bodies() {
        let req = LogicalRequest::post("/groups/1/owners/$ref", json!({ "a": 1 }));
        let wire = WireRequest::from_logical("1".to_string(), &req);
        assert_eq!(
            wire.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn caller_content_type_wins() {
        let req = LogicalRequest::patch("/items/1", json!("raw"))
            .with_header("content-type", "text/plain");
        let wire = WireRequest::from_logical("1".to_string(), &req);
        assert_eq!(wire.headers.len(), 1);
        assert_eq!(wire.headers.get("content-type").map(String::as_str), Some("text/plain"));
    }

    #[test]
    fn get_without_body_has_empty_headers() {
        let wire = WireRequest::from_logical("9".to_string(), &LogicalRequest::get("/me"));
        let v = serde_json::to_value(&wire).unwrap();
        assert_eq!(v, json!({ "id": "9", "method": "GET", "url": "/me", "headers": {} }));
    }
}
