//! LogicalResponse - LogicalRequest 1 件に対する応答

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Response correlated to exactly one `LogicalRequest` by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalResponse {
    pub id: String,

    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl LogicalResponse {
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

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Status >= 400. Anything below is handed back to the caller as-is.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Best-effort string form of the body for error messages.
    pub fn body_text(&self) -> String {
        match &self.body {
            None => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => serde_json::to_string(v).unwrap_or_else(|_| "<unprintable body>".to_string()),
        }
    }
}
