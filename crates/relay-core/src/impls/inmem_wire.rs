//! InMemoryWire - 開発・テスト用の BatchWire
//!
//! # 実装詳細
//! - responder 関数で各エントリの応答を決める（デフォルトは 200 の echo）
//! - 指定した呼び出し番号（0 始まり）で wire call 自体を失敗させられる
//! - 受け取ったチャンクをすべて記録する

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{BatchWire, WireError, WireRequest, WireResponse};

type Responder = Box<dyn Fn(&WireRequest) -> WireResponse + Send + Sync>;

pub struct InMemoryWire {
    responder: Responder,
    failing_calls: HashSet<usize>,
    fail_all: bool,
    reverse_order: bool,
    latency: Option<Duration>,
    calls: Mutex<Vec<Vec<WireRequest>>>,
}

impl InMemoryWire {
    /// Answers every entry with 200 and echoes `url` back in the body.
    pub fn new() -> Self {
        Self::with_responder(|req| {
            WireResponse::new(req.id.clone(), 200)
                .with_body(serde_json::json!({ "url": req.url }))
        })
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&WireRequest) -> WireResponse + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            failing_calls: HashSet::new(),
            fail_all: false,
            reverse_order: false,
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make the `index`-th wire call (0-based) fail as a whole.
    pub fn fail_call(mut self, index: usize) -> Self {
        self.failing_calls.insert(index);
        self
    }

    pub fn fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Return responses in reverse order, as the remote API is allowed to.
    pub fn reversed(mut self) -> Self {
        self.reverse_order = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every chunk received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<WireRequest>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for InMemoryWire {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchWire for InMemoryWire {
    async fn send(&self, chunk: Vec<WireRequest>) -> Result<Vec<WireResponse>, WireError> {
        let index = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(chunk.clone());
            calls.len() - 1
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.fail_all || self.failing_calls.contains(&index) {
            return Err(WireError::Failed(format!("simulated outage on call {index}")));
        }

        let mut responses: Vec<WireResponse> = chunk.iter().map(|r| (self.responder)(r)).collect();
        if self.reverse_order {
            responses.reverse();
        }
        Ok(responses)
    }
}
