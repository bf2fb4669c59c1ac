//! BatchTransport - チャンク分割・wire call・status 分類
//!
//! # フロー
//! 1. initialize 済みかチェック（未設定なら NotInitialized）
//! 2. correlation id を採番（caller 指定の id はそのまま）
//! 3. MAX_BATCH_SIZE ごとにチャンク分割し、順番に 1 回ずつ wire call
//! 4. wire call 自体が失敗したチャンクは全エントリを 503 として合成
//! 5. BatchResult に分類し、監査イベントを 1 件発行（best-effort）
//!
//! チャンクは並行ではなく逐次送信します（リモート API の負荷を抑えるため）。

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{
    AuditAction, AuditEvent, BatchId, BatchResult, LogicalRequest, LogicalResponse, RelayError,
};
use crate::impls::NoopAuditSink;
use crate::ports::audit_sink::emit_best_effort;
use crate::ports::{
    AuditSink, BATCH_ENDPOINT, BatchExecutor, BatchWire, Clock, MAX_BATCH_SIZE, SystemClock,
    WireError, WireRequest,
};

/// Status used for every entry of a chunk whose wire call failed.
pub const CHUNK_FAILURE_STATUS: u16 = 503;

/// Assign correlation ids in place and return them in request order.
///
/// Caller-supplied ids are kept verbatim and must be unique. Requests without
/// an id get "1", "2", ... skipping values already taken by callers.
pub fn assign_correlation_ids(requests: &mut [LogicalRequest]) -> Result<Vec<String>, RelayError> {
    let mut used: HashSet<String> = HashSet::with_capacity(requests.len());
    for id in requests.iter().filter_map(|r| r.id.as_ref()) {
        if !used.insert(id.clone()) {
            return Err(RelayError::DuplicateRequestId { id: id.clone() });
        }
    }

    let mut next = 1u64;
    let mut ids = Vec::with_capacity(requests.len());
    for request in requests.iter_mut() {
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                while used.contains(&next.to_string()) {
                    next += 1;
                }
                let id = next.to_string();
                next += 1;
                request.id = Some(id.clone());
                id
            }
        };
        ids.push(id);
    }
    Ok(ids)
}

fn chunk_failure_response(id: &str, error: &WireError) -> LogicalResponse {
    LogicalResponse::new(id, CHUNK_FAILURE_STATUS).with_body(json!({
        "error": {
            "code": "BatchChunkFailed",
            "message": error.to_string(),
        }
    }))
}

/// Packs logical requests into wire calls of at most `MAX_BATCH_SIZE`.
///
/// # 使用例
/// ```ignore
/// let transport = BatchTransport::new();
/// transport.initialize(Arc::new(my_wire));
/// transport.set_audit_logger(Arc::new(TracingAuditSink));
/// let result = transport.execute_batch(requests).await?;
/// ```
pub struct BatchTransport {
    wire: RwLock<Option<Arc<dyn BatchWire>>>,
    audit: RwLock<Arc<dyn AuditSink>>,
    clock: Arc<dyn Clock>,
}

impl BatchTransport {
    /// Unconfigured transport; `execute_batch` fails until `initialize`.
    pub fn new() -> Self {
        Self {
            wire: RwLock::new(None),
            audit: RwLock::new(Arc::new(NoopAuditSink)),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn initialize(&self, wire: Arc<dyn BatchWire>) {
        *self.wire.write().unwrap_or_else(PoisonError::into_inner) = Some(wire);
    }

    pub fn set_audit_logger(&self, sink: Arc<dyn AuditSink>) {
        *self.audit.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    pub fn is_initialized(&self) -> bool {
        self.wire
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn wire(&self) -> Result<Arc<dyn BatchWire>, RelayError> {
        self.wire
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RelayError::NotInitialized)
    }

    fn audit(&self) -> Arc<dyn AuditSink> {
        self.audit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn execute_batch(
        &self,
        mut requests: Vec<LogicalRequest>,
    ) -> Result<BatchResult, RelayError> {
        let wire = self.wire()?;
        if requests.is_empty() {
            return Ok(BatchResult::empty());
        }

        let ids = assign_correlation_ids(&mut requests)?;
        let batch_id = BatchId::generate();
        let chunk_count = requests.len().div_ceil(MAX_BATCH_SIZE);
        tracing::debug!(%batch_id, total = requests.len(), chunks = chunk_count, "executing batch");

        let mut responses = Vec::with_capacity(requests.len());
        for (index, (chunk, chunk_ids)) in requests
            .chunks(MAX_BATCH_SIZE)
            .zip(ids.chunks(MAX_BATCH_SIZE))
            .enumerate()
        {
            let wire_chunk: Vec<WireRequest> = chunk
                .iter()
                .zip(chunk_ids)
                .map(|(request, id)| WireRequest::from_logical(id.clone(), request))
                .collect();

            match wire.send(wire_chunk).await {
                Ok(wire_responses) => {
                    tracing::debug!(%batch_id, chunk = index, size = chunk.len(), "chunk sent");
                    responses.extend(wire_responses.into_iter().map(LogicalResponse::from));
                }
                Err(e) => {
                    tracing::warn!(%batch_id, chunk = index, size = chunk.len(), error = %e, "chunk failed; synthesizing 503 responses");
                    responses.extend(chunk_ids.iter().map(|id| chunk_failure_response(id, &e)));
                }
            }
        }

        let result = BatchResult::classify(responses);
        let details = format!(
            "total={} succeeded={} permanent={} transient={}",
            result.total(),
            result.succeeded.len(),
            result.permanent_failures.len(),
            result.transient_failures.len()
        );
        tracing::info!(%batch_id, %details, "batch executed");

        emit_best_effort(
            self.audit().as_ref(),
            AuditEvent::new(AuditAction::BatchExecuted, BATCH_ENDPOINT, details, self.clock.now()),
        );

        Ok(result)
    }
}

impl Default for BatchTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchExecutor for BatchTransport {
    async fn execute_batch(&self, requests: Vec<LogicalRequest>) -> Result<BatchResult, RelayError> {
        BatchTransport::execute_batch(self, requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryWire, MemoryAuditSink};
    use crate::ports::{AuditError, WireResponse};

    fn requests(n: usize) -> Vec<LogicalRequest> {
        (0..n).map(|i| LogicalRequest::get(format!("/users/{i}/photo"))).collect()
    }

    fn transport_with(wire: Arc<InMemoryWire>) -> BatchTransport {
        let transport = BatchTransport::new();
        transport.initialize(wire);
        transport
    }

    #[tokio::test]
    async fn uninitialized_transport_fails_fast() {
        let transport = BatchTransport::new();
        let err = transport.execute_batch(requests(1)).await.unwrap_err();
        assert!(matches!(err, RelayError::NotInitialized));
        assert!(!transport.is_initialized());
    }

    #[tokio::test]
    async fn empty_input_makes_no_wire_call() {
        let wire = Arc::new(InMemoryWire::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let transport = transport_with(wire.clone());
        transport.set_audit_logger(audit.clone());

        let result = transport.execute_batch(Vec::new()).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(wire.call_count(), 0);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn twenty_five_requests_make_two_chunks() {
        let wire = Arc::new(InMemoryWire::new());
        let transport = transport_with(wire.clone());

        let result = transport.execute_batch(requests(25)).await.unwrap();

        let sizes: Vec<usize> = wire.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 5]);
        assert_eq!(result.total(), 25);
        let ids: Vec<String> = result.responses.iter().map(|r| r.id.clone()).collect();
        let expected: Vec<String> = (1..=25).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
        assert_eq!(result.succeeded.len(), 25);
    }

    #[tokio::test]
    async fn chunk_order_matches_request_order() {
        let wire = Arc::new(InMemoryWire::new());
        let transport = transport_with(wire.clone());

        transport.execute_batch(requests(21)).await.unwrap();

        let calls = wire.calls();
        assert_eq!(calls[0][0].url, "/users/0/photo");
        assert_eq!(calls[0][19].url, "/users/19/photo");
        assert_eq!(calls[1][0].url, "/users/20/photo");
    }

    #[tokio::test]
    async fn caller_ids_are_preserved() {
        let wire = Arc::new(InMemoryWire::new());
        let transport = transport_with(wire.clone());

        let reqs = vec![
            LogicalRequest::get("/a").with_id("alpha"),
            LogicalRequest::get("/b"),
        ];
        let result = transport.execute_batch(reqs).await.unwrap();

        let ids: Vec<&str> = result.responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "1"]);
    }

    #[tokio::test]
    async fn duplicate_caller_ids_are_rejected_before_sending() {
        let wire = Arc::new(InMemoryWire::new());
        let transport = transport_with(wire.clone());

        let reqs = vec![
            LogicalRequest::get("/a").with_id("x"),
            LogicalRequest::get("/b").with_id("x"),
        ];
        let err = transport.execute_batch(reqs).await.unwrap_err();

        assert!(matches!(err, RelayError::DuplicateRequestId { ref id } if id == "x"));
        assert_eq!(wire.call_count(), 0);
    }

    #[test]
    fn auto_ids_skip_caller_ids() {
        let mut reqs = vec![
            LogicalRequest::get("/a").with_id("1"),
            LogicalRequest::get("/b"),
            LogicalRequest::get("/c"),
        ];
        let ids = assign_correlation_ids(&mut reqs).unwrap();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let mut reqs = vec![LogicalRequest::get("/a"), LogicalRequest::get("/b").with_id("1")];
        let ids = assign_correlation_ids(&mut reqs).unwrap();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(reqs[0].id(), Some("2"));
    }

    #[tokio::test]
    async fn failed_chunk_becomes_503_per_request() {
        let wire = Arc::new(InMemoryWire::new().fail_call(1));
        let transport = transport_with(wire.clone());

        let result = transport.execute_batch(requests(22)).await.unwrap();

        assert_eq!(result.total(), 22);
        assert_eq!(result.succeeded.len(), 20);
        assert_eq!(result.transient_failures.len(), 2);
        let failed = &result.transient_failures[0];
        assert_eq!(failed.status, 503);
        assert_eq!(failed.id, "21");
        assert!(failed.body_text().contains("simulated outage on call 1"));
    }

    #[tokio::test]
    async fn mixed_statuses_are_classified() {
        let wire = Arc::new(InMemoryWire::with_responder(|req| {
            let status = match req.id.as_str() {
                "1" => 200,
                "2" => 400,
                _ => 503,
            };
            WireResponse::new(req.id.clone(), status)
        }));
        let transport = transport_with(wire);

        let result = transport.execute_batch(requests(3)).await.unwrap();

        assert_eq!(result.succeeded[0].id, "1");
        assert_eq!(result.permanent_failures[0].id, "2");
        assert_eq!(result.transient_failures[0].id, "3");
    }

    #[tokio::test]
    async fn one_audit_event_per_call() {
        let wire = Arc::new(InMemoryWire::new().fail_call(0));
        let audit = Arc::new(MemoryAuditSink::new());
        let transport = transport_with(wire);
        transport.set_audit_logger(audit.clone());

        transport.execute_batch(requests(25)).await.unwrap();

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::BatchExecuted);
        assert_eq!(events[0].entity_id, BATCH_ENDPOINT);
        assert_eq!(events[0].details, "total=25 succeeded=5 permanent=0 transient=20");
    }

    #[tokio::test]
    async fn audit_failures_do_not_reach_the_caller() {
        let transport = transport_with(Arc::new(InMemoryWire::new()));
        transport.set_audit_logger(Arc::new(|_event: AuditEvent| -> Result<(), AuditError> {
            Err(AuditError::Write("audit list unavailable".to_string()))
        }));

        let result = transport.execute_batch(requests(2)).await.unwrap();
        assert_eq!(result.succeeded.len(), 2);
    }
}
