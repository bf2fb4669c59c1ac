use std::sync::Arc;

use relay_core::app::{RelayConfig, call_with_retry};
use relay_core::domain::{LogicalRequest, LogicalResponse, RetryPolicy};
use relay_core::impls::{ChannelAuditSink, InMemoryWire, StaticFeatureFlags, TracingAuditSink};
use relay_core::ports::{AuditWriter, COALESCING_FLAG, WireRequest, WireResponse};
use relay_core::{ExternalSystemAdapter, RelayBuilder, RelayError};
use serde_json::json;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

/// ディレクトリ API: rate limit (429) と 5xx を transient とみなす
struct DirectoryAdapter {
    policy: RetryPolicy,
}

impl DirectoryAdapter {
    fn new() -> Self {
        Self {
            policy: RetryPolicy::new([429, 500, 502, 503, 504], 3, 1_000, 30_000),
        }
    }
}

impl ExternalSystemAdapter for DirectoryAdapter {
    fn system_name(&self) -> &str {
        "directory"
    }

    fn retry_policy(&self) -> Option<&RetryPolicy> {
        Some(&self.policy)
    }
}

/// リストストア: gateway 系のみ transient
struct ListStoreAdapter {
    policy: RetryPolicy,
}

impl ListStoreAdapter {
    fn new() -> Self {
        Self {
            policy: RetryPolicy::new([502, 503], 2, 500, 5_000),
        }
    }
}

impl ExternalSystemAdapter for ListStoreAdapter {
    fn system_name(&self) -> &str {
        "list-store"
    }

    fn retry_policy(&self) -> Option<&RetryPolicy> {
        Some(&self.policy)
    }
}

/// 開発用の応答: /missing は 404、それ以外は URL を返す
fn demo_responder(req: &WireRequest) -> WireResponse {
    if req.url.contains("/missing") {
        WireResponse::new(req.id.clone(), 404).with_body(json!({ "error": { "code": "itemNotFound" } }))
    } else {
        WireResponse::new(req.id.clone(), 200).with_body(json!({ "url": req.url }))
    }
}

fn load_config() -> Result<RelayConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "loading config");
            Ok(RelayConfig::from_path(path)?)
        }
        None => Ok(RelayConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) 設定と依存を用意
    let config = load_config()?;
    let flags = Arc::new(StaticFeatureFlags::new());
    flags.set(COALESCING_FLAG, config.coalescing_enabled);

    let wire = Arc::new(
        InMemoryWire::with_responder(demo_responder).with_latency(Duration::from_millis(5)),
    );
    let writer: Arc<dyn AuditWriter> = Arc::new(TracingAuditSink);
    let (audit, audit_task) = ChannelAuditSink::spawn(writer, config.audit_channel_capacity);

    // (B) 組み立て（期待するアダプタが揃っていなければここで失敗する）
    let relay = RelayBuilder::new()
        .wire(wire.clone())
        .audit_logger(Arc::new(audit))
        .feature_flags(flags.clone())
        .config(config)
        .register("directory", DirectoryAdapter::new)?
        .register("list-store", ListStoreAdapter::new)?
        .expect_adapters(&["directory", "list-store"])
        .build()?;

    // (C) 同時に 7 件投入 → threshold で 2 回 flush、残り 1 件は window で flush
    let mut handles = Vec::new();
    for n in 0..7 {
        let url = if n == 4 {
            "/users/missing/photo".to_string()
        } else {
            format!("/users/{n}/photo")
        };
        handles.push(relay.enforcer.submit(LogicalRequest::get(url))?);
    }
    for handle in handles {
        match handle.await {
            Ok(LogicalResponse { id, status, .. }) => println!("ok: id={id} status={status}"),
            Err(e) => println!("failed: {e}"),
        }
    }

    // (D) アダプタの policy で再試行（404 は permanent なので 1 回で終わる）
    let directory = relay.adapters.get("directory")?;
    if let Some(policy) = directory.retry_policy() {
        let enforcer = relay.enforcer.clone();
        let result = call_with_retry(policy, || {
            let enforcer = enforcer.clone();
            async move { enforcer.enqueue(LogicalRequest::get("/groups/missing")).await }
        })
        .await;
        if let Err(RelayError::RequestFailed { status, .. }) = &result {
            println!("{}: permanent failure {status}", directory.system_name());
        }
    }

    // (E) flag を切ると 1 件ずつ送られる
    flags.set(COALESCING_FLAG, false);
    relay
        .enforcer
        .enqueue(LogicalRequest::post("/lists/tasks/items", json!({ "title": "demo" })))
        .await?;

    println!("wire calls: {}", wire.call_count());
    println!("status: {}", serde_json::to_string_pretty(&relay.enforcer.status())?);

    // (F) 後片付け：未送信分を拒否し、監査チャネルを閉じる
    relay.enforcer.dispose();
    drop(relay);
    if let Err(e) = audit_task.await {
        tracing::warn!(error = %e, "audit task did not finish cleanly");
    }
    Ok(())
}
