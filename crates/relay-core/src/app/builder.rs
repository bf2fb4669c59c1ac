//! RelayBuilder - transport / enforcer / adapters のワイヤリング
//!
//! # Fail-fast 設計
//! - wire が設定されていなければ build() は失敗する
//! - expect_adapters() で期待されるアダプタを宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 設定値は build() 時に検証する

use std::sync::Arc;

use super::config::{ConfigError, RelayConfig};
use super::enforcer::CoalescingEnforcer;
use super::transport::BatchTransport;
use crate::adapters::{AdapterRegistry, ExternalSystemAdapter, RegistryError};
use crate::impls::{NoopAuditSink, StaticFeatureFlags};
use crate::ports::{AuditSink, BatchWire, COALESCING_FLAG, Clock, FeatureFlags, SystemClock};

/// RelayBuilder は Relay を構築
///
/// # 使用例
/// ```ignore
/// let relay = RelayBuilder::new()
///     .wire(Arc::new(InMemoryWire::new()))
///     .audit_logger(Arc::new(TracingAuditSink))
///     .register("directory", DirectoryAdapter::new)?
///     .expect_adapters(&["directory"])
///     .build()?;
///
/// let response = relay.enforcer.enqueue(request).await?;
/// ```
///
/// feature_flags() を呼ばない場合、`RelayConfig::coalescing_enabled` を初期値とする
/// `StaticFeatureFlags` が使われます。
pub struct RelayBuilder {
    wire: Option<Arc<dyn BatchWire>>,
    audit: Arc<dyn AuditSink>,
    flags: Option<Arc<dyn FeatureFlags>>,
    clock: Arc<dyn Clock>,
    config: RelayConfig,
    registry: AdapterRegistry,
    expected_adapters: Option<Vec<String>>,
}

/// BuildError は Relay 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No batch wire configured. Call wire() before build().")]
    MissingWire,

    #[error("Missing adapters: {0:?}. These adapters were expected but not registered.")]
    MissingAdapters(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self {
            wire: None,
            audit: Arc::new(NoopAuditSink),
            flags: None,
            clock: Arc::new(SystemClock),
            config: RelayConfig::default(),
            registry: AdapterRegistry::new(),
            expected_adapters: None,
        }
    }

    pub fn wire(mut self, wire: Arc<dyn BatchWire>) -> Self {
        self.wire = Some(wire);
        self
    }

    /// Shared by the transport and the enforcer.
    pub fn audit_logger(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn feature_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// アダプタ factory を登録
    pub fn register<A, F>(mut self, key: &str, factory: F) -> Result<Self, RegistryError>
    where
        A: ExternalSystemAdapter + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.registry.register(key, factory)?;
        Ok(self)
    }

    pub fn expect_adapters(mut self, keys: &[&str]) -> Self {
        self.expected_adapters = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Relay, BuildError> {
        if let Some(expected) = &self.expected_adapters {
            let missing: Vec<String> = expected
                .iter()
                .filter(|key| !self.registry.has(key))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingAdapters(missing));
            }
        }
        let wire = self.wire.ok_or(BuildError::MissingWire)?;
        self.config.enforcer.validate()?;

        let flags = self.flags.unwrap_or_else(|| {
            let flags = StaticFeatureFlags::new();
            flags.set(COALESCING_FLAG, self.config.coalescing_enabled);
            Arc::new(flags)
        });

        let transport = Arc::new(BatchTransport::new().with_clock(Arc::clone(&self.clock)));
        transport.initialize(wire);
        transport.set_audit_logger(Arc::clone(&self.audit));

        let enforcer = CoalescingEnforcer::builder(transport.clone())
            .feature_flags(flags)
            .audit_logger(self.audit)
            .clock(self.clock)
            .config(self.config.enforcer)
            .build()?;

        tracing::info!(
            adapters = ?self.registry.registered_keys(),
            "relay built"
        );
        Ok(Relay {
            transport,
            enforcer,
            adapters: self.registry,
        })
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wired relay: one transport, one enforcer in front of it, and the adapters.
pub struct Relay {
    pub transport: Arc<BatchTransport>,
    pub enforcer: CoalescingEnforcer,
    pub adapters: AdapterRegistry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::adapter::fixtures::FixedAdapter;
    use crate::app::config::EnforcerConfig;
    use crate::domain::LogicalRequest;
    use crate::impls::{InMemoryWire, MemoryAuditSink};

    #[test]
    fn build_success() {
        let relay = RelayBuilder::new()
            .wire(Arc::new(InMemoryWire::new()))
            .register("directory", FixedAdapter::directory)
            .unwrap()
            .expect_adapters(&["directory"])
            .build();
        assert!(relay.is_ok());
    }

    #[test]
    fn build_missing_adapters() {
        let relay = RelayBuilder::new()
            .wire(Arc::new(InMemoryWire::new()))
            .register("directory", FixedAdapter::directory)
            .unwrap()
            .expect_adapters(&["directory", "list-store"])
            .build();
        assert!(matches!(
            relay,
            Err(BuildError::MissingAdapters(missing)) if missing == vec!["list-store".to_string()]
        ));
    }

    #[test]
    fn build_without_wire_fails() {
        let relay = RelayBuilder::new().build();
        assert!(matches!(relay, Err(BuildError::MissingWire)));
    }

    #[test]
    fn build_rejects_invalid_enforcer_config() {
        let config = RelayConfig {
            enforcer: EnforcerConfig {
                flush_threshold: 0,
                ..EnforcerConfig::default()
            },
            ..RelayConfig::default()
        };
        let relay = RelayBuilder::new()
            .wire(Arc::new(InMemoryWire::new()))
            .config(config)
            .build();
        assert!(matches!(relay, Err(BuildError::Config(_))));
    }

    #[test]
    fn register_propagates_registry_errors() {
        let result = RelayBuilder::new().register("legacy", FixedAdapter::without_policy);
        assert!(matches!(result, Err(RegistryError::MissingRetryPolicy(_))));
    }

    #[tokio::test]
    async fn built_relay_serves_requests_end_to_end() {
        let wire = Arc::new(InMemoryWire::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let relay = RelayBuilder::new()
            .wire(wire.clone())
            .audit_logger(audit.clone())
            .build()
            .unwrap();

        assert!(relay.transport.is_initialized());
        assert!(relay.enforcer.status().coalescing_enabled);

        let h1 = relay.enforcer.submit(LogicalRequest::get("/sites/root")).unwrap();
        let h2 = relay.enforcer.submit(LogicalRequest::get("/sites/hr")).unwrap();
        relay.enforcer.flush().await;

        assert_eq!(h1.await.unwrap().status, 200);
        assert_eq!(h2.await.unwrap().status, 200);
        assert_eq!(wire.call_count(), 1);
        // one from the transport, one from the enforcer
        assert_eq!(audit.len(), 2);
    }

    #[tokio::test]
    async fn coalescing_can_be_disabled_by_config() {
        let wire = Arc::new(InMemoryWire::new());
        let relay = RelayBuilder::new()
            .wire(wire.clone())
            .config(RelayConfig {
                coalescing_enabled: false,
                ..RelayConfig::default()
            })
            .build()
            .unwrap();

        relay.enforcer.enqueue(LogicalRequest::get("/me")).await.unwrap();
        relay.enforcer.enqueue(LogicalRequest::get("/me/drive")).await.unwrap();
        assert_eq!(wire.call_count(), 2);
    }
}
