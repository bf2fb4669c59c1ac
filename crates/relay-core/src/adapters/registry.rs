//! AdapterRegistry - アダプタ factory の登録と取得
//!
//! # 登録時検証
//! register() は factory から 1 つインスタンスを作り、RetryPolicy を検査します。
//! - policy が無い → MissingRetryPolicy
//! - max_retries < 0 など → InvalidRetryPolicy
//!
//! 失敗した場合は何も登録されません。
//! get() は毎回 factory を呼ぶので、インスタンスはキャッシュされません。

use std::collections::HashMap;

use super::adapter::ExternalSystemAdapter;

type AdapterFactory = Box<dyn Fn() -> Box<dyn ExternalSystemAdapter> + Send + Sync>;

/// RegistryError は AdapterRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Adapter '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Adapter '{0}' is not registered")]
    NotRegistered(String),

    #[error("Adapter '{0}' does not declare a retry policy")]
    MissingRetryPolicy(String),

    #[error("Adapter '{key}' has an invalid retry policy: {reason}")]
    InvalidRetryPolicy { key: String, reason: String },
}

#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A, F>(&mut self, key: &str, factory: F) -> Result<(), RegistryError>
    where
        A: ExternalSystemAdapter + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        if self.factories.contains_key(key) {
            return Err(RegistryError::AlreadyRegistered(key.to_string()));
        }

        let probe = factory();
        let policy = probe
            .retry_policy()
            .ok_or_else(|| RegistryError::MissingRetryPolicy(key.to_string()))?;
        policy
            .validate()
            .map_err(|reason| RegistryError::InvalidRetryPolicy {
                key: key.to_string(),
                reason,
            })?;

        tracing::debug!(
            key,
            system = probe.system_name(),
            max_retries = policy.max_retries,
            "adapter registered"
        );
        self.factories.insert(
            key.to_string(),
            Box::new(move || Box::new(factory()) as Box<dyn ExternalSystemAdapter>),
        );
        Ok(())
    }

    /// Fresh instance from the registered factory.
    pub fn get(&self, key: &str) -> Result<Box<dyn ExternalSystemAdapter>, RegistryError> {
        self.factories
            .get(key)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::NotRegistered(key.to_string()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
