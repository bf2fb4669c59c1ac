//! Adapters - 外部システムごとのアダプタと登録
//!
//! 外部システム（ディレクトリ API, リストストアなど）ごとに
//! 「何を transient とみなすか」は異なるため、RetryPolicy はアダプタが宣言します。
//!
//! # 構成
//! - **ExternalSystemAdapter**: アダプタが実装する trait
//! - **AdapterRegistry**: key → factory の登録。登録時に policy を検証

pub mod adapter;
pub mod registry;

pub use self::adapter::ExternalSystemAdapter;
pub use self::registry::{AdapterRegistry, RegistryError};
