//! Status - enforcer の観測用スナップショット
//!
//! 容量設計のための値です。制御には使いません。

use serde::{Deserialize, Serialize};

/// Lifetime counters of one enforcer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcerCounters {
    /// Non-empty snapshots handed to the transport.
    pub flushes: u64,
    /// Requests that went out inside those snapshots.
    pub coalesced_requests: u64,
    /// Requests sent alone because coalescing was off.
    pub passthrough_requests: u64,
    pub backpressure_rejections: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcerStatus {
    pub component: String,
    pub pending: usize,
    pub high_water_mark: usize,
    pub max_queue_depth: usize,
    pub flush_threshold: usize,
    pub coalescing_enabled: bool,
    pub timer_running: bool,
    pub disposed: bool,
    pub counters: EnforcerCounters,
}
