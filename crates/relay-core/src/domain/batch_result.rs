//! Batch result model: per-response status classification.
//!
//! Classification here is fixed and does not depend on which adapter issued
//! the requests. Adapter-specific retry decisions live in `RetryPolicy`.

use serde::{Deserialize, Serialize};

use super::response::LogicalResponse;

/// Classification of one response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusClass {
    /// 2xx
    Succeeded,
    /// 4xx except 429
    Permanent,
    /// 429 or 5xx
    Transient,
    /// 1xx / 3xx: kept in `responses`, not in any partition.
    Unclassified,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => StatusClass::Succeeded,
            429 => StatusClass::Transient,
            400..=499 => StatusClass::Permanent,
            s if s >= 500 => StatusClass::Transient,
            _ => StatusClass::Unclassified,
        }
    }
}

/// Full response set for one `execute_batch` call.
///
/// The three partitions are disjoint and computed purely from status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub responses: Vec<LogicalResponse>,
    pub succeeded: Vec<LogicalResponse>,
    pub permanent_failures: Vec<LogicalResponse>,
    pub transient_failures: Vec<LogicalResponse>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn classify(responses: Vec<LogicalResponse>) -> Self {
        let mut succeeded = Vec::new();
        let mut permanent_failures = Vec::new();
        let mut transient_failures = Vec::new();

        for response in &responses {
            match StatusClass::of(response.status) {
                StatusClass::Succeeded => succeeded.push(response.clone()),
                StatusClass::Permanent => permanent_failures.push(response.clone()),
                StatusClass::Transient => transient_failures.push(response.clone()),
                StatusClass::Unclassified => {}
            }
        }

        Self {
            responses,
            succeeded,
            permanent_failures,
            transient_failures,
        }
    }

    pub fn total(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Hand the responses over to the caller.
    pub fn into_responses(self) -> Vec<LogicalResponse> {
        self.responses
    }
}
