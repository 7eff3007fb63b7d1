//! Job complexity analysis
//!
//! Builds an [`OrderComplexity`] snapshot from the job's current work items.
//! Snapshots are derived fresh on every call and never cached.

pub mod analyzer;

use serde::{Deserialize, Serialize};

pub use analyzer::ComplexityAnalyzer;

/// Requester service class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterTier {
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl std::fmt::Display for RequesterTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Processing state of a single work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    #[serde(alias = "failed")]
    Error,
}

/// One unit of work (an uploaded image) as seen by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub job_id: String,
    pub size_bytes: u64,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl WorkItem {
    /// Item previously entered an error state or was retried.
    pub fn has_failed_before(&self) -> bool {
        self.status == ItemStatus::Error || self.retry_count > 0 || self.error_message.is_some()
    }
}

/// Job/requester metadata held outside the item table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub requires_custom_analysis: bool,
    pub requester_tier: RequesterTier,
}

/// Complexity snapshot of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderComplexity {
    pub job_id: String,
    pub item_count: u32,
    /// Sum of item sizes in MB, rounded to two decimals
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub has_failure_history: bool,
    pub requires_custom_analysis: bool,
    pub is_reprocessing: bool,
    pub requester_tier: RequesterTier,
    /// Error messages recorded on the job's items, for error classification
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recorded_errors: Vec<String>,
}

impl OrderComplexity {
    /// A single small, clean item from a standard requester.
    pub fn simple(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            item_count: 1,
            total_size_mb: 0.0,
            has_failure_history: false,
            requires_custom_analysis: false,
            is_reprocessing: false,
            requester_tier: RequesterTier::Standard,
            recorded_errors: Vec::new(),
        }
    }
}
