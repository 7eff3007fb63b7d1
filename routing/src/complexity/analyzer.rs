//! Complexity Analyzer: derives [`OrderComplexity`] from live item state.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ItemStatus, JobMetadata, OrderComplexity, WorkItem};
use crate::error::RouterError;
use crate::store::JobStore;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Reads a job's items and metadata and summarises them.
#[derive(Clone)]
pub struct ComplexityAnalyzer {
    store: Arc<dyn JobStore>,
}

impl ComplexityAnalyzer {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Analyze `job_id`.
    ///
    /// Fails with [`RouterError::NotFound`] when the job has no work items.
    /// Missing or unreadable metadata falls back to defaults.
    pub async fn analyze(&self, job_id: &str) -> Result<OrderComplexity, RouterError> {
        let (items, metadata) = tokio::join!(
            self.store.fetch_items(job_id),
            self.store.fetch_metadata(job_id)
        );

        let items = items?;
        if items.is_empty() {
            return Err(RouterError::NotFound(job_id.to_string()));
        }

        let metadata = match metadata {
            Ok(meta) => meta.unwrap_or_default(),
            Err(e) => {
                warn!(job_id = %job_id, "Job metadata unavailable, using defaults: {}", e);
                JobMetadata::default()
            }
        };

        let complexity = summarize(job_id, &items, &metadata);
        debug!(
            job_id = %job_id,
            items = complexity.item_count,
            size_mb = complexity.total_size_mb,
            failures = complexity.has_failure_history,
            reprocessing = complexity.is_reprocessing,
            "Complexity analyzed"
        );
        Ok(complexity)
    }
}

/// Pure summary of a job's items.
pub fn summarize(job_id: &str, items: &[WorkItem], metadata: &JobMetadata) -> OrderComplexity {
    let total_bytes: u64 = items.iter().map(|i| i.size_bytes).sum();

    OrderComplexity {
        job_id: job_id.to_string(),
        item_count: items.len() as u32,
        total_size_mb: round2(total_bytes as f64 / BYTES_PER_MB),
        has_failure_history: items.iter().any(WorkItem::has_failed_before),
        requires_custom_analysis: metadata.requires_custom_analysis,
        is_reprocessing: items.iter().any(|i| i.status != ItemStatus::Pending),
        requester_tier: metadata.requester_tier,
        recorded_errors: items
            .iter()
            .filter_map(|i| i.error_message.clone())
            .collect(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
