//! Job and blob store collaborators
//!
//! The router only ever reads item metadata and issues lightweight
//! existence/listing calls. Payload bytes are never fetched.

use crate::complexity::{ItemStatus, JobMetadata, RequesterTier, WorkItem};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Read access to jobs and their work items.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Work items belonging to `job_id`, in store order. Empty if the job is unknown.
    async fn fetch_items(&self, job_id: &str) -> Result<Vec<WorkItem>, StoreError>;

    /// Job/requester metadata, `None` if absent.
    async fn fetch_metadata(&self, job_id: &str) -> Result<Option<JobMetadata>, StoreError>;

    /// Cheapest possible round-trip proving the store answers.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Liveness of the blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, StoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StoreError::RequestFailed(format!("Failed to create HTTP client: {}", e)))
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    #[serde(default)]
    requires_custom_analysis: Option<bool>,
    #[serde(default)]
    user_tier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageRow {
    id: String,
    order_id: String,
    #[serde(default)]
    file_size: Option<u64>,
    /// Kept raw; statuses added to the table later must not fail the whole read.
    #[serde(default)]
    processing_status: Option<String>,
    #[serde(default)]
    retry_count: Option<u32>,
    #[serde(default)]
    error_message: Option<String>,
}

impl From<ImageRow> for WorkItem {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            job_id: row.order_id,
            size_bytes: row.file_size.unwrap_or(0),
            status: row
                .processing_status
                .as_deref()
                .map_or(ItemStatus::Pending, item_status),
            retry_count: row.retry_count.unwrap_or(0),
            error_message: row.error_message,
        }
    }
}

fn known_variant<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
}

/// Unrecognised statuses are treated as in progress, never as fresh work.
fn item_status(raw: &str) -> ItemStatus {
    known_variant(raw).unwrap_or(ItemStatus::Processing)
}

const IMAGE_COLUMNS: &str = "id,order_id,file_size,processing_status,retry_count,error_message";

/// Job store over a PostgREST-style API (`orders` and `images` tables).
pub struct RestJobStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl RestJobStore {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client: build_client(timeout)?,
        })
    }

    /// GET `table` with query parameters. Values are percent-encoded, so a
    /// job id can never add filters of its own.
    async fn get(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}/{}", self.base_url, table);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;
        check_status(resp).await
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    async fn fetch_items(&self, job_id: &str) -> Result<Vec<WorkItem>, StoreError> {
        let order_filter = format!("eq.{}", job_id);
        let resp = self
            .get(
                "images",
                &[
                    ("order_id", order_filter.as_str()),
                    ("select", IMAGE_COLUMNS),
                ],
            )
            .await?;
        let rows: Vec<ImageRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(rows.into_iter().map(WorkItem::from).collect())
    }

    async fn fetch_metadata(&self, job_id: &str) -> Result<Option<JobMetadata>, StoreError> {
        let id_filter = format!("eq.{}", job_id);
        let resp = self
            .get("orders", &[("id", id_filter.as_str()), ("limit", "1")])
            .await?;
        let rows: Vec<OrderRow> = resp
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        Ok(rows.into_iter().next().map(|row| JobMetadata {
            requires_custom_analysis: row.requires_custom_analysis.unwrap_or(false),
            requester_tier: row
                .user_tier
                .as_deref()
                .and_then(known_variant::<RequesterTier>)
                .unwrap_or_default(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.get("orders", &[("select", "id"), ("limit", "1")])
            .await
            .map(|_| ())
    }
}

/// Blob store probed by listing one object of a bucket.
pub struct RestBlobStore {
    base_url: String,
    bucket: String,
    service_key: String,
    client: reqwest::Client,
}

impl RestBlobStore {
    pub fn new(
        base_url: &str,
        bucket: &str,
        service_key: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let url = format!("{}/object/list/{}", self.base_url, self.bucket);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "limit": 1, "prefix": "" }))
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;
        check_status(resp).await.map(|_| ())
    }
}

/// In-process job store used in mock mode and tests.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, (Vec<WorkItem>, Option<JobMetadata>)>>,
    unresponsive: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job.
    pub fn insert_job(&self, job_id: &str, items: Vec<WorkItem>, metadata: Option<JobMetadata>) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.insert(job_id.to_string(), (items, metadata));
        }
    }

    /// Make `ping` (and reads) fail, simulating an outage.
    pub fn set_responsive(&self, responsive: bool) {
        self.unresponsive.store(!responsive, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.unresponsive.load(Ordering::SeqCst) {
            return Err(StoreError::RequestFailed("store unavailable".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, JobMap>, StoreError> {
        self.jobs
            .read()
            .map_err(|_| StoreError::RequestFailed("store lock poisoned".to_string()))
    }
}

type JobMap = HashMap<String, (Vec<WorkItem>, Option<JobMetadata>)>;

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn fetch_items(&self, job_id: &str) -> Result<Vec<WorkItem>, StoreError> {
        self.check_up()?;
        Ok(self
            .read()?
            .get(job_id)
            .map(|(items, _)| items.clone())
            .unwrap_or_default())
    }

    async fn fetch_metadata(&self, job_id: &str) -> Result<Option<JobMetadata>, StoreError> {
        self.check_up()?;
        Ok(self.read()?.get(job_id).and_then(|(_, meta)| meta.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_up()
    }
}

/// Answers every job with the same set of pending items. Used in mock mode.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticJobStore {
    pub items_per_job: u32,
    pub item_bytes: u64,
}

impl Default for SyntheticJobStore {
    fn default() -> Self {
        Self {
            items_per_job: 1,
            item_bytes: 2 * 1024 * 1024,
        }
    }
}

#[async_trait]
impl JobStore for SyntheticJobStore {
    async fn fetch_items(&self, job_id: &str) -> Result<Vec<WorkItem>, StoreError> {
        Ok((0..self.items_per_job)
            .map(|n| WorkItem {
                id: format!("{}-item-{}", job_id, n + 1),
                job_id: job_id.to_string(),
                size_bytes: self.item_bytes,
                status: ItemStatus::Pending,
                retry_count: 0,
                error_message: None,
            })
            .collect())
    }

    async fn fetch_metadata(&self, _job_id: &str) -> Result<Option<JobMetadata>, StoreError> {
        Ok(None)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Blob store with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticBlobStore {
    pub accessible: bool,
}

#[async_trait]
impl BlobStore for StaticBlobStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.accessible {
            Ok(())
        } else {
            Err(StoreError::RequestFailed("bucket not accessible".to_string()))
        }
    }
}
