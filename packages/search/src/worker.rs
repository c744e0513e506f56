//! Deferred embedding of stored images.
//!
//! Uploads hand an [`EmbeddingJob`] to an [`EmbeddingQueue`] and return. A
//! background task reads the stored bytes back, runs
//! [`SearchService::process_embedding`] and reports the outcome to an
//! [`EmbeddingSink`], typically the layer that persists image rows.

use std::sync::Arc;

use async_trait::async_trait;
use common::storage::ObjectStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Result, SearchError};
use crate::index::Metadata;
use crate::service::{EmbeddingOutcome, SearchService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub image_id: String,
    pub team_id: i64,
    pub storage_path: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Receives the result of each deferred job.
#[async_trait]
pub trait EmbeddingSink: Send + Sync {
    async fn record(&self, job: &EmbeddingJob, outcome: &EmbeddingOutcome);
}

/// Sink that only logs outcomes.
pub struct LogSink;

#[async_trait]
impl EmbeddingSink for LogSink {
    async fn record(&self, job: &EmbeddingJob, outcome: &EmbeddingOutcome) {
        info!(
            image_id = %job.image_id,
            success = outcome.success,
            reason = outcome.reason.as_deref().unwrap_or(""),
            "Embedding job finished"
        );
    }
}

/// Sending half of the deferred embedding queue.
#[derive(Clone)]
pub struct EmbeddingQueue {
    tx: mpsc::Sender<EmbeddingJob>,
}

impl EmbeddingQueue {
    /// Queue a job without waiting. Fails when the queue is full or the
    /// worker has stopped.
    pub fn enqueue(&self, job: EmbeddingJob) -> Result<()> {
        self.tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) => {
                warn!(image_id = %job.image_id, "Embedding queue is full");
                SearchError::QueueUnavailable("queue is full".into())
            }
            TrySendError::Closed(_) => SearchError::QueueUnavailable("worker stopped".into()),
        })
    }
}

/// Run one job to completion. Storage failures become failed outcomes.
pub async fn run_job(
    service: &SearchService,
    storage: &dyn ObjectStore,
    job: &EmbeddingJob,
) -> EmbeddingOutcome {
    let data = match storage.read(&job.storage_path).await {
        Ok(data) => data,
        Err(e) => {
            error!(
                image_id = %job.image_id,
                path = %job.storage_path,
                error = %e,
                "Failed to read stored image for embedding"
            );
            return EmbeddingOutcome::failed(format!("Failed to read stored image: {e}"));
        }
    };

    service
        .process_embedding(&data, &job.image_id, job.team_id, job.metadata.clone())
        .await
}

/// Start the background worker. It stops once every queue handle is dropped.
pub fn spawn_embedding_worker(
    service: Arc<SearchService>,
    storage: Arc<dyn ObjectStore>,
    sink: Arc<dyn EmbeddingSink>,
    capacity: usize,
) -> (EmbeddingQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<EmbeddingJob>(capacity.max(1));

    let handle = tokio::spawn(async move {
        info!(capacity, "Embedding worker started");
        let mut processed: u64 = 0;
        while let Some(job) = rx.recv().await {
            let outcome = run_job(&service, storage.as_ref(), &job).await;
            sink.record(&job, &outcome).await;
            processed += 1;
        }
        info!(processed, "Embedding worker stopped");
    });

    (EmbeddingQueue { tx }, handle)
}
