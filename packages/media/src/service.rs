use std::sync::Arc;
use std::time::Duration;

use common::storage::{self, ObjectStore, StoredObject, Upload};
use search::tags::{TagQuery, TaggedImage, search_by_tags};
use search::worker::run_job;
use search::{
    EmbeddingJob, EmbeddingOutcome, EmbeddingQueue, EmbeddingSink, Metadata, SearchMatch,
    SearchService, spawn_embedding_worker,
};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::error::MediaError;

pub type Result<T> = std::result::Result<T, MediaError>;

/// Image storage and search for one deployment.
///
/// Holds the storage backend chosen at startup and the search service. Team
/// and user ids come from the caller's identity layer.
pub struct MediaService {
    storage: Arc<dyn ObjectStore>,
    search: Arc<SearchService>,
    url_ttl: Duration,
    queue_capacity: usize,
    queue: Option<EmbeddingQueue>,
}

impl MediaService {
    pub fn new(storage: Arc<dyn ObjectStore>, search: Arc<SearchService>) -> Self {
        Self {
            storage,
            search,
            url_ttl: storage::DEFAULT_URL_TTL,
            queue_capacity: 256,
            queue: None,
        }
    }

    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let storage = storage::from_config(&config.storage).await?;
        let search = SearchService::from_config(
            &config.search,
            &config.environment,
            config.storage.validator(),
        )
        .map_err(search::SearchError::from)?;

        info!(
            environment = %config.environment,
            storage = storage.backend(),
            search_enabled = search.is_enabled(),
            "Media service ready"
        );

        Ok(Self::new(storage, Arc::new(search))
            .with_url_ttl(Duration::from_secs(config.storage.url_ttl_secs))
            .with_queue_capacity(config.search.queue_capacity))
    }

    /// Start the deferred embedding worker. Jobs scheduled before this call
    /// are dropped.
    pub fn with_embedding_worker(mut self, sink: Arc<dyn EmbeddingSink>) -> (Self, JoinHandle<()>) {
        let (queue, handle) = spawn_embedding_worker(
            Arc::clone(&self.search),
            Arc::clone(&self.storage),
            sink,
            self.queue_capacity,
        );
        self.queue = Some(queue);
        (self, handle)
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStore> {
        &self.storage
    }

    pub fn search(&self) -> &Arc<SearchService> {
        &self.search
    }

    /// Validate and store an image.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(
        &self,
        data: &[u8],
        filename: Option<&str>,
        content_type: Option<&str>,
        team_id: i64,
        user_id: i64,
    ) -> Result<StoredObject> {
        let stored = self
            .storage
            .put(Upload {
                data,
                filename,
                content_type,
                team_id,
                user_id,
            })
            .await?;
        Ok(stored)
    }

    /// Hand a stored image to the background worker.
    ///
    /// Returns whether the job was queued. Failure to queue never affects the
    /// upload itself.
    pub fn schedule_embedding(
        &self,
        image_id: &str,
        team_id: i64,
        storage_path: &str,
        metadata: Metadata,
    ) -> bool {
        if !self.search.is_enabled() {
            return false;
        }
        let Some(queue) = &self.queue else {
            warn!(image_id, "No embedding worker running, skipping deferred embedding");
            return false;
        };

        let job = EmbeddingJob {
            image_id: image_id.to_string(),
            team_id,
            storage_path: storage_path.to_string(),
            metadata,
        };
        match queue.enqueue(job) {
            Ok(()) => true,
            Err(e) => {
                warn!(image_id, error = %e, "Failed to schedule embedding");
                false
            }
        }
    }

    /// Short-lived URL for a stored image, or the placeholder URL.
    pub async fn access_url(&self, storage_path: &str) -> String {
        self.storage.url_for(storage_path, self.url_ttl).await
    }

    /// Remove a stored object. `false` when it did not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, storage_path: &str) -> Result<bool> {
        Ok(self.storage.delete(storage_path).await?)
    }

    /// Remove an image's object and its vector.
    ///
    /// The vector is removed on a best-effort basis; the result reports
    /// whether the object existed.
    #[instrument(skip(self))]
    pub async fn delete_image(&self, storage_path: &str, image_id: &str) -> Result<bool> {
        let deleted = self.storage.delete(storage_path).await?;
        if !deleted {
            warn!(storage_path, "Storage file not found when deleting image");
        }
        if let Err(e) = self.search.delete_embedding(image_id).await {
            warn!(image_id, error = %e, "Failed to delete embedding");
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn search_by_text(
        &self,
        query: &str,
        team_id: i64,
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchMatch>> {
        Ok(self
            .search
            .search_by_text(query, team_id, limit, min_score)
            .await?)
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn search_by_image(
        &self,
        data: &[u8],
        team_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchMatch>> {
        Ok(self
            .search
            .search_by_image(data, team_id, limit, None)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn search_by_similar_id(
        &self,
        image_id: &str,
        team_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchMatch>> {
        Ok(self.search.search_similar(image_id, team_id, limit).await?)
    }

    /// Embed and index image bytes in the request path.
    #[instrument(skip(self, data, metadata), fields(size = data.len()))]
    pub async fn process_embedding(
        &self,
        data: &[u8],
        image_id: &str,
        team_id: i64,
        metadata: Metadata,
    ) -> EmbeddingOutcome {
        self.search
            .process_embedding(data, image_id, team_id, metadata)
            .await
    }

    /// Re-embed an already stored image.
    #[instrument(skip(self, metadata))]
    pub async fn reprocess_embedding(
        &self,
        storage_path: &str,
        image_id: &str,
        team_id: i64,
        metadata: Metadata,
    ) -> Result<EmbeddingOutcome> {
        if !self.search.is_enabled() {
            return Err(MediaError::SearchDisabled);
        }
        if !self.storage.exists(storage_path).await? {
            return Err(MediaError::NotFound("Image not found".into()));
        }

        let job = EmbeddingJob {
            image_id: image_id.to_string(),
            team_id,
            storage_path: storage_path.to_string(),
            metadata,
        };
        Ok(run_job(&self.search, self.storage.as_ref(), &job).await)
    }

    /// Rows of the caller's team carrying every requested tag.
    pub fn search_by_tags<'a, T, I>(
        &self,
        rows: I,
        team_id: i64,
        query: &TagQuery,
    ) -> Result<Vec<&'a T>>
    where
        T: TaggedImage + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        Ok(search_by_tags(rows, team_id, query)?)
    }
}
