use std::sync::Arc;

use chrono::Utc;
use common::{ImageValidator, RetryPolicy, retry_with_backoff};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::config::SearchAppConfig;
use crate::embedding::{EmbeddingGenerator, EmbeddingMethod};
use crate::error::{IndexError, Result, SearchError};
use crate::index::{self, Metadata, MetadataFilter, SearchMatch, VectorIndex, VectorRecord};

pub const META_IMAGE_ID: &str = "image_id";
pub const META_TEAM_ID: &str = "team_id";
pub const META_EMBEDDING_METHOD: &str = "embedding_method";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_PROCESSED_AT: &str = "processed_at";
pub const META_ORIGINAL_METADATA: &str = "original_metadata";

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 100;

pub(crate) fn check_limit(limit: usize) -> Result<usize> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(SearchError::InvalidRequest(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

fn check_min_score(min_score: f32) -> Result<f32> {
    if !(0.0..=1.0).contains(&min_score) {
        return Err(SearchError::InvalidRequest(
            "min_score must be between 0.0 and 1.0".into(),
        ));
    }
    Ok(min_score)
}

fn team_value(team_id: i64) -> Value {
    Value::String(team_id.to_string())
}

/// Result of embedding one image. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<EmbeddingMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EmbeddingOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            embedding_id: None,
            method: None,
            model: None,
            reason: Some(reason.into()),
        }
    }
}

/// Embeds images and queries and answers team-scoped similarity searches.
pub struct SearchService {
    enabled: bool,
    generator: EmbeddingGenerator,
    index: Arc<dyn VectorIndex>,
    validator: ImageValidator,
    namespace: String,
    default_min_score: f32,
    retry: RetryPolicy,
}

impl SearchService {
    pub fn new(
        generator: EmbeddingGenerator,
        index: Arc<dyn VectorIndex>,
        validator: ImageValidator,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            enabled: true,
            generator,
            index,
            validator,
            namespace: namespace.into(),
            default_min_score: 0.5,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_min_score(mut self, min_score: f32) -> Self {
        self.default_min_score = min_score;
        self
    }

    /// Build from configuration. When search is disabled no model is loaded.
    pub fn from_config(
        config: &SearchAppConfig,
        environment: &str,
        validator: ImageValidator,
    ) -> std::result::Result<Self, IndexError> {
        let namespace = config.namespace_for(environment);
        let index = index::from_config(config)?;
        let generator = if config.enabled {
            EmbeddingGenerator::from_config(config)
        } else {
            warn!("Vector search is disabled, set search.enabled to turn it on");
            EmbeddingGenerator::new(config.dimension)
        };

        info!(
            enabled = config.enabled,
            namespace = %namespace,
            index = index.backend(),
            generator = ?generator,
            "Search service configured"
        );

        Ok(Self::new(generator, index, validator, namespace)
            .with_enabled(config.enabled)
            .with_default_min_score(config.default_min_score)
            .with_retry(RetryPolicy::new(config.upsert_retries)))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_min_score(&self) -> f32 {
        self.default_min_score
    }

    pub fn generator(&self) -> &EmbeddingGenerator {
        &self.generator
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    fn ensure_enabled(&self) -> Result<()> {
        if !self.enabled {
            return Err(SearchError::Disabled);
        }
        Ok(())
    }

    /// The only path to the index for reads. Every query is constrained to
    /// `team_id`, and matches are re-checked against it.
    async fn scoped_query(
        &self,
        vector: &[f32],
        team_id: i64,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>> {
        let team = team_value(team_id);
        let filter = MetadataFilter::new().eq(META_TEAM_ID, team.clone());
        let mut matches = self
            .index
            .query(&self.namespace, vector, &filter, top_k)
            .await?;

        let before = matches.len();
        matches.retain(|m| m.metadata.get(META_TEAM_ID) == Some(&team));
        if matches.len() != before {
            warn!(
                team_id,
                dropped = before - matches.len(),
                "Index returned matches outside the team filter"
            );
        }
        Ok(matches)
    }

    /// Semantic text-to-image search.
    ///
    /// `min_score` defaults to the configured threshold.
    pub async fn search_by_text(
        &self,
        query: &str,
        team_id: i64,
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchMatch>> {
        self.ensure_enabled()?;
        let limit = check_limit(limit)?;
        let min_score = check_min_score(min_score.unwrap_or(self.default_min_score))?;
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidRequest("query must not be empty".into()));
        }

        if !self.generator.supports_text() {
            warn!(generator = ?self.generator, "Text search requested without a text-capable model");
            return Err(SearchError::TextModelUnavailable);
        }

        info!(query, team_id, limit, "Searching by text");
        let embedding = self
            .generator
            .embed_text(query)
            .await
            .ok_or(SearchError::EmptyQuery)?;

        let mut matches = self.scoped_query(&embedding.values, team_id, limit).await?;
        matches.retain(|m| m.score >= min_score);
        matches.truncate(limit);
        debug!(results = matches.len(), "Text search complete");
        Ok(matches)
    }

    /// Visual search with an image that need not be stored.
    ///
    /// No threshold is applied unless `min_score` is given.
    pub async fn search_by_image(
        &self,
        data: &[u8],
        team_id: i64,
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<SearchMatch>> {
        self.ensure_enabled()?;
        let limit = check_limit(limit)?;
        let min_score = min_score.map(check_min_score).transpose()?;
        self.validator.validate(data)?;

        let embedding = self
            .generator
            .embed_image(data)
            .await
            .ok_or(SearchError::EmptyQuery)?;

        let mut matches = self.scoped_query(&embedding.values, team_id, limit).await?;
        if let Some(min_score) = min_score {
            matches.retain(|m| m.score >= min_score);
        }
        matches.truncate(limit);
        Ok(matches)
    }

    /// Images similar to an already indexed one, excluding itself.
    pub async fn search_similar(
        &self,
        image_id: &str,
        team_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchMatch>> {
        self.ensure_enabled()?;
        let limit = check_limit(limit)?;

        let reference = self
            .index
            .fetch(&self.namespace, image_id)
            .await?
            .filter(|r| r.metadata.get(META_TEAM_ID) == Some(&team_value(team_id)))
            .ok_or_else(|| {
                warn!(image_id, team_id, "Reference image vector not found");
                SearchError::ReferenceNotFound(image_id.to_string())
            })?;

        let mut matches = self
            .scoped_query(&reference.values, team_id, limit + 1)
            .await?;
        matches.retain(|m| m.image_id != image_id);
        matches.truncate(limit);
        Ok(matches)
    }

    /// Embed `data` and store the vector under `image_id`.
    ///
    /// Never fails: problems are logged and reported in the outcome so the
    /// upload flow is unaffected.
    pub async fn process_embedding(
        &self,
        data: &[u8],
        image_id: &str,
        team_id: i64,
        metadata: Metadata,
    ) -> EmbeddingOutcome {
        if !self.enabled {
            warn!(image_id, "Skipping embedding, vector search is disabled");
            return EmbeddingOutcome::failed("Vector search disabled");
        }

        let Some(embedding) = self.generator.embed_image(data).await else {
            return EmbeddingOutcome::failed("Failed to generate embedding");
        };

        let mut vector_metadata = Metadata::new();
        vector_metadata.insert(META_IMAGE_ID.into(), json!(image_id));
        vector_metadata.insert(META_TEAM_ID.into(), team_value(team_id));
        vector_metadata.insert(META_EMBEDDING_METHOD.into(), json!(embedding.method));
        vector_metadata.insert(META_EMBEDDING_MODEL.into(), json!(embedding.model));
        vector_metadata.insert(META_PROCESSED_AT.into(), json!(Utc::now().timestamp()));
        vector_metadata.insert(META_ORIGINAL_METADATA.into(), Value::Object(metadata));

        let record = VectorRecord {
            id: image_id.to_string(),
            values: embedding.values,
            metadata: vector_metadata,
        };

        let index = &self.index;
        let namespace = self.namespace.as_str();
        let stored = retry_with_backoff(
            self.retry,
            "vector upsert",
            IndexError::is_retryable,
            move |_| index.upsert(namespace, record.clone()),
        )
        .await;

        match stored {
            Ok(()) => {
                info!(
                    image_id,
                    namespace,
                    method = %embedding.method,
                    "Stored embedding"
                );
                EmbeddingOutcome {
                    success: true,
                    embedding_id: Some(image_id.to_string()),
                    method: Some(embedding.method),
                    model: Some(embedding.model),
                    reason: None,
                }
            }
            Err(e) => {
                error!(image_id, namespace, error = %e, "Failed to store embedding");
                EmbeddingOutcome::failed(e.to_string())
            }
        }
    }

    /// Remove the vector for `image_id`. `false` when none was stored or
    /// search is disabled.
    pub async fn delete_embedding(&self, image_id: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let removed = self.index.delete(&self.namespace, image_id).await?;
        if removed {
            info!(image_id, namespace = %self.namespace, "Deleted embedding");
        }
        Ok(removed)
    }
}
