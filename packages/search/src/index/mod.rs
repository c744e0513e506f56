//! Namespaced nearest-neighbour storage.

mod memory;
mod remote;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::InMemoryVectorIndex;
pub use remote::RemoteVectorIndex;

use crate::config::{IndexBackendKind, SearchAppConfig};
use crate::error::IndexError;

pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A query hit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub image_id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Conjunction of metadata equality constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    equals: BTreeMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.equals.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.equals.iter()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// Storage for fixed-length vectors, partitioned by namespace.
///
/// Upsert and delete are idempotent and safe to retry.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), IndexError>;

    /// `None` when the id is unknown.
    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, IndexError>;

    /// Top `top_k` records matching `filter`, by descending cosine similarity.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, IndexError>;

    /// `false` when the id was not present.
    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, IndexError>;
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Build the index selected by configuration.
pub fn from_config(config: &SearchAppConfig) -> Result<Arc<dyn VectorIndex>, IndexError> {
    match config.index.backend {
        IndexBackendKind::Memory => Ok(Arc::new(InMemoryVectorIndex::new(config.dimension))),
        IndexBackendKind::Remote => {
            let host = config
                .index
                .host
                .as_deref()
                .ok_or_else(|| IndexError::Unavailable("no index host configured".into()))?;
            let index = RemoteVectorIndex::new(
                host,
                config.index.api_key.clone(),
                Duration::from_secs(config.index.timeout_secs),
            )?;
            Ok(Arc::new(index))
        }
    }
}
