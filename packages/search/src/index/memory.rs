use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{MetadataFilter, SearchMatch, VectorIndex, VectorRecord, cosine_similarity};
use crate::error::IndexError;

/// Exhaustive-scan index held in process memory.
///
/// Suitable for development, tests and small deployments. Contents are lost
/// on restart.
pub struct InMemoryVectorIndex {
    dimension: usize,
    namespaces: DashMap<String, HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            namespaces: DashMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors stored in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces.get(namespace).map_or(0, |ns| ns.len())
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    fn check_dimension(&self, values: &[f32]) -> Result<(), IndexError> {
        if values.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), IndexError> {
        self.check_dimension(&record.values)?;
        debug!(namespace, id = %record.id, "Upserting vector");
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, IndexError> {
        Ok(self
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.get(id).cloned()))
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, IndexError> {
        self.check_dimension(vector)?;
        let Some(ns) = self.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<SearchMatch> = ns
            .values()
            .filter(|record| filter.matches(&record.metadata))
            .map(|record| SearchMatch {
                image_id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();
        drop(ns);

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.image_id.cmp(&b.image_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, IndexError> {
        let removed = self
            .namespaces
            .get_mut(namespace)
            .is_some_and(|mut ns| ns.remove(id).is_some());
        debug!(namespace, id, removed, "Deleted vector");
        Ok(removed)
    }
}
