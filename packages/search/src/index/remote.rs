use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{Metadata, MetadataFilter, SearchMatch, VectorIndex, VectorRecord};
use crate::error::IndexError;

/// Client for a Pinecone-compatible REST data plane.
pub struct RemoteVectorIndex {
    client: Client,
    host: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: [&'a VectorRecord; 1],
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    #[serde(skip_serializing_if = "Map::is_empty")]
    filter: Map<String, Value>,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: [&'a str; 1],
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, VectorRecord>,
}

/// `{"key": {"$eq": value}, ...}`; keys are implicitly AND-ed.
fn filter_expression(filter: &MetadataFilter) -> Map<String, Value> {
    filter
        .iter()
        .map(|(key, value)| (key.clone(), json!({ "$eq": value })))
        .collect()
}

impl RemoteVectorIndex {
    pub fn new(
        host: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unavailable(format!("failed to build client: {e}")))?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Api-Key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, IndexError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!(status = status.as_u16(), "Vector index unavailable");
            return Err(IndexError::Unavailable(format!("status {status}: {body}")));
        }
        Err(IndexError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl VectorIndex for RemoteVectorIndex {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn upsert(&self, namespace: &str, record: VectorRecord) -> Result<(), IndexError> {
        let body = UpsertRequest {
            vectors: [&record],
            namespace,
        };
        self.send(self.client.post(self.url("/vectors/upsert")).json(&body))
            .await?;
        debug!(namespace, id = %record.id, "Upserted vector");
        Ok(())
    }

    async fn fetch(&self, namespace: &str, id: &str) -> Result<Option<VectorRecord>, IndexError> {
        let response = self
            .send(
                self.client
                    .get(self.url("/vectors/fetch"))
                    .query(&[("ids", id), ("namespace", namespace)]),
            )
            .await?;
        let mut body: FetchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(body.vectors.remove(id))
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>, IndexError> {
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            filter: filter_expression(filter),
            include_metadata: true,
            include_values: false,
        };
        let response = self
            .send(self.client.post(self.url("/query")).json(&body))
            .await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| SearchMatch {
                image_id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }

    async fn delete(&self, namespace: &str, id: &str) -> Result<bool, IndexError> {
        // Delete succeeds for unknown ids, so look first to report presence.
        if self.fetch(namespace, id).await?.is_none() {
            return Ok(false);
        }
        let body = DeleteRequest {
            ids: [id],
            namespace,
        };
        self.send(self.client.post(self.url("/vectors/delete")).json(&body))
            .await?;
        debug!(namespace, id, "Deleted vector");
        Ok(true)
    }
}
