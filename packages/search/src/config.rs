use serde::Deserialize;

/// Which vector index backend to connect to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackendKind {
    /// Process-local index. Contents are lost on restart.
    #[default]
    Memory,
    /// Pinecone-compatible REST data plane.
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub backend: IndexBackendKind,
    /// Base URL of the index data plane. Required for the remote backend.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds. Default: 10.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::default(),
            host: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Search section of the application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchAppConfig {
    /// Whether embedding and vector search are enabled. Default: false.
    #[serde(default)]
    pub enabled: bool,
    /// Multimodal model identifier. Default: "openai/clip-vit-base-patch32".
    #[serde(default = "default_model")]
    pub model: String,
    /// Model repository revision to load weights from. Default: "refs/pr/15".
    #[serde(default = "default_model_revision")]
    pub model_revision: String,
    /// Length of every stored vector. Default: 512.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Index namespace. Default: "{environment}-images".
    #[serde(default)]
    pub namespace: Option<String>,
    /// Minimum score applied when a caller does not pass one. Default: 0.5.
    #[serde(default = "default_min_score")]
    pub default_min_score: f32,
    /// Dominant colours used by the fallback embedding. Default: 10.
    #[serde(default = "default_fallback_colors")]
    pub fallback_colors: usize,
    /// Retries for vector upserts. Default: 3.
    #[serde(default = "default_upsert_retries")]
    pub upsert_retries: u8,
    /// Capacity of the deferred embedding queue. Default: 256.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub index: IndexConfig,
}

fn default_model() -> String {
    "openai/clip-vit-base-patch32".into()
}
fn default_model_revision() -> String {
    "refs/pr/15".into()
}
fn default_dimension() -> usize {
    512
}
fn default_min_score() -> f32 {
    0.5
}
fn default_fallback_colors() -> usize {
    10
}
fn default_upsert_retries() -> u8 {
    3
}
fn default_queue_capacity() -> usize {
    256
}

impl Default for SearchAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            model_revision: default_model_revision(),
            dimension: default_dimension(),
            namespace: None,
            default_min_score: default_min_score(),
            fallback_colors: default_fallback_colors(),
            upsert_retries: default_upsert_retries(),
            queue_capacity: default_queue_capacity(),
            index: IndexConfig::default(),
        }
    }
}

impl SearchAppConfig {
    /// Namespace vectors are written to for the given deployment environment.
    pub fn namespace_for(&self, environment: &str) -> String {
        match &self.namespace {
            Some(ns) if !ns.trim().is_empty() => ns.clone(),
            _ => format!("{environment}-images"),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.default_min_score) {
            return Err("search.default_min_score must be between 0.0 and 1.0".into());
        }
        if self.dimension == 0 {
            return Err("search.dimension must be greater than zero".into());
        }
        #[cfg(feature = "clip")]
        if self.enabled && self.dimension != crate::embedding::CLIP_DIMENSION {
            return Err(format!(
                "search.dimension must be {} to match the multimodal model",
                crate::embedding::CLIP_DIMENSION
            ));
        }
        if self.queue_capacity == 0 {
            return Err("search.queue_capacity must be greater than zero".into());
        }
        if self.index.backend == IndexBackendKind::Remote
            && self.index.host.as_deref().is_none_or(|h| h.trim().is_empty())
        {
            return Err("search.index.host is required for the remote index".into());
        }
        Ok(())
    }
}
