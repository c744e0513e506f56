//! Image and text embeddings.
//!
//! An [`EmbeddingGenerator`] runs an ordered chain of [`EmbeddingStrategy`]
//! implementations and stops at the first one that yields a vector. Whatever
//! the strategy, its output is passed through [`fit_to_dimension`] so every
//! vector handed to the index has exactly the configured length.

#[cfg(feature = "clip")]
mod clip;
mod palette;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[cfg(feature = "clip")]
pub use clip::{CLIP_DIMENSION, ClipEmbedder};
pub use palette::{DominantColor, DominantColorEmbedder};

use crate::config::SearchAppConfig;
use crate::error::EmbeddingError;

/// How a vector was produced. Stored with each vector so consumers can
/// discount low-fidelity embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMethod {
    /// Joint image/text model; text and image vectors are comparable.
    Multimodal,
    /// Dominant-colour statistics; image only, coarse.
    DominantColor,
}

impl EmbeddingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Multimodal => "multimodal",
            Self::DominantColor => "dominant_color",
        }
    }
}

impl fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of turning inputs into raw feature vectors.
///
/// Implementations must not share mutable state between calls.
#[async_trait]
pub trait EmbeddingStrategy: Send + Sync {
    /// Model identifier recorded with produced vectors.
    fn model(&self) -> &str;

    fn method(&self) -> EmbeddingMethod;

    /// Whether [`EmbeddingStrategy::embed_text`] is meaningful.
    fn supports_text(&self) -> bool {
        false
    }

    async fn embed_image(&self, data: &[u8]) -> Result<Vec<f32>, EmbeddingError>;

    async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unsupported("text"))
    }
}

/// A fixed-length vector and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
    pub method: EmbeddingMethod,
    pub model: String,
}

/// Pad with zeros or truncate so the result has exactly `dimension` values.
pub fn fit_to_dimension(mut values: Vec<f32>, dimension: usize) -> Vec<f32> {
    values.resize(dimension, 0.0);
    values
}

fn check_values(values: &[f32]) -> Result<(), EmbeddingError> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::Empty);
    }
    Ok(())
}

#[cfg(feature = "clip")]
fn primary_strategy(config: &SearchAppConfig) -> Option<Arc<dyn EmbeddingStrategy>> {
    if config.dimension != CLIP_DIMENSION {
        error!(
            dimension = config.dimension,
            expected = CLIP_DIMENSION,
            "Index dimension does not match the multimodal model, only the colour fallback is available"
        );
        return None;
    }
    match ClipEmbedder::load(&config.model, &config.model_revision) {
        Ok(clip) => Some(Arc::new(clip)),
        Err(e) => {
            error!(
                model = %config.model,
                error = %e,
                "Failed to load multimodal model, only the colour fallback is available"
            );
            None
        }
    }
}

#[cfg(not(feature = "clip"))]
fn primary_strategy(config: &SearchAppConfig) -> Option<Arc<dyn EmbeddingStrategy>> {
    warn!(
        model = %config.model,
        "Built without the `clip` feature, only the colour fallback is available"
    );
    None
}

/// Ordered chain of embedding strategies with a fixed output dimension.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    strategies: Vec<Arc<dyn EmbeddingStrategy>>,
    dimension: usize,
}

impl EmbeddingGenerator {
    pub fn new(dimension: usize) -> Self {
        Self {
            strategies: Vec::new(),
            dimension,
        }
    }

    /// Append a strategy; earlier strategies take precedence.
    pub fn with_strategy(mut self, strategy: Arc<dyn EmbeddingStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Build the default chain: the multimodal model when available, then
    /// the dominant-colour fallback.
    pub fn from_config(config: &SearchAppConfig) -> Self {
        let mut generator = Self::new(config.dimension);
        if let Some(primary) = primary_strategy(config) {
            generator = generator.with_strategy(primary);
        }
        generator.with_strategy(Arc::new(DominantColorEmbedder::new(config.fallback_colors)))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Arc<dyn EmbeddingStrategy>> {
        self.strategies.iter()
    }

    /// Whether any strategy can embed text queries.
    pub fn supports_text(&self) -> bool {
        self.strategies.iter().any(|s| s.supports_text())
    }

    fn finish(&self, strategy: &dyn EmbeddingStrategy, values: Vec<f32>) -> Embedding {
        Embedding {
            values: fit_to_dimension(values, self.dimension),
            method: strategy.method(),
            model: strategy.model().to_string(),
        }
    }

    /// Embed an image, falling through the chain on failure.
    ///
    /// Returns `None` when every strategy failed.
    pub async fn embed_image(&self, data: &[u8]) -> Option<Embedding> {
        for strategy in &self.strategies {
            let result = strategy
                .embed_image(data)
                .await
                .and_then(|values| check_values(&values).map(|()| values));
            match result {
                Ok(values) => return Some(self.finish(strategy.as_ref(), values)),
                Err(e) => warn!(
                    model = strategy.model(),
                    error = %e,
                    "Image embedding strategy failed, trying next"
                ),
            }
        }
        error!("All image embedding strategies failed");
        None
    }

    /// Embed a text query with the first text-capable strategy that succeeds.
    pub async fn embed_text(&self, text: &str) -> Option<Embedding> {
        for strategy in self.strategies.iter().filter(|s| s.supports_text()) {
            let result = strategy
                .embed_text(text)
                .await
                .and_then(|values| check_values(&values).map(|()| values));
            match result {
                Ok(values) => return Some(self.finish(strategy.as_ref(), values)),
                Err(e) => warn!(
                    model = strategy.model(),
                    error = %e,
                    "Text embedding strategy failed"
                ),
            }
        }
        error!("Failed to generate text embedding");
        None
    }
}

impl fmt::Debug for EmbeddingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.model()).collect::<Vec<_>>(),
            )
            .field("dimension", &self.dimension)
            .finish()
    }
}
