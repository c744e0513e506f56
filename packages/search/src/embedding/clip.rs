use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::clip::{ClipConfig, ClipModel};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use image::imageops::FilterType;
use tokenizers::Tokenizer;
use tracing::info;

use super::{EmbeddingMethod, EmbeddingStrategy};
use crate::error::EmbeddingError;

/// Output size of the ViT-B/32 projection heads.
pub const CLIP_DIMENSION: usize = 512;

fn model_err(e: impl Display) -> EmbeddingError {
    EmbeddingError::Model(e.to_string())
}

struct Loaded {
    model: ClipModel,
    config: ClipConfig,
    tokenizer: Tokenizer,
    device: Device,
}

impl Loaded {
    fn image_features(&self, data: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        let size = self.config.image_size;
        let image = image::load_from_memory(data)
            .map_err(|e| EmbeddingError::Decode(e.to_string()))?
            .resize_exact(size as u32, size as u32, FilterType::Triangle)
            .to_rgb8()
            .into_raw();

        let pixels = Tensor::from_vec(image, (size, size, 3), &self.device)
            .and_then(|t| t.permute((2, 0, 1)))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.affine(2.0 / 255.0, -1.0))
            .and_then(|t| t.unsqueeze(0))
            .map_err(model_err)?;

        let features = self.model.get_image_features(&pixels).map_err(model_err)?;
        normalized(&features)
    }

    fn text_features(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self.tokenizer.encode(text, true).map_err(model_err)?;
        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(self.config.text_config.max_position_embeddings);
        if ids.is_empty() {
            return Err(EmbeddingError::Empty);
        }

        let input = Tensor::new(ids.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(model_err)?;
        let features = self.model.get_text_features(&input).map_err(model_err)?;
        normalized(&features)
    }
}

/// Unit-length first row of a `(1, D)` feature tensor.
fn normalized(features: &Tensor) -> Result<Vec<f32>, EmbeddingError> {
    features
        .sqr()
        .and_then(|sq| sq.sum_keepdim(1))
        .and_then(|sum| sum.sqrt())
        .and_then(|norm| features.broadcast_div(&norm))
        .and_then(|t| t.squeeze(0))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(model_err)
}

/// CLIP ViT-B/32 running on the CPU. Image and text vectors share one space.
#[derive(Clone)]
pub struct ClipEmbedder {
    name: String,
    inner: Arc<Loaded>,
}

impl ClipEmbedder {
    /// Fetch weights and tokenizer from the model hub (cached on disk) and
    /// load them.
    pub fn load(model_id: &str, revision: &str) -> Result<Self, EmbeddingError> {
        let repo = Api::new()
            .map_err(model_err)?
            .repo(Repo::with_revision(
                model_id.to_string(),
                RepoType::Model,
                revision.to_string(),
            ));
        let weights = repo.get("model.safetensors").map_err(model_err)?;
        let tokenizer_file = repo.get("tokenizer.json").map_err(model_err)?;

        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(model_err)?;
        let device = Device::Cpu;
        let config = ClipConfig::vit_base_patch32();
        // SAFETY: the weights file is owned by the hub cache and not modified
        // while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(model_err)?;
        let model = ClipModel::new(vb, &config).map_err(model_err)?;

        info!(model = model_id, revision, "Loaded multimodal embedding model");

        Ok(Self {
            name: model_id.to_string(),
            inner: Arc::new(Loaded {
                model,
                config,
                tokenizer,
                device,
            }),
        })
    }
}

#[async_trait]
impl EmbeddingStrategy for ClipEmbedder {
    fn model(&self) -> &str {
        &self.name
    }

    fn method(&self) -> EmbeddingMethod {
        EmbeddingMethod::Multimodal
    }

    fn supports_text(&self) -> bool {
        true
    }

    async fn embed_image(&self, data: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        let inner = Arc::clone(&self.inner);
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || inner.image_features(&data))
            .await
            .map_err(|e| EmbeddingError::Task(e.to_string()))?
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.text_features(&text))
            .await
            .map_err(|e| EmbeddingError::Task(e.to_string()))?
    }
}
