use std::collections::HashMap;

use async_trait::async_trait;
use image::DynamicImage;

use super::{EmbeddingMethod, EmbeddingStrategy};
use crate::error::EmbeddingError;

/// Longest edge images are downsampled to before counting colours.
const SAMPLE_EDGE: u32 = 128;
/// Low bits dropped from each channel when bucketing colours.
const CHANNEL_SHIFT: u8 = 4;

pub const MODEL_NAME: &str = "dominant-color-v1";

/// A colour cluster and its share of the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantColor {
    pub rgb: [u8; 3],
    /// Dominance relative to the most frequent colour, in (0, 1].
    pub score: f32,
    /// Fraction of sampled pixels in this cluster.
    pub pixel_fraction: f32,
}

impl DominantColor {
    /// `[r/255, g/255, b/255, score, pixel_fraction]`
    pub fn features(&self) -> [f32; 5] {
        [
            self.rgb[0] as f32 / 255.0,
            self.rgb[1] as f32 / 255.0,
            self.rgb[2] as f32 / 255.0,
            self.score,
            self.pixel_fraction,
        ]
    }
}

#[derive(Default)]
struct Bucket {
    count: u64,
    sum: [u64; 3],
}

/// Coarse image embedding from dominant-colour statistics.
///
/// Used when the multimodal model is unavailable. Vectors from this strategy
/// are not comparable with text embeddings.
#[derive(Debug, Clone)]
pub struct DominantColorEmbedder {
    max_colors: usize,
}

impl DominantColorEmbedder {
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors: max_colors.max(1),
        }
    }

    /// Most frequent colours, most dominant first. Fully transparent pixels
    /// are ignored.
    pub fn dominant_colors(&self, image: &DynamicImage) -> Vec<DominantColor> {
        let sample = if image.width() > SAMPLE_EDGE || image.height() > SAMPLE_EDGE {
            image.thumbnail(SAMPLE_EDGE, SAMPLE_EDGE)
        } else {
            image.clone()
        };

        let mut buckets: HashMap<u16, Bucket> = HashMap::new();
        let mut total: u64 = 0;
        for pixel in sample.to_rgba8().pixels() {
            let [r, g, b, a] = pixel.0;
            if a == 0 {
                continue;
            }
            let key = ((r >> CHANNEL_SHIFT) as u16) << 8
                | ((g >> CHANNEL_SHIFT) as u16) << 4
                | (b >> CHANNEL_SHIFT) as u16;
            let bucket = buckets.entry(key).or_default();
            bucket.count += 1;
            bucket.sum[0] += r as u64;
            bucket.sum[1] += g as u64;
            bucket.sum[2] += b as u64;
            total += 1;
        }

        let mut ranked: Vec<(u16, Bucket)> = buckets.into_iter().collect();
        // Ties break on the bucket key so output is deterministic.
        ranked.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then(ka.cmp(kb)));
        ranked.truncate(self.max_colors);

        let top = ranked.first().map(|(_, b)| b.count).unwrap_or(0);
        ranked
            .into_iter()
            .map(|(_, bucket)| {
                let mean = |channel: usize| {
                    ((bucket.sum[channel] as f64 / bucket.count as f64).round()) as u8
                };
                DominantColor {
                    rgb: [mean(0), mean(1), mean(2)],
                    score: bucket.count as f32 / top as f32,
                    pixel_fraction: bucket.count as f32 / total as f32,
                }
            })
            .collect()
    }

    /// Raw features, five per colour, before dimension fitting.
    pub fn features(&self, image: &DynamicImage) -> Vec<f32> {
        self.dominant_colors(image)
            .iter()
            .flat_map(DominantColor::features)
            .collect()
    }
}

#[async_trait]
impl EmbeddingStrategy for DominantColorEmbedder {
    fn model(&self) -> &str {
        MODEL_NAME
    }

    fn method(&self) -> EmbeddingMethod {
        EmbeddingMethod::DominantColor
    }

    async fn embed_image(&self, data: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
        let data = data.to_vec();
        let this = self.clone();
        let features = tokio::task::spawn_blocking(move || {
            let image =
                image::load_from_memory(&data).map_err(|e| EmbeddingError::Decode(e.to_string()))?;
            Ok::<_, EmbeddingError>(this.features(&image))
        })
        .await
        .map_err(|e| EmbeddingError::Task(e.to_string()))??;

        if features.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        Ok(features)
    }
}
