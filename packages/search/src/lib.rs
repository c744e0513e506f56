//! Image embeddings and team-scoped vector search.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod service;
pub mod tags;
pub mod worker;

pub use config::{IndexBackendKind, IndexConfig, SearchAppConfig};
pub use embedding::{Embedding, EmbeddingGenerator, EmbeddingMethod, EmbeddingStrategy};
pub use error::{EmbeddingError, IndexError, SearchError};
pub use index::{Metadata, MetadataFilter, SearchMatch, VectorIndex, VectorRecord};
pub use service::{EmbeddingOutcome, SearchService};
pub use tags::{TagQuery, TaggedImage, search_by_tags};
pub use worker::{EmbeddingJob, EmbeddingQueue, EmbeddingSink, LogSink, spawn_embedding_worker};
