//! Team-partitioned image storage with semantic search.
//!
//! [`MediaService`] is the entry point for callers. It validates and stores
//! uploads through the configured object store, hands out short-lived access
//! URLs, and answers text, image, similar-image and tag queries scoped to the
//! caller's team.

pub mod config;
pub mod error;
pub mod service;

pub use config::AppConfig;
pub use error::MediaError;
pub use service::MediaService;

pub use common::storage::{ObjectStore, StoredObject};
pub use search::tags::{TagQuery, TaggedImage};
pub use search::{EmbeddingOutcome, EmbeddingSink, LogSink, Metadata, SearchMatch};
