//! StudyOwl Common Library
//!
//! Shared code for the StudyOwl services including:
//! - Error types and handling
//! - Configuration management
//! - Identity provider clients and the auth extractor
//! - Generative-language API clients (generation, embeddings, file storage)
//! - Per-user document store (Postgres + pgvector, or in-memory)
//! - Quiz and customisation domain types
//! - Metrics

pub mod auth;
pub mod config;
pub mod customisation;
pub mod db;
pub mod errors;
pub mod genai;
pub mod metrics;
pub mod quiz;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use genai::{Embedder, Generator};
pub use store::StudyStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
