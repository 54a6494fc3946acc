//! Configuration management for StudyOwl services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Which document store backs the per-user collections
    #[serde(default)]
    pub store: StoreConfig,

    /// Generative-language API configuration
    #[serde(default)]
    pub genai: GenAiConfig,

    /// Identity provider configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Notes, quiz and retrieval tuning
    #[serde(default)]
    pub study: StudyConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Media notes can take ten minutes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional)
    pub read_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply the bundled SQL migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenAiConfig {
    /// Provider: gemini, mock
    #[serde(default = "default_genai_provider")]
    pub provider: String,

    pub api_key: Option<String>,

    #[serde(default = "default_genai_base")]
    pub api_base: String,

    /// Model used for notes, quizzes, grading and answers
    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// How often an uploaded file is re-fetched while it is processing
    #[serde(default = "default_file_poll_interval")]
    pub file_poll_interval_secs: u64,

    /// Give up on a processing file after this long
    #[serde(default = "default_file_processing_timeout")]
    pub file_processing_timeout_secs: u64,

    /// Videos at or above this duration are rejected
    #[serde(default = "default_max_video_duration")]
    pub max_video_duration_secs: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    IdentityToolkit,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_identity_backend")]
    pub provider: IdentityBackend,

    /// Web API key of the managed identity project
    pub api_key: Option<String>,

    #[serde(default = "default_identity_base")]
    pub api_base: String,

    /// Signing secret for the local provider's tokens
    pub jwt_secret: Option<String>,

    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Sentences,
    Markdown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StudyConfig {
    /// Notes newer than this are preferred as quiz material
    #[serde(default = "default_recent_window")]
    pub recent_notes_window_minutes: i64,

    #[serde(default = "default_chunk_strategy")]
    pub chunk_strategy: ChunkStrategy,

    #[serde(default = "default_sentences_per_chunk")]
    pub sentences_per_chunk: usize,

    /// Character budget per chunk for the markdown strategy
    #[serde(default = "default_markdown_chunk_chars")]
    pub markdown_chunk_chars: usize,

    /// Number of note chunks handed to the model for a query
    #[serde(default = "default_query_limit")]
    pub query_limit: usize,

    /// Quiz size when the request leaves it out
    #[serde(default = "default_quiz_questions")]
    pub default_quiz_questions: u32,

    /// Largest quiz a request may ask for
    #[serde(default = "default_max_quiz_questions")]
    pub max_quiz_questions: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error), overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose /metrics in Prometheus format
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 660 }
fn default_max_upload_bytes() -> usize { 200 * 1024 * 1024 }
fn default_max_concurrent() -> usize { 64 }
fn default_database_url() -> String { "postgres://localhost/studyowl".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_store_backend() -> StoreBackend { StoreBackend::Postgres }
fn default_genai_provider() -> String { "gemini".to_string() }
fn default_genai_base() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_generation_model() -> String { "gemini-1.5-pro".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_generation_timeout() -> u64 { 600 }
fn default_file_poll_interval() -> u64 { 10 }
fn default_file_processing_timeout() -> u64 { 1800 }
fn default_max_video_duration() -> f64 { 7200.0 }
fn default_identity_backend() -> IdentityBackend { IdentityBackend::IdentityToolkit }
fn default_identity_base() -> String { "https://identitytoolkit.googleapis.com".to_string() }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_recent_window() -> i64 { 15 }
fn default_chunk_strategy() -> ChunkStrategy { ChunkStrategy::Sentences }
fn default_sentences_per_chunk() -> usize { 5 }
fn default_markdown_chunk_chars() -> usize { 1200 }
fn default_query_limit() -> usize { 5 }
fn default_quiz_questions() -> u32 { 10 }
fn default_max_quiz_questions() -> u32 { 50 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "studyowl".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Fully in-process configuration: memory store, mock model, local identity
    pub fn for_local_development() -> Self {
        let mut config = Self::default();
        config.store.backend = StoreBackend::Memory;
        config.genai.provider = "mock".to_string();
        config.auth.provider = IdentityBackend::Local;
        config.auth.jwt_secret = Some("local-development-secret".to_string());
        config.observability.json_logging = false;
        config.rate_limit.enabled = false;
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_enabled(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            provider: default_genai_provider(),
            api_key: None,
            api_base: default_genai_base(),
            model: default_generation_model(),
            embedding_model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_generation_timeout(),
            file_poll_interval_secs: default_file_poll_interval(),
            file_processing_timeout_secs: default_file_processing_timeout(),
            max_video_duration_secs: default_max_video_duration(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: default_identity_backend(),
            api_key: None,
            api_base: default_identity_base(),
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
        }
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            recent_notes_window_minutes: default_recent_window(),
            chunk_strategy: default_chunk_strategy(),
            sentences_per_chunk: default_sentences_per_chunk(),
            markdown_chunk_chars: default_markdown_chunk_chars(),
            query_limit: default_query_limit(),
            default_quiz_questions: default_quiz_questions(),
            max_quiz_questions: default_max_quiz_questions(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            store: StoreConfig::default(),
            genai: GenAiConfig::default(),
            auth: AuthConfig::default(),
            study: StudyConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.genai.model, "gemini-1.5-pro");
        assert_eq!(config.genai.embedding_model, "text-embedding-004");
        assert_eq!(config.study.sentences_per_chunk, 5);
        assert_eq!(config.study.recent_notes_window_minutes, 15);
        assert_eq!(config.study.query_limit, 5);
        assert_eq!(config.study.max_quiz_questions, 50);
    }

    #[test]
    fn test_local_development_profile() {
        let config = AppConfig::for_local_development();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.provider, IdentityBackend::Local);
        assert_eq!(config.genai.provider, "mock");
        assert!(config.auth.jwt_secret.is_some());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "server": { "port": 9000 },
            "store": { "backend": "memory" },
            "auth": { "provider": "local", "jwt_secret": "s" }
        }))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.auth.provider, IdentityBackend::Local);
        assert_eq!(config.genai.max_video_duration_secs, 7200.0);
    }
}
