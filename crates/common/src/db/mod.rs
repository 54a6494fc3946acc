//! Database layer for StudyOwl
//!
//! Provides:
//! - SeaORM entity models
//! - The Postgres-backed study store
//! - Connection pool management and migrations

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::time::Duration;
use tracing::info;

/// Schema applied on startup when `database.run_migrations` is set
const MIGRATIONS: &[(&str, &str)] = &[("0001_init", include_str!("../../migrations/0001_init.sql"))];

const DIMENSION_PLACEHOLDER: &str = "{embedding_dimension}";

/// Migration SQL with the embedding column sized to `dimension`
fn render_migration(sql: &str, dimension: usize) -> String {
    sql.replace(DIMENSION_PLACEHOLDER, &dimension.to_string())
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);
    opts
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                let conn = Database::connect(connect_options(read_url, config))
                    .await
                    .map_err(|e| AppError::DatabaseConnection {
                        message: format!("Failed to connect to replica: {}", e),
                    })?;
                Some(conn)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Apply the bundled schema; every statement is idempotent
    pub async fn run_migrations(&self, dimension: usize) -> Result<()> {
        for (name, sql) in MIGRATIONS {
            info!(migration = name, dimension, "Applying migration");
            self.primary
                .execute_unprepared(&render_migration(sql, dimension))
                .await?;
        }
        Ok(())
    }

    /// Fail when the `notes.embedding` column was created for another dimension
    pub async fn check_embedding_dimension(&self, dimension: usize) -> Result<()> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT atttypmod FROM pg_attribute
            WHERE attrelid = 'notes'::regclass AND attname = 'embedding'
            "#,
        );
        let row = self.primary.query_one(stmt).await?.ok_or_else(|| AppError::Configuration {
            message: "notes.embedding column is missing; enable database.run_migrations".to_string(),
        })?;
        let column: i32 = row.try_get_by_index(0)?;

        if usize::try_from(column).ok() != Some(dimension) {
            return Err(AppError::Configuration {
                message: format!(
                    "notes.embedding holds {}-dimensional vectors but genai.dimension is {}",
                    column, dimension
                ),
            });
        }
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}
