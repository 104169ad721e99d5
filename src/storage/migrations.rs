//! Schema migrations for the PostgreSQL store.
//!
//! Each step in [`schema::MIGRATIONS`] runs in its own transaction together
//! with the row that records it in `schema_migrations`, so a failed step
//! leaves no trace and is retried on the next start.

use std::collections::HashSet;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use super::schema::{self, Migration};

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Bookkeeping query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A schema step was rejected by the database.
    #[error("Migration '{name}' failed: {reason}")]
    MigrationFailed { name: String, reason: String },
}

/// Applies missing schema steps in order.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    /// Creates a runner over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies every step not yet recorded. Returns how many ran.
    pub async fn run_migrations(&self) -> Result<usize, MigrationError> {
        self.ensure_bookkeeping().await?;

        let done: HashSet<String> = self.applied().await?.into_iter().collect();
        let pending: Vec<&Migration> = schema::MIGRATIONS
            .iter()
            .filter(|m| !done.contains(m.name))
            .collect();

        if pending.is_empty() {
            debug!("Schema up to date");
            return Ok(0);
        }

        for migration in &pending {
            self.apply(migration).await?;
        }

        Ok(pending.len())
    }

    /// Names of the recorded steps, oldest first.
    pub async fn applied(&self) -> Result<Vec<String>, MigrationError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM schema_migrations ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn ensure_bookkeeping(&self) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrationError::MigrationFailed {
                name: migration.name.to_string(),
                reason: e.to_string(),
            })?;

        sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1)")
            .bind(migration.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(migration = migration.name, "Applied migration");

        Ok(())
    }
}
