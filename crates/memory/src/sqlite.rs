//! SQLite phrase backend.
//!
//! A single `phrases` table. The (trigger, response) pair is not declared
//! UNIQUE: uniqueness is enforced by the phrase store before inserting, and
//! the table stays a plain document collection like the other backends.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use trufa_core::error::StoreError;
use trufa_core::phrase::{PhraseCollection, PhraseEntry, PhraseFilter};

/// A SQLite phrase collection.
pub struct SqliteCollection {
    pool: SqlitePool,
}

impl SqliteCollection {
    /// Open (or create) a database file.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let collection = Self { pool };
        collection.run_migrations().await?;
        info!("SQLite phrase collection initialized at {path}");
        Ok(collection)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phrases (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                "trigger" TEXT NOT NULL,
                response  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("phrases table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_phrases_trigger ON phrases(\"trigger\")")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("trigger index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<PhraseEntry, StoreError> {
        let trigger: String = row
            .try_get("trigger")
            .map_err(|e| StoreError::QueryFailed(format!("trigger column: {e}")))?;
        let response: String = row
            .try_get("response")
            .map_err(|e| StoreError::QueryFailed(format!("response column: {e}")))?;
        Ok(PhraseEntry { trigger, response })
    }

    /// Build a WHERE clause for the set fields of a filter.
    fn where_clause(filter: &PhraseFilter) -> &'static str {
        match (&filter.trigger, &filter.response) {
            (Some(_), Some(_)) => r#"WHERE "trigger" = ?1 AND response = ?2"#,
            (Some(_), None) => r#"WHERE "trigger" = ?1"#,
            (None, Some(_)) => "WHERE response = ?1",
            (None, None) => "",
        }
    }
}

#[async_trait]
impl PhraseCollection for SqliteCollection {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, entry: PhraseEntry) -> Result<(), StoreError> {
        sqlx::query(r#"INSERT INTO phrases ("trigger", response) VALUES (?1, ?2)"#)
            .bind(&entry.trigger)
            .bind(&entry.response)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        debug!(trigger = %entry.trigger, "Stored phrase");
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<PhraseEntry>, StoreError> {
        let rows = sqlx::query(r#"SELECT "trigger", response FROM phrases ORDER BY id"#)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT all: {e}")))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn find_where(&self, filter: &PhraseFilter) -> Result<Vec<PhraseEntry>, StoreError> {
        let sql = format!(
            r#"SELECT "trigger", response FROM phrases {} ORDER BY id"#,
            Self::where_clause(filter)
        );

        let mut query = sqlx::query(&sql);
        if let Some(trigger) = &filter.trigger {
            query = query.bind(trigger);
        }
        if let Some(response) = &filter.response {
            query = query.bind(response);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("SELECT filtered: {e}")))?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn delete_where(&self, filter: &PhraseFilter) -> Result<usize, StoreError> {
        let sql = format!("DELETE FROM phrases {}", Self::where_clause(filter));

        let mut query = sqlx::query(&sql);
        if let Some(trigger) = &filter.trigger {
            query = query.bind(trigger);
        }
        if let Some(response) = &filter.response {
            query = query.bind(response);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        Ok(result.rows_affected() as usize)
    }
}
