//! Run-once bookkeeping for the startup reconciliation
//!
//! A run key names a ledger schema version. Once a pass under that key has
//! completed cleanly it is recorded, and `run_once` skips it from then on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

/// A completed run, as recorded
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RunRecord {
    pub run_key: String,
    pub completed_at: DateTime<Utc>,
    pub summary: serde_json::Value,
}

#[async_trait]
pub trait RunTracker: Send + Sync {
    async fn has_run(&self, key: &str) -> AppResult<bool>;

    async fn mark_run(&self, key: &str, summary: serde_json::Value) -> AppResult<()>;

    async fn last_run(&self, key: &str) -> AppResult<Option<RunRecord>>;
}

/// Run records kept in the `reconciliation_runs` table
#[derive(Clone)]
pub struct PgRunTracker {
    db: PgPool,
}

impl PgRunTracker {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RunTracker for PgRunTracker {
    async fn has_run(&self, key: &str) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reconciliation_runs WHERE run_key = $1",
        )
        .bind(key)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    async fn mark_run(&self, key: &str, summary: serde_json::Value) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_runs (run_key, completed_at, summary)
            VALUES ($1, NOW(), $2)
            ON CONFLICT (run_key)
            DO UPDATE SET completed_at = EXCLUDED.completed_at, summary = EXCLUDED.summary
            "#,
        )
        .bind(key)
        .bind(summary)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn last_run(&self, key: &str) -> AppResult<Option<RunRecord>> {
        let record = sqlx::query_as::<_, RunRecord>(
            "SELECT run_key, completed_at, summary FROM reconciliation_runs WHERE run_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }
}

/// Run records held in memory, for tests and databaseless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryRunTracker {
    runs: Arc<Mutex<HashMap<String, RunRecord>>>,
}

impl MemoryRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, RunRecord>>> {
        self.runs
            .lock()
            .map_err(|_| AppError::Internal("run tracker lock poisoned".to_string()))
    }
}

#[async_trait]
impl RunTracker for MemoryRunTracker {
    async fn has_run(&self, key: &str) -> AppResult<bool> {
        Ok(self.runs()?.contains_key(key))
    }

    async fn mark_run(&self, key: &str, summary: serde_json::Value) -> AppResult<()> {
        self.runs()?.insert(
            key.to_string(),
            RunRecord {
                run_key: key.to_string(),
                completed_at: Utc::now(),
                summary,
            },
        );
        Ok(())
    }

    async fn last_run(&self, key: &str) -> AppResult<Option<RunRecord>> {
        Ok(self.runs()?.get(key).cloned())
    }
}
