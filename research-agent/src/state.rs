use crate::pipeline::PipelinePhase;
use crate::types::{ResearchState, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Snapshot of a run taken after a stage completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: Uuid,
    pub completed: PipelinePhase,
    pub state: ResearchState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: Uuid, completed: PipelinePhase, state: ResearchState) -> Self {
        Self {
            run_id,
            completed,
            state,
            saved_at: Utc::now(),
        }
    }

    /// The phase a resumed run starts from.
    pub fn resume_phase(&self) -> PipelinePhase {
        self.completed.next()
    }
}

/// Persistence for run checkpoints. Each run keeps only its latest snapshot.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>>;
}

/// In-process store; checkpoints live as long as the store.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<Uuid, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(checkpoint.run_id, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.read().await;
        Ok(checkpoints.get(&run_id).cloned())
    }
}

/// SQLite-backed store so runs can be resumed after the process exits.
pub struct SqliteCheckpointStore {
    db: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) a checkpoint database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Opened checkpoint database at {}", path.as_ref().display());
        Self::with_pool(db).await
    }

    /// A private in-memory database, mostly useful in tests.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to `sqlite::memory:` is its own database, so the
        // pool must hold exactly one connection for its whole lifetime.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(db).await
    }

    pub async fn with_pool(db: SqlitePool) -> Result<Self> {
        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS research_checkpoints (
                run_id TEXT PRIMARY KEY,
                completed_phase TEXT NOT NULL,
                checkpoint_json TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let checkpoint_json = serde_json::to_string(checkpoint)?;

        sqlx::query(
            r#"
            INSERT INTO research_checkpoints (run_id, completed_phase, checkpoint_json, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (run_id) DO UPDATE SET
                completed_phase = excluded.completed_phase,
                checkpoint_json = excluded.checkpoint_json,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(checkpoint.run_id.to_string())
        .bind(checkpoint.completed.as_str())
        .bind(checkpoint_json)
        .bind(checkpoint.saved_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        debug!(
            "Saved checkpoint for run {} after {}",
            checkpoint.run_id, checkpoint.completed
        );
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT checkpoint_json
            FROM research_checkpoints
            WHERE run_id = ?1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let checkpoint_json: String = row.try_get("checkpoint_json")?;
                Ok(Some(serde_json::from_str(&checkpoint_json)?))
            }
            None => Ok(None),
        }
    }
}
