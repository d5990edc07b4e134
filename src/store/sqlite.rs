//! SQLite implementation of TaskStore.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{RecordStream, TaskError, TaskStore};
use crate::task::TaskRecord;

/// Default table holding ledger rows.
pub const DEFAULT_TABLE_NAME: &str = "ledger_tasks";

/// Connection options for the SQLite-backed store.
///
/// Anything beyond these knobs (journal mode, pragmas) is configured on the
/// pool directly; build one with [`SqlitePoolOptions`] and hand it to
/// [`SqliteTaskStore::new`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite connection URL, e.g. `sqlite://tasks.db` or `sqlite::memory:`.
    pub url: String,
    /// Table holding the ledger rows. Defaults to `ledger_tasks`; set a
    /// different name to keep several independent ledgers in one database.
    pub table_name: String,
    /// Maximum pool connections.
    ///
    /// Keep this at 2 or more: an open `all` stream holds one pooled
    /// connection while consumers issue `store`/`delete` calls against the
    /// same pool, so a pool of 1 stalls those calls until the stream is
    /// dropped.
    pub max_connections: u32,
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// See the field note: values below 2 can stall mixed stream/write use.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// SQLite-backed task store.
///
/// One row per task, keyed by `(task_list, id)`. The write path serializes
/// the record's `data` map to a JSON column; the read path decodes it back
/// before handing records to the caller.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteTaskStore {
    /// Create a new SqliteTaskStore over an existing pool, using the
    /// default table name.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Use a different ledger table on the same pool.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Connect a pool from config and wrap it.
    pub async fn connect(config: &StoreConfig) -> Result<Self, TaskError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| TaskError::Storage(e.to_string()))?
            .busy_timeout(config.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| TaskError::Storage(e.to_string()))?;
        Ok(Self::new(pool).with_table_name(config.table_name.clone()))
    }

    /// Run migrations to create the ledger table.
    pub async fn run_migrations(&self) -> Result<(), TaskError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                task_list TEXT NOT NULL,
                id TEXT NOT NULL,
                task_type TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (task_list, id)
            )
            "#,
            table = self.table_name,
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        sqlx::query(&format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_{table}_list
            ON {table}(task_list)
            "#,
            table = self.table_name,
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        Ok(())
    }
}

fn decode_row(task_list: String, id: String, task_type: String, data: String) -> Result<TaskRecord, TaskError> {
    let data = serde_json::from_str(&data)
        .map_err(|e| TaskError::Serialization(format!("data column for {task_list}/{id}: {e}")))?;
    Ok(TaskRecord {
        task_list,
        id,
        task_type,
        data,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn store(&self, record: &TaskRecord) -> Result<(), TaskError> {
        let data = serde_json::to_string(&record.data)
            .map_err(|e| TaskError::Serialization(e.to_string()))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (task_list, id, task_type, data)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(task_list, id) DO UPDATE
            SET task_type = excluded.task_type, data = excluded.data
            "#,
            table = self.table_name,
        ))
        .bind(&record.task_list)
        .bind(&record.id)
        .bind(&record.task_type)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        debug!(task_list = %record.task_list, id = %record.id, "stored task");
        Ok(())
    }

    async fn find(&self, task_list: &str, id: &str) -> Result<Option<TaskRecord>, TaskError> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(&format!(
            r#"
            SELECT task_list, id, task_type, data FROM {table}
            WHERE task_list = ? AND id = ?
            "#,
            table = self.table_name,
        ))
        .bind(task_list)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TaskError::Storage(e.to_string()))?;

        row.map(|(task_list, id, task_type, data)| decode_row(task_list, id, task_type, data))
            .transpose()
    }

    fn all(&self, task_list: &str) -> RecordStream {
        let pool = self.pool.clone();
        let task_list = task_list.to_string();
        let query = format!(
            "SELECT task_list, id, task_type, data FROM {table} WHERE task_list = ?",
            table = self.table_name,
        );

        Box::pin(async_stream::try_stream! {
            let mut rows = sqlx::query(&query)
                .bind(task_list)
                .fetch(&pool);

            while let Some(row) = rows
                .try_next()
                .await
                .map_err(|e| TaskError::Storage(e.to_string()))?
            {
                let record = decode_row(
                    row.get(0),
                    row.get(1),
                    row.get(2),
                    row.get(3),
                )?;
                yield record;
            }
        })
    }

    async fn delete(&self, task_list: &str, id: &str) -> Result<(), TaskError> {
        sqlx::query(&format!(
            "DELETE FROM {table} WHERE task_list = ? AND id = ?",
            table = self.table_name,
        ))
            .bind(task_list)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| TaskError::Storage(e.to_string()))?;

        debug!(task_list, id, "deleted task");
        Ok(())
    }
}
