//! Storage contract and error types.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryTaskStore;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteTaskStore, StoreConfig};

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::task::TaskRecord;

/// Error type for ledger operations.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Backend failure (connection loss, write failure). Propagated
    /// unchanged; retry policy belongs to the caller.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored record names a type tag no registered task type claims.
    #[error("unknown task type: {0}")]
    UnknownType(String),

    /// Two task types registered under the same tag.
    #[error("task type already registered: {0}")]
    DuplicateType(String),

    /// The task itself is malformed (empty key fields, missing data fields).
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// A task's own `execute` failed.
    #[error("task execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

impl TaskError {
    /// Wrap a task failure.
    pub fn execution(err: impl Into<anyhow::Error>) -> Self {
        Self::Execution(err.into())
    }
}

/// A lazy sequence of stored records. Nothing is fetched until polled.
pub type RecordStream = BoxStream<'static, Result<TaskRecord, TaskError>>;

/// Trait for durable task storage backends.
///
/// The ledger guarantees rest on three properties every implementation must
/// provide: `store` is an upsert on `(task_list, id)`, `delete` is a no-op
/// when the key is absent, and `all` issues a fresh query per call.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Write a record, overwriting any existing record with the same
    /// `(task_list, id)`. Last writer wins; re-saving during a retry is safe.
    async fn store(&self, record: &TaskRecord) -> Result<(), TaskError>;

    /// Fetch a single record by key. Absence is `Ok(None)`, not an error.
    async fn find(&self, task_list: &str, id: &str) -> Result<Option<TaskRecord>, TaskError>;

    /// All records under a task list, as a lazy stream in unspecified order.
    ///
    /// Each call runs an independent query; no snapshot isolation. Rows
    /// stored or deleted between the call and consumption may or may not
    /// be observed.
    fn all(&self, task_list: &str) -> RecordStream;

    /// Delete by key. Succeeds even if the record does not exist, so a
    /// completion interrupted mid-call can simply be re-issued.
    async fn delete(&self, task_list: &str, id: &str) -> Result<(), TaskError>;
}
