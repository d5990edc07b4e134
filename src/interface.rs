//! The single entry point task code talks to.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::registry::TaskRegistry;
use crate::store::{TaskError, TaskStore};
use crate::task::{Task, TaskRecord};

/// A lazy sequence of revived tasks.
pub type TaskStream = BoxStream<'static, Result<Box<dyn Task>, TaskError>>;

/// Facade over one storage adapter and one registry.
///
/// Adds no storage logic of its own; it exists so task code never names a
/// concrete adapter type. Both collaborators are injected at construction -
/// swap in a [`MemoryTaskStore`](crate::MemoryTaskStore) for tests, the
/// SQLite store for production - and the interface is cheap to clone and
/// share from there.
#[derive(Clone)]
pub struct Interface {
    store: Arc<dyn TaskStore>,
    registry: Arc<TaskRegistry>,
}

impl Interface {
    pub fn new(store: impl TaskStore + 'static, registry: TaskRegistry) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
        }
    }

    pub fn from_parts(store: Arc<dyn TaskStore>, registry: Arc<TaskRegistry>) -> Self {
        Self { store, registry }
    }

    /// Durably record a task. Upsert semantics: saving the same
    /// `(task_list, id)` again overwrites the previous record.
    pub async fn save(&self, task: &dyn Task) -> Result<(), TaskError> {
        let record = task.as_record();
        // A task built by hand (not through TaskMeta) could still carry
        // empty key fields; reject it before it becomes an unfindable row.
        record.meta()?;
        self.store.store(&record).await?;
        debug!(task_list = %record.task_list, id = %record.id, task_type = %record.task_type, "saved task");
        Ok(())
    }

    /// Save a freshly built task and hand it back: build-and-record in one
    /// step for producers that go on to use the instance.
    pub async fn create<T: Task>(&self, task: T) -> Result<T, TaskError> {
        self.save(&task).await?;
        Ok(task)
    }

    /// Store a raw record without going through a task instance.
    pub async fn store(&self, record: &TaskRecord) -> Result<(), TaskError> {
        record.meta()?;
        self.store.store(record).await
    }

    /// Fetch and revive one task. Absence is `Ok(None)`.
    pub async fn find(&self, task_list: &str, id: &str) -> Result<Option<Box<dyn Task>>, TaskError> {
        match self.store.find(task_list, id).await? {
            Some(record) => Ok(Some(self.registry.revive(record)?)),
            None => Ok(None),
        }
    }

    /// All tasks under a list, revived lazily as the stream is consumed.
    ///
    /// Order is unspecified; each call is an independent query.
    pub fn all(&self, task_list: &str) -> TaskStream {
        let registry = Arc::clone(&self.registry);
        Box::pin(
            self.store
                .all(task_list)
                .map(move |result| result.and_then(|record| registry.revive(record))),
        )
    }

    /// Retire a task: remove its record so it is no longer discoverable.
    ///
    /// Idempotent - completing an already-completed task is a no-op, so an
    /// interrupted completion can simply be re-issued.
    pub async fn complete(&self, task: &dyn Task) -> Result<(), TaskError> {
        self.delete(task.task_list(), task.id()).await
    }

    /// Remove a record by key. No-op if absent.
    pub async fn delete(&self, task_list: &str, id: &str) -> Result<(), TaskError> {
        self.store.delete(task_list, id).await?;
        debug!(task_list, id, "completed task");
        Ok(())
    }
}
