//! Task entity: identity, serialized form, and the execution contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::interface::Interface;
use crate::store::TaskError;

/// Identity shared by every task: the list it belongs to and its id,
/// unique within that list. `(task_list, id)` is the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub task_list: String,
    pub id: String,
}

impl TaskMeta {
    /// Create a meta with a freshly generated random hex id.
    ///
    /// Rejects an empty `task_list` - a task without a list can never be
    /// found again, so we refuse to build one.
    pub fn new(task_list: impl Into<String>) -> Result<Self, TaskError> {
        Self::with_id(task_list, random_token())
    }

    /// Create a meta with an explicit id.
    pub fn with_id(
        task_list: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, TaskError> {
        let task_list = task_list.into();
        let id = id.into();
        if task_list.is_empty() {
            return Err(TaskError::InvalidTask("task_list must not be empty".into()));
        }
        if id.is_empty() {
            return Err(TaskError::InvalidTask("id must not be empty".into()));
        }
        Ok(Self { task_list, id })
    }
}

/// Generate a random 128-bit hex token for task ids.
fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The flat at-rest representation of a task.
///
/// This is the wire/storage contract: `task_list`, `id`, `type`, and a
/// string-keyed `data` map of arbitrary JSON values. `as_record` and
/// `from_record` on concrete task types must round-trip through this exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_list: String,
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub data: BTreeMap<String, serde_json::Value>,
}

impl TaskRecord {
    /// Identity of the recorded task.
    pub fn meta(&self) -> Result<TaskMeta, TaskError> {
        TaskMeta::with_id(&self.task_list, &self.id)
    }

    /// Deserialize the whole `data` map into a typed payload struct.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| TaskError::Serialization(e.to_string()))
    }

    /// Serialize a typed payload struct into a `data` map.
    pub fn data_from<T: Serialize>(payload: &T) -> Result<BTreeMap<String, serde_json::Value>, TaskError> {
        match serde_json::to_value(payload).map_err(|e| TaskError::Serialization(e.to_string()))? {
            serde_json::Value::Object(object) => Ok(object.into_iter().collect()),
            other => Err(TaskError::Serialization(format!(
                "task payload must serialize to an object, got {other}"
            ))),
        }
    }
}

/// Options passed through to `execute`, opaque to the ledger itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteOptions(BTreeMap<String, serde_json::Value>);

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

/// The contract every concrete task type satisfies.
///
/// A task is a serializable unit of work. Its lifecycle:
///
/// 1. Built in memory, then saved through an [`Interface`], which records it
///    durably before anything executes it.
/// 2. Rediscovered later via `Interface::all` / `Interface::find`, which
///    revive typed instances from stored records.
/// 3. Executed by some consumer, then completed, which removes the record.
///
/// If the consumer crashes mid-execution the record survives, so a later
/// pass re-discovers and re-drives the task: at-least-once, not exactly-once.
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable string tag identifying the concrete type in storage.
    fn task_type(&self) -> &'static str;

    /// Identity of this task.
    fn meta(&self) -> &TaskMeta;

    /// The task-specific payload, as stored in the record's `data` column.
    ///
    /// Must be a pure function of the instance's current state.
    fn data(&self) -> BTreeMap<String, serde_json::Value>;

    /// Perform the work this task represents.
    ///
    /// The interface is passed explicitly so tasks that drive other tasks
    /// (see [`CompositeTask`](crate::CompositeTask)) use the same storage the
    /// caller does, rather than reaching for process-global state.
    async fn execute(
        &self,
        interface: &Interface,
        options: &ExecuteOptions,
    ) -> Result<serde_json::Value, TaskError>;

    fn task_list(&self) -> &str {
        &self.meta().task_list
    }

    fn id(&self) -> &str {
        &self.meta().id
    }

    /// Serialize this task to its flat storage form.
    fn as_record(&self) -> TaskRecord {
        let meta = self.meta();
        TaskRecord {
            task_list: meta.task_list.clone(),
            id: meta.id.clone(),
            task_type: self.task_type().to_string(),
            data: self.data(),
        }
    }
}

impl std::fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_type", &self.task_type())
            .field("task_list", &self.task_list())
            .field("id", &self.id())
            .finish()
    }
}

/// A task type that can be revived from its stored record.
///
/// Implementing this (rather than just [`Task`]) makes the type registrable
/// with [`TaskRegistry`](crate::TaskRegistry) under its `TYPE` tag.
/// `from_record` must invert `as_record`: reviving a task's own record yields
/// an attribute-equal instance of the same concrete type.
pub trait TaskType: Task + Sized + 'static {
    /// The stable tag written to the record's `type` field.
    const TYPE: &'static str;

    /// Reconstruct an instance from its stored record.
    fn from_record(record: TaskRecord) -> Result<Self, TaskError>;
}
