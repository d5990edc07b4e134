//! Registry mapping stored type tags back to concrete task types.

use std::collections::HashMap;
use std::sync::Arc;

use crate::store::TaskError;
use crate::task::{Task, TaskRecord, TaskType};

type ReviveFn = Arc<dyn Fn(TaskRecord) -> Result<Box<dyn Task>, TaskError> + Send + Sync>;

/// Resolves the `type` field of a stored record to a constructor.
///
/// Populated once at process start with every task type the process knows
/// how to execute. A record whose tag resolves to nothing yields
/// [`TaskError::UnknownType`] - a recoverable error the caller sees, not a
/// panic.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    revivers: HashMap<String, ReviveFn>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task type under its `TYPE` tag.
    pub fn register<T: TaskType>(&mut self) -> Result<(), TaskError> {
        self.register_with(T::TYPE, |record| {
            T::from_record(record).map(|task| Box::new(task) as Box<dyn Task>)
        })
    }

    /// Register a custom reviver under an explicit tag.
    ///
    /// The seam for tasks carrying state that does not live in the record,
    /// e.g. test tasks holding probes, or types whose construction needs
    /// process-local handles.
    pub fn register_with<F>(&mut self, tag: impl Into<String>, revive: F) -> Result<(), TaskError>
    where
        F: Fn(TaskRecord) -> Result<Box<dyn Task>, TaskError> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.revivers.contains_key(&tag) {
            return Err(TaskError::DuplicateType(tag));
        }
        self.revivers.insert(tag, Arc::new(revive));
        Ok(())
    }

    /// Reconstruct a typed task from its stored record.
    pub fn revive(&self, record: TaskRecord) -> Result<Box<dyn Task>, TaskError> {
        let revive = self
            .revivers
            .get(&record.task_type)
            .ok_or_else(|| TaskError::UnknownType(record.task_type.clone()))?;
        revive(record)
    }

    /// Tags registered so far.
    pub fn registered_types(&self) -> Vec<&str> {
        self.revivers.keys().map(String::as_str).collect()
    }
}
