//! In-memory implementation of TaskStore.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use super::{RecordStream, TaskError, TaskStore};
use crate::task::TaskRecord;

/// In-memory task store.
///
/// The substitution target the interface's injection point exists for:
/// tests and single-process tools use this where production code uses the
/// SQLite store. Keyed by `(task_list, id)`; iteration order is the key
/// order, which makes sequencing in tests deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    records: Arc<Mutex<BTreeMap<(String, String), TaskRecord>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored across all task lists.
    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn store(&self, record: &TaskRecord) -> Result<(), TaskError> {
        let key = (record.task_list.clone(), record.id.clone());
        self.records
            .lock()
            .expect("store lock poisoned")
            .insert(key, record.clone());
        Ok(())
    }

    async fn find(&self, task_list: &str, id: &str) -> Result<Option<TaskRecord>, TaskError> {
        let key = (task_list.to_string(), id.to_string());
        Ok(self
            .records
            .lock()
            .expect("store lock poisoned")
            .get(&key)
            .cloned())
    }

    fn all(&self, task_list: &str) -> RecordStream {
        let records = Arc::clone(&self.records);
        let task_list = task_list.to_string();

        // Snapshot at first poll, not at call time, so the stream is a
        // description of a query rather than a materialized result.
        Box::pin(
            stream::once(async move {
                let matching: Vec<TaskRecord> = records
                    .lock()
                    .expect("store lock poisoned")
                    .range((task_list.clone(), String::new())..)
                    .take_while(|((list, _), _)| *list == task_list)
                    .map(|(_, record)| record.clone())
                    .collect();
                stream::iter(matching.into_iter().map(Ok))
            })
            .flatten(),
        )
    }

    async fn delete(&self, task_list: &str, id: &str) -> Result<(), TaskError> {
        let key = (task_list.to_string(), id.to_string());
        self.records
            .lock()
            .expect("store lock poisoned")
            .remove(&key);
        Ok(())
    }
}
