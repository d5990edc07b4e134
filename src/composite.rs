//! A task whose work is to drain another task list.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::interface::Interface;
use crate::store::TaskError;
use crate::task::{ExecuteOptions, Task, TaskMeta, TaskRecord, TaskType};

#[derive(Debug, Deserialize)]
struct CompositePayload {
    child_task_list: String,
}

/// Executes and completes every task currently stored under a child list.
///
/// Per child, in enumeration order: execute, then complete immediately on
/// success. The first child failure propagates and stops the drive;
/// already-completed children stay completed, the failing child and any
/// after it keep their ledger rows. Re-running the composite therefore
/// resumes with whatever is still stored rather than restarting.
///
/// The composite is itself a task, so child lists can reference and drain
/// other lists. Its own instance is usually ephemeral - built, executed,
/// never saved - but it serializes like any other task when a record of the
/// drive itself is wanted.
///
/// The child stream stays open for the whole drive. Over a pooled backend
/// that pins one connection while each completion runs on another, so size
/// the pool for at least two connections (see the note on
/// `StoreConfig::max_connections`).
pub struct CompositeTask {
    meta: TaskMeta,
    child_task_list: String,
}

impl CompositeTask {
    /// Build a composite with a generated id.
    pub fn build(
        task_list: impl Into<String>,
        child_task_list: impl Into<String>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            meta: TaskMeta::new(task_list)?,
            child_task_list: child_task_list.into(),
        })
    }

    /// Build a composite with an explicit id.
    pub fn with_id(
        task_list: impl Into<String>,
        id: impl Into<String>,
        child_task_list: impl Into<String>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            meta: TaskMeta::with_id(task_list, id)?,
            child_task_list: child_task_list.into(),
        })
    }

    pub fn child_task_list(&self) -> &str {
        &self.child_task_list
    }
}

#[async_trait]
impl Task for CompositeTask {
    fn task_type(&self) -> &'static str {
        Self::TYPE
    }

    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn data(&self) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([(
            "child_task_list".to_string(),
            serde_json::Value::String(self.child_task_list.clone()),
        )])
    }

    async fn execute(
        &self,
        interface: &Interface,
        options: &ExecuteOptions,
    ) -> Result<serde_json::Value, TaskError> {
        let mut children = interface.all(&self.child_task_list);
        let mut results = Vec::new();

        while let Some(child) = children.try_next().await? {
            debug!(
                child_task_list = %self.child_task_list,
                id = %child.id(),
                task_type = %child.task_type(),
                "executing child task"
            );
            let result = match child.execute(interface, options).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(
                        child_task_list = %self.child_task_list,
                        id = %child.id(),
                        "child task failed, leaving its record in place"
                    );
                    return Err(err);
                }
            };
            interface.complete(child.as_ref()).await?;
            results.push(result);
        }

        Ok(serde_json::Value::Array(results))
    }
}

impl TaskType for CompositeTask {
    const TYPE: &'static str = "taskledger.composite.v1";

    fn from_record(record: TaskRecord) -> Result<Self, TaskError> {
        let payload: CompositePayload = record.payload()?;
        Ok(Self {
            meta: record.meta()?,
            child_task_list: payload.child_task_list,
        })
    }
}
