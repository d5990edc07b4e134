//! Tests for CompositeTask: draining a child list, and failure behavior.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskledger::{
    CompositeTask, ExecuteOptions, Interface, MemoryTaskStore, Task, TaskError, TaskMeta,
    TaskRecord, TaskRegistry, TaskType,
};

#[derive(Debug, Serialize, Deserialize)]
struct ProbePayload {
    should_fail: bool,
}

/// Child task that logs its execution into a shared probe, and optionally
/// fails. The probe lives outside the record, so revival goes through a
/// custom reviver closure that re-attaches it.
struct ProbeTask {
    meta: TaskMeta,
    should_fail: bool,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ProbeTask {
    const TYPE: &'static str = "test.probe";
}

#[async_trait]
impl Task for ProbeTask {
    fn task_type(&self) -> &'static str {
        Self::TYPE
    }

    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn data(&self) -> BTreeMap<String, serde_json::Value> {
        TaskRecord::data_from(&ProbePayload {
            should_fail: self.should_fail,
        })
        .unwrap()
    }

    async fn execute(
        &self,
        _interface: &Interface,
        _options: &ExecuteOptions,
    ) -> Result<serde_json::Value, TaskError> {
        if self.should_fail {
            return Err(TaskError::execution(anyhow::anyhow!(
                "probe task {} was told to fail",
                self.meta.id
            )));
        }
        self.executed
            .lock()
            .unwrap()
            .push(self.meta.id.clone());
        Ok(serde_json::json!(self.meta.id))
    }
}

struct Harness {
    interface: Interface,
    executed: Arc<Mutex<Vec<String>>>,
}

fn setup() -> Harness {
    let executed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let mut registry = TaskRegistry::new();
    registry.register::<CompositeTask>().unwrap();
    let probe = Arc::clone(&executed);
    registry
        .register_with(ProbeTask::TYPE, move |record: TaskRecord| {
            let payload: ProbePayload = record.payload()?;
            Ok(Box::new(ProbeTask {
                meta: record.meta()?,
                should_fail: payload.should_fail,
                executed: Arc::clone(&probe),
            }) as Box<dyn Task>)
        })
        .unwrap();

    Harness {
        interface: Interface::new(MemoryTaskStore::new(), registry),
        executed,
    }
}

impl Harness {
    async fn save_probe(&self, task_list: &str, id: &str, should_fail: bool) {
        let task = ProbeTask {
            meta: TaskMeta::with_id(task_list, id).unwrap(),
            should_fail,
            executed: Arc::clone(&self.executed),
        };
        self.interface.save(&task).await.unwrap();
    }

    fn executed_ids(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    async fn stored(&self, task_list: &str, id: &str) -> bool {
        self.interface.find(task_list, id).await.unwrap().is_some()
    }
}

#[tokio::test]
async fn executes_child_tasks_from_the_specified_list() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(h.executed_ids(), vec!["1", "2"]);
}

#[tokio::test]
async fn ignores_child_tasks_from_other_lists() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", false).await;
    h.save_probe("b", "3", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(h.executed_ids(), vec!["1", "2"]);
    assert!(h.stored("b", "3").await);
}

#[tokio::test]
async fn returns_the_results_of_each_child_in_order() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    let results = composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(results, serde_json::json!(["1", "2"]));
}

#[tokio::test]
async fn completes_each_child_after_it_succeeds() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert!(!h.stored("a", "1").await);
    assert!(!h.stored("a", "2").await);
}

#[tokio::test]
async fn a_failing_child_halts_the_drive_and_keeps_its_record() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", true).await;
    h.save_probe("a", "3", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    let err = composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Execution(_)));

    // Task 1 ran and was retired; 2 failed before completion; 3 was never
    // attempted. Both stay in the ledger for a later pass.
    assert_eq!(h.executed_ids(), vec!["1"]);
    assert!(!h.stored("a", "1").await);
    assert!(h.stored("a", "2").await);
    assert!(h.stored("a", "3").await);
}

#[tokio::test]
async fn rerunning_the_composite_resumes_with_whatever_is_left() {
    let h = setup();
    h.save_probe("a", "1", false).await;
    h.save_probe("a", "2", true).await;
    h.save_probe("a", "3", false).await;

    let composite = CompositeTask::build("x", "a").unwrap();
    composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap_err();

    // The stuck task gets fixed (re-saved with the same key - an upsert),
    // then the composite is simply run again.
    h.save_probe("a", "2", false).await;
    composite
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(h.executed_ids(), vec!["1", "2", "3"]);
    assert!(!h.stored("a", "2").await);
    assert!(!h.stored("a", "3").await);
}

#[tokio::test]
async fn composite_round_trips_through_its_record() {
    let composite = CompositeTask::with_id("x", "c1", "a").unwrap();
    let record = composite.as_record();
    assert_eq!(record.task_type, CompositeTask::TYPE);
    // The child list must always be present in the serialized form; a
    // record without it could never be revived into a working composite.
    assert_eq!(record.data["child_task_list"], serde_json::json!("a"));

    let revived = CompositeTask::from_record(record.clone()).unwrap();
    assert_eq!(revived.child_task_list(), "a");
    assert_eq!(revived.as_record(), record);
}

#[tokio::test]
async fn a_saved_composite_can_be_revived_and_driven() {
    let h = setup();
    h.save_probe("a", "1", false).await;

    // The composite itself is a task: record the drive, revive it, run it.
    let composite = CompositeTask::with_id("drives", "d1", "a").unwrap();
    h.interface.save(&composite).await.unwrap();

    let revived = h.interface.find("drives", "d1").await.unwrap().unwrap();
    revived
        .execute(&h.interface, &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(h.executed_ids(), vec!["1"]);
    assert!(!h.stored("a", "1").await);

    // The drive itself completed; retire its own record too.
    h.interface.complete(revived.as_ref()).await.unwrap();
    assert!(!h.stored("drives", "d1").await);
}
