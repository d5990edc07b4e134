//! Composable, lazy task generators.
//!
//! A generator is a description of a task sequence, not a cursor: every call
//! to [`TaskGenerator::generate`] restarts the sequence from scratch, and no
//! element is produced before the stream is polled. That makes generators
//! safe to build eagerly, chain, and re-run - the usual shape being "tasks
//! generated this run" appended to "tasks left over from a failed run".

use std::sync::Arc;

use futures::stream;
use futures::StreamExt;

use crate::interface::{Interface, TaskStream};
use crate::store::TaskError;
use crate::task::{Task, TaskRecord};

/// Anything that can produce a sequence of tasks.
pub trait TaskGenerator: Send + Sync {
    /// Produce the sequence. Each call re-runs it from the start.
    fn generate(&self) -> TaskStream;
}

/// Chaining combinator, available on every generator.
pub trait GeneratorExt: TaskGenerator + Sized + 'static {
    /// Chain this generator with another, in order.
    ///
    /// The combined generator fully drains `self` before advancing to
    /// `other`, and defers all work to consumption time.
    fn append(self, other: impl TaskGenerator + 'static) -> Chained {
        let generators: Vec<Arc<dyn TaskGenerator>> = vec![Arc::new(self), Arc::new(other)];
        Chained { generators }
    }
}

impl<G: TaskGenerator + 'static> GeneratorExt for G {}

/// Concatenation of component generators.
pub struct Chained {
    generators: Vec<Arc<dyn TaskGenerator>>,
}

impl Chained {
    /// Extend the chain with one more generator.
    ///
    /// Shadows [`GeneratorExt::append`] so long chains stay flat instead of
    /// nesting `Chained` inside `Chained`.
    pub fn append(mut self, generator: impl TaskGenerator + 'static) -> Self {
        self.generators.push(Arc::new(generator));
        self
    }
}

impl TaskGenerator for Chained {
    fn generate(&self) -> TaskStream {
        let generators = self.generators.clone();
        Box::pin(stream::iter(generators).flat_map(|generator| generator.generate()))
    }
}

/// Generator over everything currently stored under a task list.
///
/// Each enumeration re-queries storage, so a run that completes some tasks
/// and is then re-enumerated only sees what is still outstanding.
pub struct StoredTasks {
    interface: Interface,
    task_list: String,
}

impl StoredTasks {
    pub fn new(interface: Interface, task_list: impl Into<String>) -> Self {
        Self {
            interface,
            task_list: task_list.into(),
        }
    }
}

impl TaskGenerator for StoredTasks {
    fn generate(&self) -> TaskStream {
        self.interface.all(&self.task_list)
    }
}

/// Generator over a fixed set of records, revived through a reviver function.
///
/// Feeds literal in-memory collections into the same consumption path as
/// stored tasks. Records are kept (rather than task instances) so the
/// sequence can be re-produced on every enumeration.
pub struct FixedTasks<F> {
    records: Vec<TaskRecord>,
    revive: F,
}

impl<F> FixedTasks<F>
where
    F: Fn(TaskRecord) -> Result<Box<dyn Task>, TaskError> + Send + Sync,
{
    pub fn new(records: Vec<TaskRecord>, revive: F) -> Self {
        Self { records, revive }
    }
}

impl<F> TaskGenerator for FixedTasks<F>
where
    F: Fn(TaskRecord) -> Result<Box<dyn Task>, TaskError> + Send + Sync,
{
    fn generate(&self) -> TaskStream {
        let revived: Vec<Result<Box<dyn Task>, TaskError>> = self
            .records
            .iter()
            .cloned()
            .map(|record| (self.revive)(record))
            .collect();
        Box::pin(stream::iter(revived))
    }
}
