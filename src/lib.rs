//! # Taskledger
//!
//! The embeddable at-least-once task ledger.
//!
//! A task is durably recorded *before* it is dispatched, and the record is
//! removed only after execution succeeds. A crashed worker leaves the record
//! behind, so a later pass rediscovers and re-drives the task. A library,
//! not a service: it runs in your process against SQLite (or any store you
//! plug in).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use taskledger::{CompositeTask, Interface, MemoryTaskStore, TaskRegistry};
//!
//! let mut registry = TaskRegistry::new();
//! registry.register::<CompositeTask>()?;
//! registry.register::<MyCleanupTask>()?;
//!
//! let interface = Interface::new(MemoryTaskStore::new(), registry);
//!
//! // Producer: record the work before anything runs it.
//! interface.save(&MyCleanupTask::build("cleanup", item_id)?).await?;
//!
//! // Consumer: drain the list, completing each task after it succeeds.
//! let drain = CompositeTask::build("drives", "cleanup")?;
//! drain.execute(&interface, &Default::default()).await?;
//! ```
//!
//! ## Delivery semantics
//!
//! At-least-once, not exactly-once. `store` is an upsert (safe to re-save
//! during retries), `delete` is idempotent (safe to re-complete), and there
//! is no distributed lock between workers sharing a store - deduplication,
//! if needed, belongs to the tasks themselves.
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - SQLite-backed task storage via `sqlx`

pub mod composite;
pub mod generator;
pub mod interface;
pub mod registry;
pub mod store;
pub mod task;

pub use composite::CompositeTask;
pub use generator::{Chained, FixedTasks, GeneratorExt, StoredTasks, TaskGenerator};
pub use interface::{Interface, TaskStream};
pub use registry::TaskRegistry;
pub use store::{MemoryTaskStore, RecordStream, TaskError, TaskStore};
pub use task::{ExecuteOptions, Task, TaskMeta, TaskRecord, TaskType};

#[cfg(feature = "sqlite")]
pub use store::{SqliteTaskStore, StoreConfig};
