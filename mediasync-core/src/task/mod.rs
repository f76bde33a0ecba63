//! The task pipeline: units of work a processor job runs for an import.

mod changeset;
mod cleanup;
mod import_items;
mod local_items;
mod processor;
mod removal;
mod synchronisation;
mod update;

pub use changeset::ChangesetTask;
pub use cleanup::CleanupTask;
pub use import_items::ImportItemsRetrievalTask;
pub use local_items::LocalItemsRetrievalTask;
pub use processor::{JobIdentity, TaskProcessorJob};
pub use removal::RemovalTask;
pub use synchronisation::SynchronisationTask;
pub use update::UpdateTask;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::models::Import;
use crate::Result;

/// The stages a processor job can run, in their canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    LocalItemsRetrieval,
    ImportItemsRetrieval,
    Changeset,
    Synchronisation,
    Cleanup,
    Removal,
    Update,
}

impl TaskType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskType::LocalItemsRetrieval => "local items retrieval",
            TaskType::ImportItemsRetrieval => "import items retrieval",
            TaskType::Changeset => "changeset",
            TaskType::Synchronisation => "synchronisation",
            TaskType::Cleanup => "cleanup",
            TaskType::Removal => "removal",
            TaskType::Update => "update",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct ProgressState {
    title: Mutex<String>,
    text: Mutex<String>,
    current: AtomicU64,
    total: AtomicU64,
}

/// Progress of a processor job, shareable with display surfaces.
#[derive(Clone, Default)]
pub struct ProgressHandle {
    state: Arc<ProgressState>,
}

impl ProgressHandle {
    pub fn set_title(&self, title: impl Into<String>) {
        *self.state.title.lock() = title.into();
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.state.title.lock().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.state.text.lock() = text.into();
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.state.text.lock().clone()
    }

    pub fn set_progress(&self, current: u64, total: u64) {
        self.state.current.store(current, Ordering::Relaxed);
        self.state.total.store(total, Ordering::Relaxed);
    }

    #[must_use]
    pub fn progress(&self) -> (u64, u64) {
        (
            self.state.current.load(Ordering::Relaxed),
            self.state.total.load(Ordering::Relaxed),
        )
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (current, total) = self.progress();
        f.debug_struct("ProgressHandle")
            .field("title", &self.title())
            .field("current", &current)
            .field("total", &total)
            .finish()
    }
}

/// Cancellation and progress plumbing shared by all tasks of one job.
#[derive(Clone, Debug)]
pub struct TaskContext {
    progress: ProgressHandle,
    cancel: CancellationToken,
}

impl TaskContext {
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            progress: ProgressHandle::default(),
            cancel,
        }
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Publishes progress and reports whether the task should stop. Tasks
    /// must poll this before any long-running step and between items.
    #[must_use]
    pub fn should_cancel(&self, current: u64, total: u64) -> bool {
        self.progress.set_progress(current, total);
        self.cancel.is_cancelled()
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

/// One unit of work in the pipeline.
#[async_trait]
pub trait ImportTask: Send {
    fn task_type(&self) -> TaskType;

    /// The import this task works on.
    fn import(&self) -> &Import;

    /// Executes the task. Returns [`crate::Error::Cancelled`] when stopped
    /// cooperatively.
    async fn run(&mut self) -> Result<()>;
}

/// Callback informed of every finished task of a processor job.
#[async_trait]
pub trait TaskCallback: Send + Sync {
    /// Returning `false` marks the task as failed even if it succeeded.
    async fn on_task_complete(&self, success: bool, task_type: TaskType, import: &Import) -> bool;
}
