//! Task manager for in-flight gateway calls
//!
//! Every request gets its own task, keyed by `"{entity}#{seq}"`. Finished
//! tasks are pruned lazily; a `Reset` aborts whatever is still running.
//!
//! # Example
//!
//! ```ignore
//! use entity_dispatch::tasks::{TaskKey, TaskManager};
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut tasks = TaskManager::new(tx);
//!
//! tasks.spawn(TaskKey::request("patient", 3), async move {
//!     match api.get(&id).await {
//!         Ok(entity) => Outcome::Loaded(entity),
//!         Err(e) => Outcome::Failed(e.to_string()),
//!     }
//! });
//!
//! // Logout: nothing still running may report back
//! tasks.cancel_all();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

/// Identifies a task for cancellation.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key of the call serving request `seq` of `entity`.
    pub fn request(entity: &str, seq: u64) -> Self {
        Self(format!("{entity}#{seq}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Spawns futures on the tokio runtime and forwards their output to a
/// channel.
///
/// A cancelled task sends nothing. Spawning under a key that is still
/// running aborts the previous task.
pub struct TaskManager<M> {
    tasks: HashMap<TaskKey, AbortHandle>,
    tx: mpsc::UnboundedSender<M>,
}

impl<M> TaskManager<M>
where
    M: Send + 'static,
{
    pub fn new(tx: mpsc::UnboundedSender<M>) -> Self {
        Self {
            tasks: HashMap::new(),
            tx,
        }
    }

    /// Spawn `future` and send its output once it completes.
    ///
    /// Send failures (the receiver is gone after shutdown) are ignored.
    pub fn spawn<F>(&mut self, key: impl Into<TaskKey>, future: F) -> &mut Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        let key = key.into();
        self.prune_finished();
        self.cancel(&key);

        let tx = self.tx.clone();
        let handle: JoinHandle<()> = tokio::spawn(async move {
            let message = future.await;
            let _ = tx.send(message);
        });

        self.tasks.insert(key, handle.abort_handle());
        self
    }

    /// Cancel a task by key. No-op for unknown keys.
    pub fn cancel(&mut self, key: &TaskKey) {
        if let Some(handle) = self.tasks.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        let count = self.tasks.len();
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        if count > 0 {
            tracing::debug!(count, "cancelled pending tasks");
        }
    }

    /// Forget handles of tasks that already completed.
    pub fn prune_finished(&mut self) {
        self.tasks.retain(|_, handle| !handle.is_finished());
    }

    pub fn is_running(&self, key: &TaskKey) -> bool {
        self.tasks
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of tracked tasks, including finished ones not yet pruned.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn running_keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.tasks
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(key, _)| key)
    }
}

impl<M> Drop for TaskManager<M> {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
