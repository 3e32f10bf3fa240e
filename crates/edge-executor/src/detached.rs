//! Detached task execution.
//!
//! Purges, cache writes and background refreshes run after the response
//! has been handed back. Nobody awaits them, nothing retries them, and
//! their failures are only logged.

use std::sync::Mutex;

use futures::future::BoxFuture;

/// Schedules work that outlives the request that started it.
pub trait Spawner: Send + Sync {
    /// Run `task` in the background. `label` names the task in logs.
    fn spawn_detached(&self, label: &'static str, task: BoxFuture<'static, ()>);
}

/// Spawns onto the ambient Tokio runtime.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[cfg(not(target_arch = "wasm32"))]
impl Spawner for TokioSpawner {
    fn spawn_detached(&self, label: &'static str, task: BoxFuture<'static, ()>) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(e) => {
                tracing::warn!(
                    task = label,
                    error = %e,
                    "no runtime for detached task, dropping it"
                );
            }
        }
    }
}

/// Queues tasks until [`run_pending`](Self::run_pending) is called.
///
/// Models a platform that runs "wait until" work after the response is
/// sent, and makes detached work deterministic in tests.
#[derive(Default)]
pub struct DeferredSpawner {
    queue: Mutex<Vec<(&'static str, BoxFuture<'static, ()>)>>,
}

impl DeferredSpawner {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Labels of queued tasks, in spawn order.
    pub fn pending_labels(&self) -> Vec<&'static str> {
        self.queue
            .lock()
            .map(|q| q.iter().map(|(label, _)| *label).collect())
            .unwrap_or_default()
    }

    /// Run queued tasks, including any they spawn, until the queue is empty.
    ///
    /// Returns how many tasks ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = match self.queue.lock() {
                Ok(mut queue) => std::mem::take(&mut *queue),
                Err(_) => break,
            };
            if batch.is_empty() {
                break;
            }
            for (_, task) in batch {
                task.await;
                ran += 1;
            }
        }
        ran
    }
}

impl Spawner for DeferredSpawner {
    fn spawn_detached(&self, label: &'static str, task: BoxFuture<'static, ()>) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push((label, task)),
            Err(_) => tracing::warn!(task = label, "detached queue poisoned, dropping task"),
        }
    }
}

impl std::fmt::Debug for DeferredSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredSpawner")
            .field("pending", &self.pending_labels())
            .finish()
    }
}
