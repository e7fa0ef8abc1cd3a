//! Tracked groups of spawned tasks
//!
//! The client keeps two groups: the pipeline loops, which `shutdown()` may
//! abort, and dispatched handler callbacks, which `join()` and strict
//! ordering wait for. Any number of callers may wait on a group at once.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
struct Active {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the active count when the task's future is dropped, which
/// happens on completion, panic and abort alike
struct ActiveGuard(Arc<Active>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Debug)]
pub(crate) struct TaskGroup {
    name: &'static str,
    handles: Mutex<Vec<AbortHandle>>,
    active: Arc<Active>,
}

impl TaskGroup {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Mutex::new(Vec::new()),
            active: Arc::new(Active::default()),
        }
    }

    /// Spawn `future` on the runtime and track it
    pub(crate) fn spawn<F>(&self, future: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.active.count.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(self.active.clone());

        let handle = tokio::spawn(async move {
            let _guard = guard;
            future.await;
        });
        let abort = handle.abort_handle();

        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(abort.clone());
        abort
    }

    /// Request cancellation of every tracked task
    pub(crate) fn abort_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        tracing::debug!("Aborting {} task(s) in group '{}'", handles.len(), self.name);
        for handle in handles {
            handle.abort();
        }
    }

    /// Wait until no task, including ones spawned while waiting, is running
    pub(crate) async fn join(&self) {
        loop {
            let idle = self.active.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Number of tasks that have not finished yet
    pub(crate) fn active(&self) -> usize {
        self.active.count.load(Ordering::SeqCst)
    }
}
