//! Tracked background tasks.
//!
//! Connection tasks (and the HTTP/2 stream tasks hyper spawns for them) are
//! owned by a `TaskSet`, so shutdown can cancel whatever outlives the grace
//! period instead of leaving it detached on the runtime.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;

/// Shared set of spawned tasks that can be cancelled together.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` on the current runtime and track it.
    ///
    /// Finished tasks are reaped on the way, so the set only holds live ones.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.lock();
        while set.try_join_next().is_some() {}
        set.spawn(fut);
    }

    /// Tasks spawned and not yet reaped.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every tracked task and wait until all of them have stopped.
    ///
    /// Tasks spawned while aborting (a connection task handing off a stream)
    /// are picked up by the next round.
    pub async fn abort_all(&self) -> usize {
        let mut aborted = 0;
        loop {
            let mut set = mem::take(&mut *self.lock());
            if set.is_empty() {
                return aborted;
            }
            set.abort_all();
            while let Some(res) = set.join_next().await {
                if res.as_ref().is_err_and(|e| e.is_cancelled()) {
                    aborted += 1;
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> hyper::rt::Executor<F> for TaskSet
where
    F: Future<Output = ()> + Send + 'static,
{
    fn execute(&self, fut: F) {
        self.spawn(fut);
    }
}
