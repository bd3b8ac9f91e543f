//! Bounded pool for fire-and-forget background work
//!
//! Preloads and scheduled reconciliations run here. At most `workers` tasks
//! execute at once; `in_flight()` counts queued plus running tasks. A task's
//! error or panic is logged and never reaches whoever scheduled it.

use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct PoolState {
    in_flight: Mutex<usize>,
    idle: Condvar,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl PoolState {
    fn finish(&self, ok: bool) {
        if ok {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

pub struct TaskPool {
    pool: rayon::ThreadPool,
    workers: usize,
    state: Arc<PoolState>,
}

impl TaskPool {
    pub fn new(name: &str, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let prefix = name.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        Ok(Self {
            pool,
            workers,
            state: Arc::new(PoolState::default()),
        })
    }

    /// Queue `task`; returns immediately
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        *self.state.in_flight.lock() += 1;
        let state = Arc::clone(&self.state);

        self.pool.spawn(move || {
            let ok = match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    tracing::warn!(task = label, "background task failed: {e}");
                    false
                }
                Err(_) => {
                    tracing::error!(task = label, "background task panicked");
                    false
                }
            };
            state.finish(ok);
        });
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks queued or running right now
    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock()
    }

    pub fn completed(&self) -> u64 {
        self.state.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.state.failed.load(Ordering::Relaxed)
    }

    /// Block until nothing is queued or running
    pub fn wait_idle(&self) {
        let mut in_flight = self.state.in_flight.lock();
        while *in_flight > 0 {
            self.state.idle.wait(&mut in_flight);
        }
    }

    /// Like [`TaskPool::wait_idle`] with an upper bound; `false` on timeout
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let mut in_flight = self.state.in_flight.lock();
        while *in_flight > 0 {
            if self.state.idle.wait_for(&mut in_flight, timeout).timed_out() {
                return *in_flight == 0;
            }
        }
        true
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GalleryError;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_runs_all_tasks() {
        let pool = TaskPool::new("test", 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.spawn("count", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.completed(), 20);
    }

    #[test]
    fn test_concurrency_is_capped() {
        let pool = TaskPool::new("cap", 2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn("sleep", move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }
        pool.wait_idle();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_failures_are_contained() {
        let pool = TaskPool::new("fail", 1).unwrap();
        pool.spawn("error", || Err(GalleryError::Validation("boom".to_string())));
        pool.spawn("panic", || panic!("boom"));
        pool.spawn("ok", || Ok(()));
        assert!(pool.wait_idle_timeout(Duration::from_secs(5)));
        assert_eq!(pool.failed(), 2);
        assert_eq!(pool.completed(), 1);
    }
}
