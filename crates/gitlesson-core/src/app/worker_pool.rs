//! WorkerPool - concurrency-capped dispatch from the task store.
//!
//! Several tickers poll the same store. Each tick reserves a slot on one
//! shared counter before popping, so the cap holds for every interleaving.
//! The slot is an RAII guard that moves into the spawned task and releases
//! on drop: success, error, timeout and panic all release exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::builder::App;
use super::status::PoolStatus;
use crate::domain::{HandlerError, Task, TaskKind};
use crate::queue::{Dequeued, QueueError, TaskStore};
use crate::typed::TypedRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum tasks running at once.
    pub cap: usize,
    pub tickers: usize,
    pub poll_interval: Duration,
    pub task_timeout: Duration,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// Every slot is taken.
    Saturated,
    /// Nothing queued.
    Idle,
    /// Popped an undecodable entry; it went to the dead-letter list.
    DeadLettered,
    Dispatched(TaskKind),
}

struct PoolInner {
    tasks: Arc<TaskStore>,
    registry: TypedRegistry,
    in_flight: AtomicUsize,
    config: PoolConfig,
}

/// Cheap to clone; clones share the counter.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct SlotGuard {
    inner: Arc<PoolInner>,
}

impl SlotGuard {
    fn reserve(inner: &Arc<PoolInner>) -> Option<Self> {
        let cap = inner.config.cap;
        inner
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < cap).then_some(n + 1))
            .ok()
            .map(|_| SlotGuard {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl WorkerPool {
    pub fn new(tasks: Arc<TaskStore>, app: App, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                tasks,
                registry: app.registry,
                in_flight: AtomicUsize::new(0),
                config: PoolConfig {
                    cap: config.cap.max(1),
                    ..config
                },
            }),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            in_flight: self.in_flight(),
            cap: self.inner.config.cap,
            tickers: self.inner.config.tickers,
        }
    }

    /// One scheduling step: reserve a slot, pop one entry, dispatch it.
    pub async fn tick(&self) -> Result<TickResult, QueueError> {
        let inner = &self.inner;
        if inner.in_flight.load(Ordering::Acquire) >= inner.config.cap {
            return Ok(TickResult::Saturated);
        }
        if inner.tasks.length().await? == 0 {
            return Ok(TickResult::Idle);
        }
        let Some(slot) = SlotGuard::reserve(inner) else {
            return Ok(TickResult::Saturated);
        };

        // the slot is released on every path from here
        match inner.tasks.dequeue().await? {
            None => Ok(TickResult::Idle),
            Some(Dequeued::Malformed { .. }) => Ok(TickResult::DeadLettered),
            Some(Dequeued::Task(task)) => {
                let kind = task.kind();
                tokio::spawn(run_task(Arc::clone(inner), task, slot));
                Ok(TickResult::Dispatched(kind))
            }
        }
    }

    /// Start the tickers.
    pub fn spawn(&self) -> PoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tickers = self.inner.config.tickers.max(1);
        let mut joins = Vec::with_capacity(tickers);
        for ticker_id in 0..tickers {
            let pool = self.clone();
            let rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                ticker_loop(ticker_id, pool, rx).await;
            }));
        }
        info!(
            tickers,
            cap = self.inner.config.cap,
            poll_interval = ?self.inner.config.poll_interval,
            "worker pool started"
        );
        PoolHandle {
            pool: self.clone(),
            shutdown_tx,
            joins,
        }
    }
}

async fn ticker_loop(ticker_id: usize, pool: WorkerPool, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(pool.inner.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }
        if let Err(e) = pool.tick().await {
            error!(ticker_id, error = %e, "tick failed");
        }
    }
    debug!(ticker_id, "ticker stopped");
}

async fn run_task(inner: Arc<PoolInner>, task: Task, _slot: SlotGuard) {
    let kind = task.kind();
    let timeout = inner.config.task_timeout;

    let result = match inner.registry.get(kind) {
        None => Err(HandlerError::HandlerNotFound(kind)),
        Some(handler) => tokio::time::timeout(timeout, handler.handle_dyn(task.clone()))
            .await
            .unwrap_or(Err(HandlerError::TimedOut(timeout))),
    };

    match result {
        Ok(outcome) => {
            info!(
                task_kind = %kind,
                outcome = ?outcome.kind,
                reason = outcome.reason.as_deref().unwrap_or(""),
                enqueued = outcome.enqueued,
                persisted = outcome.persisted,
                failed_items = outcome.failed_items,
                "task finished"
            );
        }
        Err(e) => {
            warn!(task_kind = %kind, error_kind = ?e.kind(), error = %e, "task failed, dead-lettering");
            if let Err(qe) = inner.tasks.dead_letter_task(&task).await {
                error!(task_kind = %kind, error = %qe, "dead-letter push failed, task lost");
            }
        }
    }
}

/// Running tickers.
/// - `request_shutdown()` stops new dispatches
/// - `shutdown_and_join()` also waits for the tickers and in-flight tasks
pub struct PoolHandle {
    pool: WorkerPool,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl PoolHandle {
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop ticking, then wait up to `grace` for running tasks to release
    /// their slots. Returns the number still running when the wait ended.
    pub async fn shutdown_and_join(self, grace: Duration) -> usize {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
        let deadline = tokio::time::Instant::now() + grace;
        while self.pool.in_flight() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let remaining = self.pool.in_flight();
        if remaining > 0 {
            warn!(remaining, "shutdown grace elapsed with tasks still running");
        }
        remaining
    }
}
