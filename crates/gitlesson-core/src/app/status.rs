//! Status - point-in-time view of the queue and the pool.

use serde::Serialize;

use super::worker_pool::WorkerPool;
use crate::queue::{QueueError, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub in_flight: usize,
    pub cap: usize,
    pub tickers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub queue_length: usize,
    pub dead_letter_length: usize,
    #[serde(flatten)]
    pub pool: PoolStatus,
}

impl StatusReport {
    pub async fn collect(tasks: &TaskStore, pool: &WorkerPool) -> Result<Self, QueueError> {
        Ok(Self {
            queue_length: tasks.length().await?,
            dead_letter_length: tasks.dead_letter_length().await?,
            pool: pool.status(),
        })
    }
}
