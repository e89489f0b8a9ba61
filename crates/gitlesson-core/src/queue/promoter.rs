//! Promoter - moves due delayed buckets back onto the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::QueueError;
use super::codec::{self, BucketEntry};
use super::store::TaskStore;
use crate::ports::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Buckets deleted this cycle.
    pub buckets: usize,
    pub promoted: usize,
    pub dead_lettered: usize,
}

pub struct Promoter {
    tasks: Arc<TaskStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Promoter {
    pub fn new(tasks: Arc<TaskStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            tasks,
            clock,
            interval,
        }
    }

    /// Promote every bucket due at or before `now` (epoch seconds).
    ///
    /// Each bucket is deleted before its tasks are enqueued, in bucket order.
    pub async fn run_cycle(&self, now: i64) -> Result<PromotionReport, QueueError> {
        let _guard = self.tasks.lock_buckets().await;
        let mut report = PromotionReport::default();

        for bucket in self.tasks.list_due_buckets(now).await? {
            if !self.tasks.delete_bucket(bucket.due_at).await? {
                continue;
            }
            report.buckets += 1;

            let entries = match codec::decode_bucket(&bucket.raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(due_at = bucket.due_at, error = %e, "undecodable bucket, dead-lettering");
                    self.tasks.dead_letter(bucket.raw).await?;
                    report.dead_lettered += 1;
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    BucketEntry::Task(task) => {
                        self.tasks.enqueue(&task).await?;
                        report.promoted += 1;
                    }
                    BucketEntry::Invalid { raw, error } => {
                        warn!(due_at = bucket.due_at, error = %error, "invalid delayed task, dead-lettering");
                        self.tasks.dead_letter(raw).await?;
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        if report.buckets > 0 {
            debug!(
                buckets = report.buckets,
                promoted = report.promoted,
                dead_lettered = report.dead_lettered,
                "promotion cycle"
            );
        }
        Ok(report)
    }

    /// Run a cycle every `interval` until `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            info!(interval = ?self.interval, "promoter started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                let now = self.clock.now().timestamp();
                if let Err(e) = self.run_cycle(now).await {
                    error!(error = %e, "promotion cycle failed");
                }
            }
            info!("promoter stopped");
        })
    }
}
