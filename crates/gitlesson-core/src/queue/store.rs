//! TaskStore - FIFO queue, dead-letter list and delayed buckets.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::QueueError;
use super::codec::{self, CodecError};
use crate::domain::Task;
use crate::ports::ListStore;

/// Names of the three structures in the list store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub tasks: String,
    pub dead_letter: String,
    pub delayed: String,
}

impl QueueKeys {
    /// Dead-letter list named after the queue, prefixed with `failed`.
    pub fn for_list(tasks: impl Into<String>) -> Self {
        let tasks = tasks.into();
        Self {
            dead_letter: format!("failed{tasks}"),
            delayed: format!("{tasks}:delayed"),
            tasks,
        }
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::for_list("tasks")
    }
}

/// Result of popping the queue head.
#[derive(Debug)]
pub enum Dequeued {
    Task(Task),
    /// The entry did not decode; it is already on the dead-letter list.
    Malformed { raw: String, error: CodecError },
}

/// A bucket whose due time has passed, still in its stored form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueBucket {
    pub due_at: i64,
    pub raw: String,
}

pub struct TaskStore {
    store: Arc<dyn ListStore>,
    keys: QueueKeys,
    // read-append-write on a bucket and bucket promotion share this lock
    buckets: Mutex<()>,
}

impl TaskStore {
    pub fn new(store: Arc<dyn ListStore>, keys: QueueKeys) -> Self {
        Self {
            store,
            keys,
            buckets: Mutex::new(()),
        }
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    pub async fn enqueue(&self, task: &Task) -> Result<usize, QueueError> {
        let raw = codec::encode_task(task)?;
        let len = self.store.push_tail(&self.keys.tasks, raw).await?;
        debug!(task_kind = %task.kind(), queue_len = len, "task enqueued");
        Ok(len)
    }

    /// Pop the head without waiting. Malformed entries are dead-lettered
    /// before being reported.
    pub async fn dequeue(&self) -> Result<Option<Dequeued>, QueueError> {
        let Some(raw) = self.store.pop_head(&self.keys.tasks).await? else {
            return Ok(None);
        };
        match codec::decode_task(&raw) {
            Ok(task) => Ok(Some(Dequeued::Task(task))),
            Err(error) => {
                warn!(error = %error, "malformed task payload, dead-lettering");
                self.dead_letter(raw.clone()).await?;
                Ok(Some(Dequeued::Malformed { raw, error }))
            }
        }
    }

    pub async fn length(&self) -> Result<usize, QueueError> {
        Ok(self.store.length(&self.keys.tasks).await?)
    }

    /// Append a raw payload to the dead-letter list as-is.
    pub async fn dead_letter(&self, raw: String) -> Result<(), QueueError> {
        self.store.push_tail(&self.keys.dead_letter, raw).await?;
        Ok(())
    }

    pub async fn dead_letter_task(&self, task: &Task) -> Result<(), QueueError> {
        self.dead_letter(codec::encode_task(task)?).await
    }

    pub async fn dead_letter_length(&self) -> Result<usize, QueueError> {
        Ok(self.store.length(&self.keys.dead_letter).await?)
    }

    /// Append `task` to the bucket due at `due_at` (epoch seconds).
    pub async fn schedule_delayed(&self, task: &Task, due_at: i64) -> Result<(), QueueError> {
        let field = due_at.to_string();
        let _guard = self.buckets.lock().await;

        let existing = self.store.hash_get(&self.keys.delayed, &field).await?;
        let bucket = match codec::append_to_bucket(existing.as_deref(), task) {
            Ok(bucket) => bucket,
            Err(CodecError::Bucket(e)) => {
                // unreadable bucket: keep its bytes for an operator, start over
                warn!(due_at, error = %e, "corrupt delayed bucket, dead-lettering");
                if let Some(raw) = existing {
                    self.dead_letter(raw).await?;
                }
                codec::append_to_bucket(None, task)?
            }
            Err(e) => return Err(e.into()),
        };
        self.store.hash_set(&self.keys.delayed, &field, bucket).await?;
        debug!(task_kind = %task.kind(), due_at, "task scheduled");
        Ok(())
    }

    /// Buckets with a due time at or before `now`, oldest first.
    pub async fn list_due_buckets(&self, now: i64) -> Result<Vec<DueBucket>, QueueError> {
        let mut due: Vec<DueBucket> = Vec::new();
        for (field, raw) in self.store.hash_get_all(&self.keys.delayed).await? {
            match field.parse::<i64>() {
                Ok(due_at) if due_at <= now => due.push(DueBucket { due_at, raw }),
                Ok(_) => {}
                Err(_) => warn!(field = %field, "skipping non-numeric delayed bucket key"),
            }
        }
        due.sort_by_key(|b| b.due_at);
        Ok(due)
    }

    /// Returns false if the bucket was already gone.
    pub async fn delete_bucket(&self, due_at: i64) -> Result<bool, QueueError> {
        Ok(self
            .store
            .hash_delete(&self.keys.delayed, &due_at.to_string())
            .await?)
    }

    pub(crate) async fn lock_buckets(&self) -> MutexGuard<'_, ()> {
        self.buckets.lock().await
    }
}
