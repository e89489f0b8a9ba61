//! Outcome model: what a successful handler run did.
//!
//! Failures are not outcomes; they travel as `HandlerError` and end up in the
//! dead-letter list. An outcome is either real work (`Completed`) or an
//! expected absence that ends the task early (`Skipped`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Completed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Follow-up tasks pushed onto the queue by this run.
    #[serde(default)]
    pub enqueued: usize,

    /// Records written (hooks or lessons).
    #[serde(default)]
    pub persisted: usize,

    /// Items that failed individually without failing the task.
    #[serde(default)]
    pub failed_items: usize,
}

impl Outcome {
    pub fn completed() -> Self {
        Self {
            kind: OutcomeKind::Completed,
            reason: None,
            enqueued: 0,
            persisted: 0,
            failed_items: 0,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            reason: Some(reason.into()),
            ..Self::completed()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_enqueued(mut self, n: usize) -> Self {
        self.enqueued = n;
        self
    }

    pub fn with_persisted(mut self, n: usize) -> Self {
        self.persisted = n;
        self
    }

    pub fn with_failed_items(mut self, n: usize) -> Self {
        self.failed_items = n;
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == OutcomeKind::Skipped
    }
}
