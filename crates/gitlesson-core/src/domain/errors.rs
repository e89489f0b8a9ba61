//! Errors raised by task handlers and their classification.

use std::time::Duration;

use thiserror::Error;

use super::ids::UserId;
use super::task::TaskKind;
use crate::ports::{DocumentError, HostError};
use crate::queue::QueueError;

/// Operational classification of a handler failure.
///
/// Every kind ends in the dead-letter list; the kind only tells an operator
/// what a manual replay needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// External call failed (network, host, store); replaying may succeed.
    Transient,
    /// The task payload itself is unusable.
    Malformed,
    /// A referenced user, repository or hook does not exist.
    MissingReference,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("host api: {0}")]
    Host(#[from] HostError),

    #[error("document store: {0}")]
    Documents(#[from] DocumentError),

    #[error("task store: {0}")]
    Queue(#[from] QueueError),

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("no handler registered for task kind {0}")]
    HandlerNotFound(TaskKind),

    #[error("task payload does not match handler for {0}")]
    PayloadMismatch(TaskKind),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Host(HostError::NotFound(_)) => ErrorKind::MissingReference,
            HandlerError::Host(_)
            | HandlerError::Documents(_)
            | HandlerError::Queue(_)
            | HandlerError::TimedOut(_) => ErrorKind::Transient,
            HandlerError::UnknownUser(_) => ErrorKind::MissingReference,
            HandlerError::HandlerNotFound(_) | HandlerError::PayloadMismatch(_) => {
                ErrorKind::Malformed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            HandlerError::UnknownUser(UserId::new(3)).kind(),
            ErrorKind::MissingReference
        );
        assert_eq!(
            HandlerError::Host(HostError::NotFound("repos/a/b".into())).kind(),
            ErrorKind::MissingReference
        );
        assert_eq!(
            HandlerError::TimedOut(Duration::from_secs(1)).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            HandlerError::HandlerNotFound(TaskKind::Hook).kind(),
            ErrorKind::Malformed
        );
    }
}
