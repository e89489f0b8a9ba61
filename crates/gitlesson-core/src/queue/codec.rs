//! Serialization boundary between `Task` and the strings the list store holds.
//!
//! Queue entries are one JSON object per entry. Delayed buckets are one JSON
//! array of task objects per hash field.

use serde_json::Value;
use thiserror::Error;

use crate::domain::Task;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid task payload: {0}")]
    Task(#[source] serde_json::Error),

    #[error("delayed bucket is not a JSON array: {0}")]
    Bucket(#[source] serde_json::Error),

    #[error("task could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
}

pub fn encode_task(task: &Task) -> Result<String, CodecError> {
    serde_json::to_string(task).map_err(CodecError::Encode)
}

pub fn decode_task(raw: &str) -> Result<Task, CodecError> {
    serde_json::from_str(raw).map_err(CodecError::Task)
}

/// One element of a decoded bucket.
#[derive(Debug)]
pub enum BucketEntry {
    Task(Task),
    /// Element that is not a valid task, re-serialized for the dead-letter list.
    Invalid { raw: String, error: CodecError },
}

/// Split a bucket into its elements. Fails only when the bucket as a whole is
/// not an array; bad elements come back as [`BucketEntry::Invalid`].
pub fn decode_bucket(raw: &str) -> Result<Vec<BucketEntry>, CodecError> {
    let values: Vec<Value> = serde_json::from_str(raw).map_err(CodecError::Bucket)?;
    Ok(values
        .into_iter()
        .map(|value| {
            let raw = value.to_string();
            match serde_json::from_value::<Task>(value) {
                Ok(task) => BucketEntry::Task(task),
                Err(e) => BucketEntry::Invalid {
                    raw,
                    error: CodecError::Task(e),
                },
            }
        })
        .collect())
}

/// Append `task` to an existing bucket (or start a new one).
pub fn append_to_bucket(existing: Option<&str>, task: &Task) -> Result<String, CodecError> {
    let mut values: Vec<Value> = match existing {
        Some(raw) => serde_json::from_str(raw).map_err(CodecError::Bucket)?,
        None => Vec::new(),
    };
    values.push(serde_json::to_value(task).map_err(CodecError::Encode)?);
    serde_json::to_string(&values).map_err(CodecError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserId, UserReposTask};

    fn user_repos(id: u64) -> Task {
        Task::UserRepos(UserReposTask {
            user_id: UserId::new(id),
            new_user: false,
        })
    }

    #[test]
    fn append_keeps_order() {
        let first = append_to_bucket(None, &user_repos(1)).unwrap();
        let both = append_to_bucket(Some(&first), &user_repos(2)).unwrap();
        let entries = decode_bucket(&both).unwrap();
        let ids: Vec<_> = entries
            .iter()
            .map(|e| match e {
                BucketEntry::Task(Task::UserRepos(t)) => t.user_id.get(),
                other => panic!("unexpected entry {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn bad_elements_are_isolated() {
        let raw = r#"[{"type":"userRepos","userId":3},{"type":"nope"}]"#;
        let entries = decode_bucket(raw).unwrap();
        assert!(matches!(entries[0], BucketEntry::Task(_)));
        match &entries[1] {
            BucketEntry::Invalid { raw, .. } => assert_eq!(raw, r#"{"type":"nope"}"#),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn non_array_bucket_is_rejected() {
        assert!(matches!(
            decode_bucket(r#"{"type":"userRepos","userId":3}"#),
            Err(CodecError::Bucket(_))
        ));
        assert!(matches!(
            append_to_bucket(Some("garbage"), &user_repos(1)),
            Err(CodecError::Bucket(_))
        ));
    }

    #[test]
    fn decode_rejects_non_json() {
        assert!(matches!(decode_task("not json"), Err(CodecError::Task(_))));
    }
}
