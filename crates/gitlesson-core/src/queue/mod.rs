//! Queue module: task store, serialization boundary and delayed-task promoter.

pub mod codec;
mod promoter;
mod store;

pub use self::codec::{BucketEntry, CodecError};
pub use self::promoter::{PromotionReport, Promoter};
pub use self::store::{Dequeued, DueBucket, QueueKeys, TaskStore};

use thiserror::Error;

use crate::ports::StoreError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("list store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
