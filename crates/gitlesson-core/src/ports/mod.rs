//! Ports - collaborator interfaces.
//!
//! The core talks to three outside systems: a list/hash store holding the
//! task queue, a document store holding users, hooks and lessons, and the
//! remote source-control host. Each is a trait here; implementations live in
//! `impls`.

pub mod clock;
pub mod document_store;
pub mod host_api;
pub mod list_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{DocumentError, DocumentStore, LessonQuery};
pub use self::host_api::{
    CommitQuery, Credentials, HostApi, HostError, NewHook, RemoteAccount, RemoteCommit,
    RemoteHook, RemoteRepo,
};
pub use self::list_store::{ListStore, StoreError};
