//! Impls - port implementations.
//!
//! - **memory**: in-process stores for tests and throwaway runs
//! - **sqlite**: single-file persistent list/hash and document store
//! - **github**: `HostApi` over the GitHub REST API

pub mod github;
pub mod memory;
pub mod sqlite;

pub use self::github::GitHubClient;
pub use self::memory::{InMemoryDocumentStore, InMemoryListStore};
pub use self::sqlite::SqliteStore;
