//! gitlesson-core
//!
//! Harvests lessons that developers leave in commit messages.
//!
//! - **domain**: ids, tasks, persisted records, outcomes, errors
//! - **ports**: list store, document store, source-control host, clock
//! - **impls**: in-memory, SQLite and GitHub implementations of the ports
//! - **queue**: task store, delayed buckets, promoter
//! - **typed**: typed handler registry at the queue edge
//! - **app**: service context, builder, worker pool, status
//! - **handlers**: `userRepos`, `hook`, `commitSearch`
//! - **lesson**: extraction, rendering, persistence
//! - **webhook**: push delivery ingestion
//! - **server**: HTTP surface
//! - **login** / **admin**: sign-in registration and hook removal

pub mod admin;
pub mod app;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod impls;
pub mod lesson;
pub mod login;
pub mod ports;
pub mod queue;
pub mod server;
pub mod typed;
pub mod webhook;

#[cfg(test)]
mod test_support;
