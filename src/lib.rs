//! taskdeck - Durable Task Store Library
//!
//! This library provides the storage core for a terminal task manager:
//! an in-memory task collection with derived indices, and crash-safe JSON
//! persistence with backup rotation and read-time recovery.
//!
//! # Core Concepts
//!
//! - **Tasks**: integer-id records with name, priority, done flag, and a
//!   bounded list of normalized tags
//! - **Indices**: a primary id index and a tag index, kept exactly in sync
//!   with the collection after every mutation
//! - **View cache**: memoized filtered views, invalidated by a dirty flag
//! - **Durable files**: atomic temp-write-then-rename persistence with
//!   rotated backups and recovery fallback
//!
//! # Module Organization
//!
//! - `config`: Configuration loading from `.taskdeck.toml`
//! - `error`: Error types and result aliases
//! - `task`: The task model and its wire format
//! - `tags`: Tag-string normalization with warning callbacks
//! - `store`: The task store - collection, indices, cache, load/save
//! - `durable`: Atomic writes, backup rotation, corruption recovery

pub mod config;
pub mod durable;
pub mod error;
pub mod store;
pub mod tags;
pub mod task;

pub use error::{Error, Result};
