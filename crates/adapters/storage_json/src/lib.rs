//! # thiefwatch-adapter-storage-json
//!
//! Directory persistence as a single JSON snapshot file.
//!
//! ## Responsibilities
//! - Implement the `DirectoryRepository` port defined in `thiefwatch-app::ports::storage`
//! - Replace the snapshot atomically (temp file, fsync, rename)
//!
//! ## Dependency rule
//! Depends on `thiefwatch-app` (for port traits) and `thiefwatch-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod repo;

pub use error::StorageError;
pub use repo::{Config, JsonFileRepository};
