//! # thiefwatch-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the directory as a JSON API (`/api/sites`, `/api/devices`,
//!   `/api/locations`, `/api/topic`)
//! - Expose the correlation engine's per-location state and its external
//!   reset (`/api/decisions`)
//! - Map application errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `thiefwatch-app` (for port traits and services) and
//! `thiefwatch-domain` (for types used in request/response mapping). Never
//! leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
