//! # thiefwatch-domain
//!
//! Pure domain model for the thiefwatch lighting controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Locations** (site / zone / unit triples)
//! - Define **Device records** and the **Directory** tree that owns them
//! - Validate raw directory payloads against table-driven schemas
//! - Define the wire **envelopes** and **topic** shapes
//! - Define the per-location **decision** state machine (motion + light)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod decision;
pub mod device;
pub mod directory;
pub mod envelope;
pub mod event;
pub mod location;
pub mod schema;
pub mod topic;
