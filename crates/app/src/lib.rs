//! # thiefwatch-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DirectoryRepository`: load and persist directory snapshots
//!   - `Transport`: publish, subscribe and unsubscribe on the message bus
//!   - `EventPublisher`: fan out directory events
//! - Define **driving/inbound ports**:
//!   - `MessageHandler`: what the transport calls for every inbound message
//! - Provide the use-cases:
//!   - `DirectoryService`: validated, persisted directory writes and projections
//!   - `SubscriptionManager`: keeps the transport subscribed to every known location
//!   - `CorrelationEngine`: per-location motion/light state machine
//!   - `CommandDispatcher`: publishes commands and mirrors status into the directory
//!   - `StalenessReaper`: evicts devices that stopped reporting
//! - Provide **in-process infrastructure** (event bus, periodic jobs) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `thiefwatch-domain` only (plus `tokio` for channels, locks and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod periodic;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
