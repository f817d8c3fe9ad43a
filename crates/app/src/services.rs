//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod command_dispatcher;
pub mod correlation_engine;
pub mod directory_service;
pub mod inbound;
pub mod staleness_reaper;
pub mod subscription_manager;
