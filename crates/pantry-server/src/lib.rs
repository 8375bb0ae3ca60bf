//! Pantry server library
//!
//! HTTP handlers, configuration, and startup plumbing for the cache node.

pub mod api;
pub mod error;
pub mod metrics;
pub mod model;
pub mod startup;
