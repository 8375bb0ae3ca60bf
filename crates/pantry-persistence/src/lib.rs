//! Pantry Persistence - Membership table and persistence layer
//!
//! This crate provides:
//! - The SeaORM entity for the shared `workers` table
//! - The `MembershipPersistence` trait
//! - A SeaORM-backed implementation (MySQL/PostgreSQL, SQLite in tests)

pub mod entity;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export entity prelude
pub use entity::prelude::*;

// Re-export persistence traits
pub use traits::MembershipPersistence;

// Re-export SQL backend
pub use sql::SqlMembershipStore;

// Re-export model types
pub use model::Worker;
