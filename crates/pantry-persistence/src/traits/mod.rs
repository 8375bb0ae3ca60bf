//! Persistence trait abstractions
//!
//! The registry talks to the membership table only through these traits so
//! the storage backend can be swapped (SQL in production, SQLite in tests).

mod membership;

pub use membership::MembershipPersistence;
