//! `SeaORM` entity prelude

pub use super::workers::Entity as Workers;
