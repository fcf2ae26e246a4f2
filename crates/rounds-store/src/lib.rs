//! SurrealDB backend for the `rounds` signature store.
//!
//! This crate provides the only concrete implementation of
//! `SignatureStorePort` shipped with the core: a `SurrealHandle` that owns
//! the database connection and schema lifecycle.

mod error;
mod handle;
mod schema;

pub use error::StoreError;
pub use handle::SurrealHandle;

/// Result type for signature store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
