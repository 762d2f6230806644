//! storage-adapters
//!
//! Implementations of the `domains` ports. The in-memory store is always
//! built; disk-backed media and PostgreSQL are compiled to order.

pub mod memory;

#[cfg(feature = "media-local")]
pub mod local_media;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::{InMemoryMediaStorage, InMemoryStore};

#[cfg(feature = "media-local")]
pub use local_media::LocalMediaStorage;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
