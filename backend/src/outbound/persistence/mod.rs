//! PostgreSQL persistence adapters using Diesel.
//!
//! The document container is a plain table of JSONB bodies addressed through
//! raw, parameterised SQL, so no generated Diesel schema is involved.
//! Connections come from a `bb8` pool of `diesel-async` connections.
//!
//! # Example
//!
//! ```ignore
//! use convention_backend::outbound::persistence::{DbPool, DieselDocumentStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/conventions")).await?;
//! let store = DieselDocumentStore::new(pool);
//! ```

mod diesel_document_store;
mod diesel_error_mapping;
mod pool;

pub use diesel_document_store::DieselDocumentStore;
pub use pool::{DbPool, PoolConfig, PoolError};
