//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL document container via Diesel
//! - **memory**: process-local document container
//! - **seed**: bulk convention datasets read from disk
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no registration logic.

pub mod memory;
pub mod persistence;
pub mod seed;
