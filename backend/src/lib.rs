//! Convention registration backend library.
//!
//! The [`domain`] module holds the model and the two
//! [`ConventionManager`](domain::ports::ConventionManager) backends;
//! [`outbound`] supplies the document store and seed adapters; [`config`]
//! loads runtime settings.

pub mod config;
pub mod domain;
pub mod outbound;
