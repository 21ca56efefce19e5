//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod convention_manager;
mod document_store;
mod seed_source;

pub use convention_manager::{ConventionManager, ConventionStream};
#[cfg(test)]
pub use document_store::MockDocumentStore;
pub use document_store::{
    ContainerHandle, Document, DocumentPage, DocumentQuery, DocumentStore, DocumentStoreError,
    DocumentType,
};
#[cfg(test)]
pub use seed_source::MockConventionSeedSource;
pub use seed_source::{ConventionSeedSource, SeedSourceError, StaticSeedSource};
