//! Domain model and services for conventions and registrations.
//!
//! Purpose: keep the registration and aggregation rules transport agnostic.
//! Inbound adapters talk to a [`ports::ConventionManager`]; the two managers
//! here implement it over process memory and over a [`ports::DocumentStore`].
//!
//! Public surface:
//! - Convention, Event, EventType, UserInfo: the convention model.
//! - RegistrationLedger, RegistrationItem, RegistrationDelta, TargetType:
//!   per-user registrations and the delta rule.
//! - ValidationError, ErrorCode, ConventionError: manager failures.
//! - InMemoryConventionManager, DocumentConventionManager: backends.

pub mod convention;
pub mod document_manager;
pub mod error;
pub mod in_memory_manager;
pub mod ports;
pub mod registration;
mod user_view;

pub use self::convention::{Convention, Event, EventType, UserInfo};
pub use self::document_manager::{
    DocumentConventionManager, DocumentManagerOptions, PARTITION_KEY_PATH,
};
pub use self::error::{ConventionError, ErrorCode, ValidationError};
pub use self::in_memory_manager::InMemoryConventionManager;
pub use self::registration::{RegistrationDelta, RegistrationItem, RegistrationLedger, TargetType};
