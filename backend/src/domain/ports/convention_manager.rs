//! Driving port for convention management.
//!
//! Both the in-memory manager and the document-store manager implement
//! [`ConventionManager`] with identical observable behaviour, so inbound
//! adapters can hold an `Arc<dyn ConventionManager>` without knowing which
//! backend is active.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{Convention, ConventionError};

/// Lazy sequence of conventions produced by the listing operations.
///
/// Each call performs a fresh snapshot or query; a stream is not replayable.
pub type ConventionStream<'a> = BoxStream<'a, Result<Convention, ConventionError>>;

/// Operation set shared by every convention backend.
///
/// Validation failures surface as [`ConventionError::Validation`]; storage and
/// seed failures propagate unmodified as the remaining variants.
#[async_trait]
pub trait ConventionManager: Send + Sync {
    /// Store a new convention, assigning ids to it and to events lacking one.
    ///
    /// # Errors
    /// `AlreadyExists` when an explicit id is already taken.
    async fn create_convention(&self, convention: Convention)
    -> Result<Convention, ConventionError>;

    /// Point lookup; deleted conventions are still returned, flagged.
    async fn get_convention(&self, id: &str) -> Result<Option<Convention>, ConventionError>;

    /// Replace the client-authored fields of an existing convention.
    ///
    /// # Errors
    /// `NotFound` when the id is unknown.
    async fn update_convention(&self, convention: Convention)
    -> Result<Convention, ConventionError>;

    /// Logically delete a convention. Unknown ids are ignored.
    async fn delete_convention(&self, id: &str) -> Result<(), ConventionError>;

    /// List live conventions, at most `max` of them (`0` means unbounded).
    fn conventions(&self, max: usize) -> ConventionStream<'_>;

    /// List live conventions annotated with `user_id`'s registrations.
    fn conventions_for_user<'a>(&'a self, user_id: &'a str, max: usize) -> ConventionStream<'a>;

    /// List the live conventions `user_id` is registered for.
    fn registered_conventions<'a>(&'a self, user_id: &'a str) -> ConventionStream<'a>;

    /// Set `user_id`'s participant count for a convention; zero unregisters.
    ///
    /// # Errors
    /// `NotFound` for an unknown or deleted convention, `InvalidArgument` for
    /// an empty user id.
    async fn register_convention(
        &self,
        convention_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError>;

    /// Set `user_id`'s participant count for one event; zero unregisters.
    ///
    /// # Errors
    /// `NotFound` for an unknown convention or event, `InvalidArgument` for an
    /// empty user id, `FailedPrecondition` without a convention registration
    /// or when the count exceeds it.
    async fn register_event(
        &self,
        convention_id: &str,
        event_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError>;

    /// Seed sample conventions unless any record already exists.
    async fn populate_data(&self) -> Result<(), ConventionError>;

    /// Remove every convention and ledger.
    async fn clear(&self) -> Result<(), ConventionError>;
}
