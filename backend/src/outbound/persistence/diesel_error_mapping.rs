//! Translation of pool and Diesel failures into document store errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::DocumentStoreError;

use super::pool::PoolError;

pub(super) fn map_pool_error(error: PoolError) -> DocumentStoreError {
    DocumentStoreError::connection(error.into_message())
}

/// Map a Diesel failure raised while running `operation`.
pub(super) fn map_diesel_error(error: DieselError, operation: &str) -> DocumentStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DocumentStoreError::connection(format!("{operation}: database connection closed"))
        }
        DieselError::DeserializationError(err) => {
            DocumentStoreError::serialization(format!("{operation}: {err}"))
        }
        other => DocumentStoreError::query(format!("{operation}: {other}")),
    }
}

/// Like [`map_diesel_error`], but reports unique violations as a conflict on `id`.
pub(super) fn map_insert_error(error: DieselError, id: &str) -> DocumentStoreError {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            DocumentStoreError::conflict(id)
        }
        other => map_diesel_error(other, "create document"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let mapped = map_pool_error(PoolError::Checkout {
            message: "timed out".to_owned(),
        });

        assert_eq!(mapped, DocumentStoreError::connection("timed out"));
    }

    #[rstest]
    fn unique_violation_becomes_conflict() {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_owned()),
        );

        assert_eq!(
            map_insert_error(error, "c1"),
            DocumentStoreError::conflict("c1")
        );
    }

    #[rstest]
    fn closed_connection_becomes_connection_error() {
        let error = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("gone".to_owned()),
        );

        assert!(matches!(
            map_diesel_error(error, "read document"),
            DocumentStoreError::Connection { .. }
        ));
    }

    #[rstest]
    fn other_failures_become_query_errors() {
        assert!(matches!(
            map_insert_error(DieselError::NotFound, "c1"),
            DocumentStoreError::Query { .. }
        ));
    }
}
