//! Port for the single-container document store.
//!
//! Conventions and user registration ledgers share one physical container.
//! Every stored [`Document`] is partitioned by its own id and carries a
//! [`DocumentType`] discriminator selecting which payload field is populated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Convention, RegistrationLedger};

use super::define_port_error;

define_port_error! {
    /// Errors raised by document store adapters.
    pub enum DocumentStoreError {
        /// The store could not be reached.
        Connection { message: String } =>
            "document store connection failed: {message}",
        /// No document exists with the requested id.
        NotFound { id: String } => "document {id} not found",
        /// A document with the same id already exists.
        Conflict { id: String } => "document {id} already exists",
        /// Query or mutation failed during execution.
        Query { message: String } => "document store query failed: {message}",
        /// A document could not be encoded or decoded.
        Serialization { message: String } =>
            "document serialisation failed: {message}",
    }
}

/// Discriminator stored alongside each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Payload lives in [`Document::convention`].
    Convention,
    /// Payload lives in [`Document::registration`].
    Registration,
}

impl DocumentType {
    /// Stable name persisted by adapters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Convention => "Convention",
            Self::Registration => "Registration",
        }
    }
}

/// Type-tagged record held by the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convention: Option<Convention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationLedger>,
}

impl Document {
    /// Wrap a convention, keyed by the convention id.
    pub fn from_convention(convention: Convention) -> Self {
        Self {
            id: convention.id.clone(),
            doc_type: DocumentType::Convention,
            convention: Some(convention),
            registration: None,
        }
    }

    /// Wrap a registration ledger, keyed by the user id.
    pub fn from_registration(ledger: RegistrationLedger) -> Self {
        Self {
            id: ledger.user_id.clone(),
            doc_type: DocumentType::Registration,
            convention: None,
            registration: Some(ledger),
        }
    }

    /// Select the convention payload.
    ///
    /// # Errors
    /// Returns [`DocumentStoreError::Serialization`] when the discriminator
    /// or payload does not describe a convention.
    pub fn into_convention(self) -> Result<Convention, DocumentStoreError> {
        match (self.doc_type, self.convention) {
            (DocumentType::Convention, Some(convention)) => Ok(convention),
            _ => Err(DocumentStoreError::serialization(format!(
                "document {} does not hold a convention",
                self.id
            ))),
        }
    }

    /// Select the registration payload.
    ///
    /// # Errors
    /// Returns [`DocumentStoreError::Serialization`] when the discriminator
    /// or payload does not describe a registration ledger.
    pub fn into_registration(self) -> Result<RegistrationLedger, DocumentStoreError> {
        match (self.doc_type, self.registration) {
            (DocumentType::Registration, Some(ledger)) => Ok(ledger),
            _ => Err(DocumentStoreError::serialization(format!(
                "document {} does not hold a registration ledger",
                self.id
            ))),
        }
    }
}

/// Handle to a provisioned container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    pub database_id: String,
    pub container_id: String,
}

/// Listing filter: a document type plus an optional id allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub doc_type: DocumentType,
    pub ids: Option<Vec<String>>,
}

impl DocumentQuery {
    /// Match every document of `doc_type`.
    pub const fn of_type(doc_type: DocumentType) -> Self {
        Self {
            doc_type,
            ids: None,
        }
    }

    /// Restrict the query to the given ids.
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, document: &Document) -> bool {
        document.doc_type == self.doc_type
            && self
                .ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == &document.id))
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// Token for the next page; `None` once the query is exhausted.
    pub continuation: Option<String>,
}

/// Port for provisioning and accessing the document container.
///
/// Provisioning calls are create-if-absent and must be idempotent: callers
/// may race and provision the same database or container more than once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the logical database unless it already exists.
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<(), DocumentStoreError>;

    /// Create the container unless it already exists.
    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        container_id: &str,
        partition_key_path: &str,
    ) -> Result<ContainerHandle, DocumentStoreError>;

    /// Point read using `id` as the partition key.
    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
    ) -> Result<Document, DocumentStoreError>;

    /// Insert a new document, failing with `Conflict` on a duplicate id.
    async fn create_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError>;

    /// Replace an existing document, failing with `NotFound` when absent.
    async fn replace_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError>;

    /// Insert or overwrite a document.
    async fn upsert_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError>;

    /// Fetch one page of documents matching `query`.
    async fn query_items(
        &self,
        container: &ContainerHandle,
        query: &DocumentQuery,
        continuation: Option<String>,
        page_size: u32,
    ) -> Result<DocumentPage, DocumentStoreError>;

    /// Count every document in the container.
    async fn count_items(&self, container: &ContainerHandle) -> Result<u64, DocumentStoreError>;

    /// Drop the container and all of its documents; a missing container is
    /// not an error.
    async fn delete_container(&self, container: &ContainerHandle)
    -> Result<(), DocumentStoreError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::*;

    fn convention(id: &str) -> Convention {
        let at = Utc
            .with_ymd_and_hms(2022, 5, 1, 16, 0, 0)
            .single()
            .expect("valid timestamp");
        Convention::new("Sample", at, at).with_id(id)
    }

    #[rstest]
    fn convention_documents_are_keyed_by_convention_id() {
        let document = Document::from_convention(convention("c1"));

        assert_eq!(document.id, "c1");
        assert_eq!(document.doc_type, DocumentType::Convention);
        assert_eq!(
            document.into_convention().expect("convention payload").id,
            "c1"
        );
    }

    #[rstest]
    fn registration_documents_are_keyed_by_user_id() {
        let document = Document::from_registration(RegistrationLedger::new("u1"));

        assert_eq!(document.id, "u1");
        let err = document
            .clone()
            .into_convention()
            .expect_err("not a convention");
        assert!(matches!(err, DocumentStoreError::Serialization { .. }));
        assert_eq!(
            document.into_registration().expect("ledger").user_id,
            "u1"
        );
    }

    #[rstest]
    fn document_serialises_type_discriminator() {
        let value = serde_json::to_value(Document::from_registration(RegistrationLedger::new(
            "u1",
        )))
        .expect("serialises");

        assert_eq!(value["type"], "Registration");
        assert_eq!(value["registration"]["id"], "u1");
        assert!(value.get("convention").is_none());
    }

    #[rstest]
    #[case(None, "c1", true)]
    #[case(Some(vec!["c1".to_owned(), "c2".to_owned()]), "c2", true)]
    #[case(Some(vec!["c1".to_owned()]), "c3", false)]
    #[case(Some(Vec::new()), "c1", false)]
    fn query_filters_by_allow_list(
        #[case] ids: Option<Vec<String>>,
        #[case] id: &str,
        #[case] expected: bool,
    ) {
        let query = DocumentQuery {
            doc_type: DocumentType::Convention,
            ids,
        };

        assert_eq!(
            query.matches(&Document::from_convention(convention(id))),
            expected
        );
    }

    #[rstest]
    fn query_filters_by_type() {
        let query = DocumentQuery::of_type(DocumentType::Registration);

        assert!(!query.matches(&Document::from_convention(convention("c1"))));
    }
}
