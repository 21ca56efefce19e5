//! Process-local `DocumentStore` for tests and local development.
//!
//! Databases map to containers, containers to documents kept in insertion
//! order. Continuation tokens are decimal offsets into that order.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{
    ContainerHandle, Document, DocumentPage, DocumentQuery, DocumentStore, DocumentStoreError,
};

type Container = Vec<Document>;
type Database = HashMap<String, Container>;

/// In-memory implementation of the [`DocumentStore`] port.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    databases: RwLock<HashMap<String, Database>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Database>> {
        self.databases.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Database>> {
        self.databases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the container's documents.
    fn with_container<T>(
        &self,
        handle: &ContainerHandle,
        f: impl FnOnce(&mut Container) -> Result<T, DocumentStoreError>,
    ) -> Result<T, DocumentStoreError> {
        let mut databases = self.write();
        let container = databases
            .get_mut(&handle.database_id)
            .and_then(|database| database.get_mut(&handle.container_id))
            .ok_or_else(|| missing_container(handle))?;
        f(container)
    }
}

fn missing_container(handle: &ContainerHandle) -> DocumentStoreError {
    DocumentStoreError::query(format!(
        "container {}/{} does not exist",
        handle.database_id, handle.container_id
    ))
}

fn parse_offset(continuation: Option<&str>) -> Result<usize, DocumentStoreError> {
    continuation.map_or(Ok(0), |token| {
        token
            .parse()
            .map_err(|_| DocumentStoreError::query(format!("invalid continuation {token:?}")))
    })
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<(), DocumentStoreError> {
        self.write().entry(database_id.to_owned()).or_default();
        Ok(())
    }

    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        container_id: &str,
        _partition_key_path: &str,
    ) -> Result<ContainerHandle, DocumentStoreError> {
        let mut databases = self.write();
        let database = databases.get_mut(database_id).ok_or_else(|| {
            DocumentStoreError::query(format!("database {database_id} does not exist"))
        })?;
        database.entry(container_id.to_owned()).or_default();
        Ok(ContainerHandle {
            database_id: database_id.to_owned(),
            container_id: container_id.to_owned(),
        })
    }

    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
    ) -> Result<Document, DocumentStoreError> {
        let databases = self.read();
        let documents = databases
            .get(&container.database_id)
            .and_then(|database| database.get(&container.container_id))
            .ok_or_else(|| missing_container(container))?;
        documents
            .iter()
            .find(|document| document.id == id)
            .cloned()
            .ok_or_else(|| DocumentStoreError::not_found(id))
    }

    async fn create_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        self.with_container(container, |documents| {
            if documents.iter().any(|stored| stored.id == document.id) {
                return Err(DocumentStoreError::conflict(document.id.clone()));
            }
            documents.push(document.clone());
            Ok(document)
        })
    }

    async fn replace_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        self.with_container(container, |documents| {
            let Some(slot) = documents.iter_mut().find(|stored| stored.id == document.id) else {
                return Err(DocumentStoreError::not_found(document.id.clone()));
            };
            *slot = document.clone();
            Ok(document)
        })
    }

    async fn upsert_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        self.with_container(container, |documents| {
            if let Some(slot) = documents.iter_mut().find(|stored| stored.id == document.id) {
                *slot = document.clone();
            } else {
                documents.push(document.clone());
            }
            Ok(document)
        })
    }

    async fn query_items(
        &self,
        container: &ContainerHandle,
        query: &DocumentQuery,
        continuation: Option<String>,
        page_size: u32,
    ) -> Result<DocumentPage, DocumentStoreError> {
        let offset = parse_offset(continuation.as_deref())?;
        let page_size = usize::try_from(page_size.max(1)).unwrap_or(usize::MAX);
        let databases = self.read();
        let documents = databases
            .get(&container.database_id)
            .and_then(|database| database.get(&container.container_id))
            .ok_or_else(|| missing_container(container))?;

        let mut scanned = offset;
        let mut page = Vec::new();
        for document in documents.iter().skip(offset) {
            if page.len() == page_size {
                break;
            }
            scanned += 1;
            if query.matches(document) {
                page.push(document.clone());
            }
        }
        let continuation = (scanned < documents.len()).then(|| scanned.to_string());
        debug!(documents = page.len(), offset, "queried in-memory page");
        Ok(DocumentPage {
            documents: page,
            continuation,
        })
    }

    async fn count_items(&self, container: &ContainerHandle) -> Result<u64, DocumentStoreError> {
        let databases = self.read();
        let documents = databases
            .get(&container.database_id)
            .and_then(|database| database.get(&container.container_id))
            .ok_or_else(|| missing_container(container))?;
        Ok(u64::try_from(documents.len()).unwrap_or(u64::MAX))
    }

    async fn delete_container(
        &self,
        container: &ContainerHandle,
    ) -> Result<(), DocumentStoreError> {
        if let Some(database) = self.write().get_mut(&container.database_id) {
            database.remove(&container.container_id);
        }
        Ok(())
    }
}
