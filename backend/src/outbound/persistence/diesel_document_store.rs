//! PostgreSQL-backed `DocumentStore` using Diesel raw SQL.
//!
//! A database maps to a schema and a container to a table of
//! `(id TEXT PRIMARY KEY, doc_type TEXT, body JSONB)`. The document id is the
//! primary key, which doubles as the partition key. Schema and table names are
//! validated identifiers; every value travels as a bound parameter.

use async_trait::async_trait;
use diesel::QueryableByName;
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Jsonb, Nullable, Text};
use diesel_async::RunQueryDsl;
use tracing::{debug, info};

use crate::domain::PARTITION_KEY_PATH;
use crate::domain::ports::{
    ContainerHandle, Document, DocumentPage, DocumentQuery, DocumentStore, DocumentStoreError,
};

use super::diesel_error_mapping::{map_diesel_error, map_insert_error, map_pool_error};
use super::pool::DbPool;

const MAX_IDENTIFIER_BYTES: usize = 63;

/// Diesel-backed implementation of the [`DocumentStore`] port.
#[derive(Clone)]
pub struct DieselDocumentStore {
    pool: DbPool,
}

impl DieselDocumentStore {
    /// Create a store over the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(QueryableByName)]
struct BodyRow {
    #[diesel(sql_type = Jsonb)]
    body: serde_json::Value,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Quote `name` after checking it is a plain PostgreSQL identifier.
fn identifier(name: &str) -> Result<String, DocumentStoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let valid_rest = chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid_start && valid_rest && name.len() <= MAX_IDENTIFIER_BYTES {
        Ok(format!("\"{name}\""))
    } else {
        Err(DocumentStoreError::query(format!(
            "invalid identifier {name:?}"
        )))
    }
}

fn table(container: &ContainerHandle) -> Result<String, DocumentStoreError> {
    Ok(format!(
        "{}.{}",
        identifier(&container.database_id)?,
        identifier(&container.container_id)?
    ))
}

fn encode(document: &Document) -> Result<serde_json::Value, DocumentStoreError> {
    serde_json::to_value(document).map_err(|err| {
        DocumentStoreError::serialization(format!("document {}: {err}", document.id))
    })
}

fn decode(row: BodyRow) -> Result<Document, DocumentStoreError> {
    serde_json::from_value(row.body)
        .map_err(|err| DocumentStoreError::serialization(err.to_string()))
}

#[async_trait]
impl DocumentStore for DieselDocumentStore {
    async fn create_database_if_not_exists(
        &self,
        database_id: &str,
    ) -> Result<(), DocumentStoreError> {
        let statement = format!("CREATE SCHEMA IF NOT EXISTS {}", identifier(database_id)?);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(statement)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "create schema"))?;
        info!(database_id, "document database ready");
        Ok(())
    }

    async fn create_container_if_not_exists(
        &self,
        database_id: &str,
        container_id: &str,
        partition_key_path: &str,
    ) -> Result<ContainerHandle, DocumentStoreError> {
        if partition_key_path != PARTITION_KEY_PATH {
            return Err(DocumentStoreError::query(format!(
                "unsupported partition key path {partition_key_path}"
            )));
        }
        let handle = ContainerHandle {
            database_id: database_id.to_owned(),
            container_id: container_id.to_owned(),
        };
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                id TEXT PRIMARY KEY, \
                doc_type TEXT NOT NULL, \
                body JSONB NOT NULL)",
            table(&handle)?
        );
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(statement)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "create table"))?;
        info!(database_id, container_id, "document container table ready");
        Ok(handle)
    }

    async fn read_item(
        &self,
        container: &ContainerHandle,
        id: &str,
    ) -> Result<Document, DocumentStoreError> {
        let statement = format!("SELECT body FROM {} WHERE id = $1", table(container)?);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<BodyRow> = sql_query(statement)
            .bind::<Text, _>(id)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "read document"))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DocumentStoreError::not_found(id))?;
        decode(row)
    }

    async fn create_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        let statement = format!(
            "INSERT INTO {} (id, doc_type, body) VALUES ($1, $2, $3)",
            table(container)?
        );
        let body = encode(&document)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(statement)
            .bind::<Text, _>(&document.id)
            .bind::<Text, _>(document.doc_type.as_str())
            .bind::<Jsonb, _>(&body)
            .execute(&mut conn)
            .await
            .map_err(|err| map_insert_error(err, &document.id))?;
        Ok(document)
    }

    async fn replace_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        let statement = format!(
            "UPDATE {} SET doc_type = $2, body = $3 WHERE id = $1",
            table(container)?
        );
        let body = encode(&document)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = sql_query(statement)
            .bind::<Text, _>(&document.id)
            .bind::<Text, _>(document.doc_type.as_str())
            .bind::<Jsonb, _>(&body)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "replace document"))?;
        if updated == 0 {
            return Err(DocumentStoreError::not_found(document.id));
        }
        Ok(document)
    }

    async fn upsert_item(
        &self,
        container: &ContainerHandle,
        document: Document,
    ) -> Result<Document, DocumentStoreError> {
        let statement = format!(
            "INSERT INTO {} (id, doc_type, body) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET \
                doc_type = EXCLUDED.doc_type, \
                body = EXCLUDED.body",
            table(container)?
        );
        let body = encode(&document)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(statement)
            .bind::<Text, _>(&document.id)
            .bind::<Text, _>(document.doc_type.as_str())
            .bind::<Jsonb, _>(&body)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "upsert document"))?;
        Ok(document)
    }

    async fn query_items(
        &self,
        container: &ContainerHandle,
        query: &DocumentQuery,
        continuation: Option<String>,
        page_size: u32,
    ) -> Result<DocumentPage, DocumentStoreError> {
        // One extra row tells whether another page exists.
        let statement = format!(
            "SELECT body FROM {} \
             WHERE doc_type = $1 \
               AND ($2::text[] IS NULL OR id = ANY($2)) \
               AND ($3::text IS NULL OR id > $3) \
             ORDER BY id \
             LIMIT $4",
            table(container)?
        );
        let page_size = page_size.max(1);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut rows: Vec<BodyRow> = sql_query(statement)
            .bind::<Text, _>(query.doc_type.as_str())
            .bind::<Nullable<Array<Text>>, _>(query.ids.clone())
            .bind::<Nullable<Text>, _>(continuation)
            .bind::<BigInt, _>(i64::from(page_size) + 1)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "query documents"))?;

        let limit = usize::try_from(page_size).unwrap_or(usize::MAX);
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let documents = rows
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        let continuation = if has_more {
            documents.last().map(|document| document.id.clone())
        } else {
            None
        };
        debug!(
            documents = documents.len(),
            has_more, "queried document page"
        );
        Ok(DocumentPage {
            documents,
            continuation,
        })
    }

    async fn count_items(&self, container: &ContainerHandle) -> Result<u64, DocumentStoreError> {
        let statement = format!("SELECT COUNT(*) AS count FROM {}", table(container)?);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CountRow> = sql_query(statement)
            .load(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "count documents"))?;
        let count = rows.into_iter().next().map_or(0, |row| row.count);
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn delete_container(
        &self,
        container: &ContainerHandle,
    ) -> Result<(), DocumentStoreError> {
        let statement = format!("DROP TABLE IF EXISTS {}", table(container)?);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(statement)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "drop table"))?;
        info!(
            database_id = %container.database_id,
            container_id = %container.container_id,
            "document container dropped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("conventions", true)]
    #[case("_shadow_2", true)]
    #[case("2fast", false)]
    #[case("", false)]
    #[case("drop table; --", false)]
    #[case("quoted\"name", false)]
    fn identifiers_are_validated(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(identifier(name).is_ok(), valid);
    }

    #[rstest]
    fn overlong_identifiers_are_rejected() {
        let name = "a".repeat(MAX_IDENTIFIER_BYTES + 1);
        assert!(identifier(&name).is_err());
        assert!(identifier(&name[..MAX_IDENTIFIER_BYTES]).is_ok());
    }

    #[rstest]
    fn tables_are_schema_qualified() {
        let handle = ContainerHandle {
            database_id: "conventions".to_owned(),
            container_id: "items".to_owned(),
        };

        assert_eq!(
            table(&handle).expect("valid handle"),
            "\"conventions\".\"items\""
        );
    }
}
