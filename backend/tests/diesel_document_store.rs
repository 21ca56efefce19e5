//! Integration tests for `DieselDocumentStore` against embedded PostgreSQL.
//!
//! Each test starts an embedded cluster and works in a fresh schema, checking
//! the table layout, conflict mapping and keyset paging against a real
//! server. Set `SKIP_TEST_CLUSTER=1` where the cluster cannot start.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use convention_backend::domain::ports::{
    ContainerHandle, ConventionManager, Document, DocumentQuery, DocumentStore,
    DocumentStoreError, DocumentType,
};
use convention_backend::domain::{
    Convention, DocumentConventionManager, DocumentManagerOptions, Event, EventType,
    PARTITION_KEY_PATH, RegistrationLedger,
};
use convention_backend::outbound::persistence::{DbPool, DieselDocumentStore, PoolConfig};
use futures_util::TryStreamExt;
use pg_embedded_setup_unpriv::TestCluster;
use rstest::rstest;
use tokio::runtime::Runtime;
use uuid::Uuid;

mod support;

use support::{skip_without_cluster, test_cluster};

/// Fields drop in declaration order: the pool goes before the cluster.
struct TestContext {
    store: DieselDocumentStore,
    database_id: String,
    runtime: Runtime,
    _cluster: TestCluster,
}

fn setup() -> Option<TestContext> {
    let cluster = match test_cluster() {
        Ok(cluster) => cluster,
        Err(reason) => return skip_without_cluster(reason),
    };
    let runtime = Runtime::new().expect("tokio runtime");
    let url = cluster.connection().database_url("postgres");
    let config = PoolConfig::new(url).with_max_size(2).with_min_idle(Some(1));
    let pool = runtime
        .block_on(DbPool::new(config))
        .expect("database pool");

    Some(TestContext {
        store: DieselDocumentStore::new(pool),
        database_id: format!("test_{}", Uuid::new_v4().simple()),
        runtime,
        _cluster: cluster,
    })
}

impl TestContext {
    fn container(&self, container_id: &str) -> ContainerHandle {
        self.runtime.block_on(async {
            self.store
                .create_database_if_not_exists(&self.database_id)
                .await
                .expect("schema created");
            self.store
                .create_container_if_not_exists(&self.database_id, container_id, PARTITION_KEY_PATH)
                .await
                .expect("table created")
        })
    }
}

fn convention(id: &str) -> Convention {
    let at = Utc
        .with_ymd_and_hms(2022, 6, 14, 11, 0, 0)
        .single()
        .expect("valid timestamp");
    Convention::new(format!("Convention {id}"), at, at).with_id(id)
}

#[rstest]
fn documents_round_trip_with_conflict_and_not_found_mapping() {
    let Some(ctx) = setup() else { return };
    let container = ctx.container("items");

    ctx.runtime.block_on(async {
        let created = ctx
            .store
            .create_item(&container, Document::from_convention(convention("c1")))
            .await
            .expect("created");
        let duplicate = ctx
            .store
            .create_item(&container, Document::from_convention(convention("c1")))
            .await
            .expect_err("duplicate id");
        assert!(matches!(duplicate, DocumentStoreError::Conflict { id } if id == "c1"));

        let read = ctx.store.read_item(&container, "c1").await.expect("read");
        assert_eq!(read, created);

        let missing = ctx
            .store
            .read_item(&container, "missing")
            .await
            .expect_err("absent");
        assert!(matches!(missing, DocumentStoreError::NotFound { .. }));

        let replace_missing = ctx
            .store
            .replace_item(&container, Document::from_convention(convention("c2")))
            .await
            .expect_err("replace needs an existing row");
        assert!(matches!(replace_missing, DocumentStoreError::NotFound { .. }));

        let mut ledger = RegistrationLedger::new("u1");
        ledger.register_convention("c1", 3);
        ctx.store
            .upsert_item(&container, Document::from_registration(ledger.clone()))
            .await
            .expect("inserted");
        ledger.register_convention("c1", 5);
        ctx.store
            .upsert_item(&container, Document::from_registration(ledger.clone()))
            .await
            .expect("overwritten");
        let stored = ctx
            .store
            .read_item(&container, "u1")
            .await
            .expect("read")
            .into_registration()
            .expect("ledger payload");
        assert_eq!(stored, ledger);
        assert_eq!(ctx.store.count_items(&container).await.expect("count"), 2);
    });
}

#[rstest]
fn query_pages_by_id_and_honours_allow_list() {
    let Some(ctx) = setup() else { return };
    let container = ctx.container("items");

    ctx.runtime.block_on(async {
        for id in ["c3", "c1", "c5", "c2", "c4"] {
            ctx.store
                .create_item(&container, Document::from_convention(convention(id)))
                .await
                .expect("created");
        }
        ctx.store
            .upsert_item(
                &container,
                Document::from_registration(RegistrationLedger::new("c0-user")),
            )
            .await
            .expect("ledger");

        let query = DocumentQuery::of_type(DocumentType::Convention);
        let mut ids = Vec::new();
        let mut continuation = None;
        let mut pages = 0;
        loop {
            let page = ctx
                .store
                .query_items(&container, &query, continuation, 2)
                .await
                .expect("page");
            pages += 1;
            ids.extend(page.documents.into_iter().map(|document| document.id));
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        assert_eq!(ids, ["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(pages, 3);

        let allowed = query.with_ids(vec!["c4".to_owned(), "c2".to_owned(), "gone".to_owned()]);
        let page = ctx
            .store
            .query_items(&container, &allowed, None, 10)
            .await
            .expect("page");
        let ids: Vec<String> = page.documents.into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["c2", "c4"]);
        assert!(page.continuation.is_none());
    });
}

#[rstest]
fn provisioning_is_idempotent_and_delete_tolerates_missing_tables() {
    let Some(ctx) = setup() else { return };
    let first = ctx.container("items");
    let second = ctx.container("items");
    assert_eq!(first, second);

    ctx.runtime.block_on(async {
        ctx.store
            .upsert_item(&first, Document::from_convention(convention("c1")))
            .await
            .expect("stored");
        ctx.store.delete_container(&first).await.expect("dropped");
        ctx.store
            .delete_container(&first)
            .await
            .expect("dropping twice is fine");
    });

    let recreated = ctx.container("items");
    let count = ctx
        .runtime
        .block_on(ctx.store.count_items(&recreated))
        .expect("count");
    assert_eq!(count, 0);
}

#[rstest]
fn manager_registers_through_postgres() {
    let Some(ctx) = setup() else { return };
    let manager = DocumentConventionManager::new(
        Arc::new(ctx.store.clone()),
        DocumentManagerOptions {
            database_id: ctx.database_id.clone(),
            container_id: "conventions".to_owned(),
            registration_container_id: "registrations".to_owned(),
            page_size: 2,
        },
    );

    ctx.runtime.block_on(async {
        let at = Utc
            .with_ymd_and_hms(2022, 6, 15, 20, 0, 0)
            .single()
            .expect("valid timestamp");
        let created = manager
            .create_convention(
                convention("wedding").with_event(Event::new(EventType::Event, "Jazz", at, at)),
            )
            .await
            .expect("created");
        let event_id = created.events[0].id.clone();

        manager
            .register_convention("wedding", "u1", 10)
            .await
            .expect("u1");
        manager
            .register_convention("wedding", "u2", 5)
            .await
            .expect("u2");
        manager
            .register_event("wedding", &event_id, "u1", 3)
            .await
            .expect("event");

        let stored = manager
            .get_convention("wedding")
            .await
            .expect("read")
            .expect("present");
        assert_eq!(stored.total_number_of_participants, 15);
        assert_eq!(stored.events[0].total_number_of_participants, 3);

        let registered: Vec<Convention> = manager
            .registered_conventions("u1")
            .try_collect()
            .await
            .expect("listed");
        assert_eq!(registered.len(), 1);
        assert_eq!(
            registered[0]
                .user_info
                .as_ref()
                .map(|info| info.number_of_participants),
            Some(10)
        );
    });
}
