//! Convention manager backed by a document store.
//!
//! Conventions and per-user registration ledgers live in two containers of
//! one database, each document partitioned by its own id, so a user id may
//! equal a convention id. Both containers are provisioned on first use and
//! their handles cached for the lifetime of the manager.
//!
//! Registration writes the ledger first and the convention second. The two
//! upserts are not atomic: a failure between them leaves the ledger ahead of
//! the aggregate, and concurrent registrations for the same user may race.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::stream;
use futures_util::{Stream, StreamExt, TryStreamExt, future};
use tracing::{debug, info, warn};

use super::ports::{
    ContainerHandle, ConventionManager, ConventionSeedSource, ConventionStream, Document,
    DocumentQuery, DocumentStore, DocumentStoreError, DocumentType, StaticSeedSource,
};
use super::registration::registration_target;
use super::user_view::scoped_to;
use super::{Convention, ConventionError, RegistrationLedger, ValidationError};

/// Partition key path of both containers.
pub const PARTITION_KEY_PATH: &str = "/id";

/// Placement and paging options for [`DocumentConventionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentManagerOptions {
    pub database_id: String,
    /// Container holding convention documents.
    pub container_id: String,
    /// Container holding registration ledgers; must differ from `container_id`.
    pub registration_container_id: String,
    /// Upper bound on documents fetched per query page.
    pub page_size: u32,
}

impl Default for DocumentManagerOptions {
    fn default() -> Self {
        Self {
            database_id: "conventions".to_owned(),
            container_id: "conventions".to_owned(),
            registration_container_id: "registrations".to_owned(),
            page_size: 100,
        }
    }
}

/// Provisioned container handles.
#[derive(Debug, Clone)]
struct Containers {
    conventions: ContainerHandle,
    registrations: ContainerHandle,
}

/// Convention manager persisting through a [`DocumentStore`].
pub struct DocumentConventionManager<S> {
    store: Arc<S>,
    options: DocumentManagerOptions,
    seed: Arc<dyn ConventionSeedSource>,
    containers: RwLock<Option<Containers>>,
}

impl<S> DocumentConventionManager<S> {
    /// Create a manager with an empty seed source.
    pub fn new(store: Arc<S>, options: DocumentManagerOptions) -> Self {
        Self::with_seed_source(store, options, Arc::new(StaticSeedSource::default()))
    }

    /// Create a manager seeded from `seed` on `populate_data`.
    pub fn with_seed_source(
        store: Arc<S>,
        options: DocumentManagerOptions,
        seed: Arc<dyn ConventionSeedSource>,
    ) -> Self {
        Self {
            store,
            options,
            seed,
            containers: RwLock::new(None),
        }
    }

    fn cached_containers(&self) -> Option<Containers> {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cache_containers(&self, containers: Option<Containers>) {
        *self.containers.write().unwrap_or_else(PoisonError::into_inner) = containers;
    }

    fn configured_containers(&self) -> Containers {
        let handle = |container_id: &str| ContainerHandle {
            database_id: self.options.database_id.clone(),
            container_id: container_id.to_owned(),
        };
        Containers {
            conventions: handle(&self.options.container_id),
            registrations: handle(&self.options.registration_container_id),
        }
    }

    fn page_hint(&self, max: usize) -> u32 {
        let page_size = self.options.page_size.max(1);
        match u32::try_from(max) {
            Ok(0) => page_size,
            Ok(max) => max.min(page_size),
            Err(_) => page_size,
        }
    }
}

/// Map a store `NotFound` onto an absent value.
fn found<T>(result: Result<T, DocumentStoreError>) -> Result<Option<T>, DocumentStoreError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DocumentStoreError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

impl<S> DocumentConventionManager<S>
where
    S: DocumentStore,
{
    async fn containers(&self) -> Result<Containers, ConventionError> {
        if let Some(containers) = self.cached_containers() {
            return Ok(containers);
        }

        let DocumentManagerOptions {
            database_id,
            container_id,
            registration_container_id,
            ..
        } = &self.options;
        if container_id == registration_container_id {
            return Err(ValidationError::invalid_argument(format!(
                "registrations need their own container, not {container_id}"
            ))
            .into());
        }
        self.store.create_database_if_not_exists(database_id).await?;
        let containers = Containers {
            conventions: self.provision(database_id, container_id).await?,
            registrations: self.provision(database_id, registration_container_id).await?,
        };
        self.cache_containers(Some(containers.clone()));
        Ok(containers)
    }

    async fn provision(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<ContainerHandle, ConventionError> {
        let handle = self
            .store
            .create_container_if_not_exists(database_id, container_id, PARTITION_KEY_PATH)
            .await?;
        info!(
            database_id = %handle.database_id,
            container_id = %handle.container_id,
            "document container ready"
        );
        Ok(handle)
    }

    /// Read `id` as a convention; any other document type reads as absent.
    async fn read_convention(
        &self,
        container: &ContainerHandle,
        id: &str,
    ) -> Result<Option<Convention>, ConventionError> {
        debug!(convention_id = id, "reading convention");
        let document = found(self.store.read_item(container, id).await)?
            .filter(|document| document.doc_type == DocumentType::Convention);
        Ok(document.map(Document::into_convention).transpose()?)
    }

    /// Read `user_id`'s ledger; any other document type reads as absent.
    async fn read_ledger(
        &self,
        container: &ContainerHandle,
        user_id: &str,
    ) -> Result<Option<RegistrationLedger>, ConventionError> {
        debug!(user_id, "reading registration ledger");
        let document = found(self.store.read_item(container, user_id).await)?
            .filter(|document| document.doc_type == DocumentType::Registration);
        Ok(document.map(Document::into_registration).transpose()?)
    }

    /// Persist a registration: ledger first, then the convention.
    async fn write_registration(
        &self,
        containers: &Containers,
        ledger: RegistrationLedger,
        convention: Convention,
    ) -> Result<(), ConventionError> {
        self.store
            .upsert_item(&containers.registrations, Document::from_registration(ledger))
            .await?;
        self.store
            .upsert_item(&containers.conventions, Document::from_convention(convention))
            .await?;
        Ok(())
    }

    /// Remove ledger items pointing at events `convention` no longer has.
    async fn prune_dropped_events(
        &self,
        container: &ContainerHandle,
        convention: &Convention,
    ) -> Result<(), ConventionError> {
        let query = DocumentQuery::of_type(DocumentType::Registration);
        let pruned: Vec<RegistrationLedger> = self
            .documents(container.clone(), query, self.page_hint(0))
            .and_then(|document| {
                future::ready(document.into_registration().map_err(ConventionError::from))
            })
            .try_filter_map(|mut ledger| {
                future::ready(Ok(ledger
                    .prune_dropped_events(convention)
                    .then_some(ledger)))
            })
            .try_collect()
            .await?;

        let ledgers = pruned.len();
        for ledger in pruned {
            self.store
                .upsert_item(container, Document::from_registration(ledger))
                .await?;
        }
        debug!(convention_id = %convention.id, ledgers, "dropped event registrations pruned");
        Ok(())
    }

    /// Page through `query` as one continuous stream of documents.
    fn documents<'a>(
        &'a self,
        container: ContainerHandle,
        query: DocumentQuery,
        page_size: u32,
    ) -> impl Stream<Item = Result<Document, ConventionError>> + Send + 'a {
        stream::try_unfold(Some(None::<String>), move |cursor| {
            let container = container.clone();
            let query = query.clone();
            async move {
                let Some(continuation) = cursor else {
                    return Ok::<_, ConventionError>(None);
                };
                let page = self
                    .store
                    .query_items(&container, &query, continuation, page_size)
                    .await?;
                debug!(
                    documents = page.documents.len(),
                    more = page.continuation.is_some(),
                    "fetched document page"
                );
                Ok(Some((page.documents, page.continuation.map(Some))))
            }
        })
        .map_ok(|documents| stream::iter(documents.into_iter().map(Ok)))
        .try_flatten()
    }

    /// Live conventions matching `ids` (all when `None`), capped at `max`.
    fn live_conventions<'a>(
        &'a self,
        ids: Option<Vec<String>>,
        max: usize,
    ) -> ConventionStream<'a> {
        let page_size = self.page_hint(max);
        let limit = if max == 0 { usize::MAX } else { max };
        stream::once(self.containers())
            .map_ok(move |containers| {
                let mut query = DocumentQuery::of_type(DocumentType::Convention);
                if let Some(ids) = ids.clone() {
                    query = query.with_ids(ids);
                }
                self.documents(containers.conventions, query, page_size)
            })
            .try_flatten()
            .and_then(|document| {
                future::ready(document.into_convention().map_err(ConventionError::from))
            })
            .try_filter(|convention| future::ready(!convention.is_deleted))
            .take(limit)
            .boxed()
    }

    /// Stream produced after resolving `user_id`'s ledger.
    fn with_ledger<'a, F>(&'a self, user_id: &'a str, listing: F) -> ConventionStream<'a>
    where
        F: FnOnce(Option<RegistrationLedger>) -> ConventionStream<'a> + Send + 'a,
    {
        stream::once(async move {
            let containers = self.containers().await?;
            let ledger = self.read_ledger(&containers.registrations, user_id).await?;
            Ok::<_, ConventionError>(listing(ledger))
        })
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl<S> ConventionManager for DocumentConventionManager<S>
where
    S: DocumentStore + 'static,
{
    async fn create_convention(
        &self,
        convention: Convention,
    ) -> Result<Convention, ConventionError> {
        let containers = self.containers().await?;
        let record = convention.into_new_record();
        match self
            .store
            .create_item(&containers.conventions, Document::from_convention(record.clone()))
            .await
        {
            Ok(_) => {
                info!(convention_id = %record.id, "convention created");
                Ok(record)
            }
            Err(DocumentStoreError::Conflict { id }) => Err(ValidationError::already_exists(
                format!("convention {id} already exists"),
            )
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_convention(&self, id: &str) -> Result<Option<Convention>, ConventionError> {
        let containers = self.containers().await?;
        self.read_convention(&containers.conventions, id).await
    }

    async fn update_convention(
        &self,
        convention: Convention,
    ) -> Result<Convention, ConventionError> {
        let containers = self.containers().await?;
        let not_found =
            || ValidationError::not_found(format!("convention {} does not exist", convention.id));
        let Some(stored) = self
            .read_convention(&containers.conventions, &convention.id)
            .await?
        else {
            return Err(not_found().into());
        };
        let record = convention.clone().into_replacement_of(&stored);
        match self
            .store
            .replace_item(&containers.conventions, Document::from_convention(record.clone()))
            .await
        {
            Ok(_) => {}
            Err(DocumentStoreError::NotFound { .. }) => return Err(not_found().into()),
            Err(err) => return Err(err.into()),
        }

        let dropped_events = stored
            .events
            .iter()
            .any(|event| record.event(&event.id).is_none());
        if dropped_events {
            self.prune_dropped_events(&containers.registrations, &record)
                .await?;
        }
        info!(convention_id = %record.id, "convention updated");
        Ok(record)
    }

    async fn delete_convention(&self, id: &str) -> Result<(), ConventionError> {
        let containers = self.containers().await?;
        let Some(mut stored) = self.read_convention(&containers.conventions, id).await? else {
            return Ok(());
        };
        if stored.is_deleted {
            return Ok(());
        }
        stored.is_deleted = true;
        found(
            self.store
                .replace_item(&containers.conventions, Document::from_convention(stored))
                .await,
        )?;
        info!(convention_id = id, "convention deleted");
        Ok(())
    }

    fn conventions(&self, max: usize) -> ConventionStream<'_> {
        self.live_conventions(None, max)
    }

    fn conventions_for_user<'a>(&'a self, user_id: &'a str, max: usize) -> ConventionStream<'a> {
        self.with_ledger(user_id, move |ledger| {
            self.live_conventions(None, max)
                .map_ok(move |convention| scoped_to(convention, ledger.as_ref()))
                .boxed()
        })
    }

    fn registered_conventions<'a>(&'a self, user_id: &'a str) -> ConventionStream<'a> {
        self.with_ledger(user_id, move |ledger| {
            let Some(ledger) = ledger else {
                return stream::empty().boxed();
            };
            let ids = ledger.convention_ids();
            if ids.is_empty() {
                return stream::empty().boxed();
            }
            self.live_conventions(Some(ids), 0)
                .map_ok(move |convention| scoped_to(convention, Some(&ledger)))
                .boxed()
        })
    }

    async fn register_convention(
        &self,
        convention_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError> {
        let containers = self.containers().await?;
        let stored = self
            .read_convention(&containers.conventions, convention_id)
            .await?;
        let mut convention = registration_target(stored, convention_id, user_id)?;
        let mut ledger = self
            .read_ledger(&containers.registrations, user_id)
            .await?
            .unwrap_or_else(|| RegistrationLedger::new(user_id));

        let delta = ledger.record_convention(&mut convention, number_of_participants);
        debug!(
            convention_id,
            user_id,
            prior = delta.prior,
            next = delta.next,
            "convention registration recorded"
        );
        if delta.is_noop() {
            return Ok(());
        }
        self.write_registration(&containers, ledger, convention).await
    }

    async fn register_event(
        &self,
        convention_id: &str,
        event_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError> {
        let containers = self.containers().await?;
        let stored = self
            .read_convention(&containers.conventions, convention_id)
            .await?;
        let mut convention = registration_target(stored, convention_id, user_id)?;
        let mut ledger = self
            .read_ledger(&containers.registrations, user_id)
            .await?
            .unwrap_or_else(|| RegistrationLedger::new(user_id));

        let delta = ledger.record_event(&mut convention, event_id, number_of_participants)?;
        debug!(
            convention_id,
            event_id,
            user_id,
            prior = delta.prior,
            next = delta.next,
            "event registration recorded"
        );
        if delta.is_noop() {
            return Ok(());
        }
        self.write_registration(&containers, ledger, convention).await
    }

    async fn populate_data(&self) -> Result<(), ConventionError> {
        let containers = self.containers().await?;
        let existing = self.store.count_items(&containers.conventions).await?;
        if existing > 0 {
            debug!(existing, "documents already present; skipping seed");
            return Ok(());
        }

        let seeds = self.seed.load().await?;
        let mut created = 0_usize;
        for seed in seeds {
            let record = seed.into_new_record();
            match self
                .store
                .create_item(&containers.conventions, Document::from_convention(record))
                .await
            {
                Ok(_) => created += 1,
                Err(DocumentStoreError::Conflict { id }) => {
                    warn!(convention_id = %id, "duplicate seed convention skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }
        info!(count = created, "seeded conventions");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConventionError> {
        let containers = self
            .cached_containers()
            .unwrap_or_else(|| self.configured_containers());
        for handle in [&containers.conventions, &containers.registrations] {
            self.store.delete_container(handle).await?;
            info!(container_id = %handle.container_id, "cleared document container");
        }
        self.cache_containers(None);
        Ok(())
    }
}
