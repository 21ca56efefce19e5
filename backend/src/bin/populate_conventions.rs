//! Seed the document container with the bulk convention dataset.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use convention_backend::config::{DocumentStoreSettings, SeedSettings};
use convention_backend::domain::DocumentConventionManager;
use convention_backend::domain::ports::{ConventionManager, DocumentStore};
use convention_backend::outbound::memory::InMemoryDocumentStore;
use convention_backend::outbound::persistence::{DbPool, DieselDocumentStore};
use convention_backend::outbound::seed::JsonFileSeedSource;
use futures_util::TryStreamExt;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `populate-conventions` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "populate-conventions",
    about = "Seed the convention document container unless it already holds data",
    version
)]
struct CliArgs {
    /// Seed file; overrides `CONVENTION_SEED_PATH`.
    #[arg(long = "seed-path", value_name = "path")]
    seed_path: Option<PathBuf>,
    /// Database connection URL; overrides `DOCUMENT_STORE_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Target database id; overrides `DOCUMENT_STORE_DATABASE_ID`.
    #[arg(long = "database-id", value_name = "id")]
    database_id: Option<String>,
    /// Target container id; overrides `DOCUMENT_STORE_CONTAINER_ID`.
    #[arg(long = "container-id", value_name = "id")]
    container_id: Option<String>,
    /// Ledger container id; overrides `DOCUMENT_STORE_REGISTRATION_CONTAINER_ID`.
    #[arg(long = "registration-container-id", value_name = "id")]
    registration_container_id: Option<String>,
    /// Drop both containers before seeding.
    #[arg(long)]
    clear: bool,
    /// Seed a throwaway in-memory container to validate the dataset.
    #[arg(long = "dry-run")]
    dry_run: bool,
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let (store_settings, seed_settings) = load_settings(&args)?;
    let seed = Arc::new(JsonFileSeedSource::new(seed_settings.path));

    if args.dry_run {
        let store = Arc::new(InMemoryDocumentStore::new());
        return populate(store, &store_settings, seed, false).await;
    }

    let pool_config = store_settings.pool_config().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "database URL missing: set --database-url or DOCUMENT_STORE_DATABASE_URL",
        )
    })?;
    let pool = DbPool::new(pool_config)
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    populate(
        Arc::new(DieselDocumentStore::new(pool)),
        &store_settings,
        seed,
        args.clear,
    )
    .await
}

/// Layer CLI flags over settings read from files and the environment.
fn load_settings(args: &CliArgs) -> io::Result<(DocumentStoreSettings, SeedSettings)> {
    let program = [OsString::from("populate-conventions")];
    let mut store = DocumentStoreSettings::load_from_iter(program.clone())
        .map_err(|error| io::Error::other(format!("load document store settings: {error}")))?;
    let mut seed = SeedSettings::load_from_iter(program)
        .map_err(|error| io::Error::other(format!("load seed settings: {error}")))?;

    if args.database_url.is_some() {
        store.database_url.clone_from(&args.database_url);
    }
    if let Some(database_id) = &args.database_id {
        store.database_id.clone_from(database_id);
    }
    if let Some(container_id) = &args.container_id {
        store.container_id.clone_from(container_id);
    }
    if let Some(container_id) = &args.registration_container_id {
        store.registration_container_id.clone_from(container_id);
    }
    if let Some(path) = &args.seed_path {
        seed.path.clone_from(path);
    }
    Ok((store, seed))
}

async fn populate<S>(
    store: Arc<S>,
    settings: &DocumentStoreSettings,
    seed: Arc<JsonFileSeedSource>,
    clear: bool,
) -> io::Result<()>
where
    S: DocumentStore + 'static,
{
    let manager =
        DocumentConventionManager::with_seed_source(store, settings.manager_options(), seed);
    if clear {
        manager
            .clear()
            .await
            .map_err(|error| io::Error::other(format!("clear container: {error}")))?;
    }
    manager
        .populate_data()
        .await
        .map_err(|error| io::Error::other(format!("populate conventions: {error}")))?;

    let count = manager
        .conventions(0)
        .try_fold(0_usize, |count, _| async move { Ok(count + 1) })
        .await
        .map_err(|error| io::Error::other(format!("list conventions: {error}")))?;
    info!(count, "convention container populated");
    println!("conventions={count}");
    Ok(())
}
