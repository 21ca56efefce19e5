//! Runtime settings loaded via OrthoConfig.
//!
//! Values layer from configuration files, the environment and the command
//! line over the defaults declared on each field.

use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::DocumentManagerOptions;
use crate::outbound::persistence::PoolConfig;

const DEFAULT_DATABASE_ID: &str = "conventions";
const DEFAULT_CONTAINER_ID: &str = "conventions";
const DEFAULT_REGISTRATION_CONTAINER_ID: &str = "registrations";
const DEFAULT_PAGE_SIZE: u32 = 100;

fn default_seed_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("convention-data.json")
}

/// Location and paging of the document containers.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DOCUMENT_STORE")]
pub struct DocumentStoreSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Logical database (PostgreSQL schema) holding the containers.
    #[ortho_config(default = String::from(DEFAULT_DATABASE_ID))]
    pub database_id: String,
    /// Container (table) holding conventions.
    #[ortho_config(default = String::from(DEFAULT_CONTAINER_ID))]
    pub container_id: String,
    /// Container (table) holding registration ledgers.
    #[ortho_config(default = String::from(DEFAULT_REGISTRATION_CONTAINER_ID))]
    pub registration_container_id: String,
    /// Documents fetched per listing page.
    #[ortho_config(default = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
    /// Maximum pooled connections.
    pub max_connections: Option<u32>,
}

impl DocumentStoreSettings {
    /// Configured page size; zero falls back to the default.
    pub fn page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Manager options derived from these settings.
    pub fn manager_options(&self) -> DocumentManagerOptions {
        DocumentManagerOptions {
            database_id: self.database_id.clone(),
            container_id: self.container_id.clone(),
            registration_container_id: self.registration_container_id.clone(),
            page_size: self.page_size(),
        }
    }

    /// Pool configuration, when a database URL is configured.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        let url = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())?;
        let config = PoolConfig::new(url);
        Some(match self.max_connections {
            Some(max_size) => config.with_max_size(max_size),
            None => config,
        })
    }
}

/// Source of the bulk seed dataset.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CONVENTION_SEED")]
pub struct SeedSettings {
    /// JSON file holding the seed conventions; defaults to the bundled fixture.
    #[ortho_config(default = default_seed_path())]
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing.

    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    use super::*;

    fn store_settings() -> DocumentStoreSettings {
        DocumentStoreSettings::load_from_iter([OsString::from("convention-backend")])
            .expect("settings should load")
    }

    fn seed_settings() -> SeedSettings {
        SeedSettings::load_from_iter([OsString::from("convention-backend")])
            .expect("settings should load")
    }

    #[rstest]
    fn store_defaults_apply_when_unset() {
        let _guard = lock_env([
            ("DOCUMENT_STORE_DATABASE_URL", None::<String>),
            ("DOCUMENT_STORE_DATABASE_ID", None::<String>),
            ("DOCUMENT_STORE_CONTAINER_ID", None::<String>),
            ("DOCUMENT_STORE_REGISTRATION_CONTAINER_ID", None::<String>),
            ("DOCUMENT_STORE_PAGE_SIZE", None::<String>),
            ("DOCUMENT_STORE_MAX_CONNECTIONS", None::<String>),
        ]);

        let settings = store_settings();

        assert_eq!(settings.database_id, DEFAULT_DATABASE_ID);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.manager_options(), DocumentManagerOptions::default());
        assert!(settings.pool_config().is_none());
    }

    #[rstest]
    fn store_environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "DOCUMENT_STORE_DATABASE_URL",
                Some("postgres://localhost/conventions".to_owned()),
            ),
            ("DOCUMENT_STORE_DATABASE_ID", Some("staging".to_owned())),
            ("DOCUMENT_STORE_CONTAINER_ID", Some("items".to_owned())),
            (
                "DOCUMENT_STORE_REGISTRATION_CONTAINER_ID",
                Some("ledgers".to_owned()),
            ),
            ("DOCUMENT_STORE_PAGE_SIZE", Some("25".to_owned())),
            ("DOCUMENT_STORE_MAX_CONNECTIONS", None::<String>),
        ]);

        let settings = store_settings();
        let options = settings.manager_options();

        assert_eq!(options.database_id, "staging");
        assert_eq!(options.container_id, "items");
        assert_eq!(options.registration_container_id, "ledgers");
        assert_eq!(options.page_size, 25);
        assert_eq!(
            settings.pool_config().map(|config| config.database_url().to_owned()),
            Some("postgres://localhost/conventions".to_owned())
        );
    }

    #[rstest]
    #[case(Some("0".to_owned()), DEFAULT_PAGE_SIZE)]
    #[case(Some("7".to_owned()), 7)]
    #[case(None, DEFAULT_PAGE_SIZE)]
    fn page_size_ignores_zero(#[case] raw: Option<String>, #[case] expected: u32) {
        let _guard = lock_env([
            ("DOCUMENT_STORE_PAGE_SIZE", raw),
            ("DOCUMENT_STORE_DATABASE_URL", None::<String>),
        ]);

        assert_eq!(store_settings().page_size(), expected);
    }

    #[rstest]
    fn seed_path_defaults_to_bundled_fixture() {
        let _guard = lock_env([("CONVENTION_SEED_PATH", None::<String>)]);

        assert_eq!(seed_settings().path, default_seed_path());
    }

    #[rstest]
    fn seed_path_override_is_respected() {
        let _guard = lock_env([(
            "CONVENTION_SEED_PATH",
            Some("/tmp/conventions.json".to_owned()),
        )]);

        assert_eq!(seed_settings().path, PathBuf::from("/tmp/conventions.json"));
    }
}
