//! Seed source reading a JSON array of conventions from disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use tracing::info;

use crate::domain::Convention;
use crate::domain::ports::{ConventionSeedSource, SeedSourceError};

/// Loads seed conventions from a JSON file through a `cap-std` directory
/// handle scoped to the file's parent.
#[derive(Debug, Clone)]
pub struct JsonFileSeedSource {
    path: PathBuf,
}

impl JsonFileSeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_payload(&self) -> Result<String, SeedSourceError> {
        let read_error = |message: String| {
            SeedSourceError::read(format!("{}: {message}", self.path.display()))
        };
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| read_error("seed path must name a file".to_owned()))?;

        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|err| read_error(err.to_string()))?;
        dir.read_to_string(Path::new(file_name))
            .map_err(|err| read_error(err.to_string()))
    }
}

#[async_trait]
impl ConventionSeedSource for JsonFileSeedSource {
    async fn load(&self) -> Result<Vec<Convention>, SeedSourceError> {
        let payload = self.read_payload()?;
        let conventions: Vec<Convention> = serde_json::from_str(&payload).map_err(|err| {
            SeedSourceError::parse(format!("{}: {err}", self.path.display()))
        })?;
        info!(
            path = %self.path.display(),
            count = conventions.len(),
            "loaded seed conventions"
        );
        Ok(conventions)
    }
}
