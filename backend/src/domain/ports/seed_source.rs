//! Port supplying the sample conventions used by `populate_data`.

use async_trait::async_trait;

use crate::domain::Convention;

use super::define_port_error;

define_port_error! {
    /// Errors raised while loading seed conventions.
    pub enum SeedSourceError {
        /// The seed payload could not be read.
        Read { message: String } => "failed to read seed conventions: {message}",
        /// The seed payload was not a valid convention list.
        Parse { message: String } => "failed to parse seed conventions: {message}",
    }
}

/// Source of sample conventions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConventionSeedSource: Send + Sync {
    /// Load every seed convention in file order.
    async fn load(&self) -> Result<Vec<Convention>, SeedSourceError>;
}

/// Seed source backed by a fixed list; empty by default.
#[derive(Debug, Clone, Default)]
pub struct StaticSeedSource {
    conventions: Vec<Convention>,
}

impl StaticSeedSource {
    /// Serve the given conventions.
    pub fn new(conventions: Vec<Convention>) -> Self {
        Self { conventions }
    }
}

#[async_trait]
impl ConventionSeedSource for StaticSeedSource {
    async fn load(&self) -> Result<Vec<Convention>, SeedSourceError> {
        Ok(self.conventions.clone())
    }
}
