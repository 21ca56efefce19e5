//! Process-local convention manager.
//!
//! All state sits behind a single mutex, so every operation is linearizable.
//! Listings copy their result set while the lock is held and stream the
//! copies afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, info};

use super::ports::{ConventionManager, ConventionSeedSource, ConventionStream, StaticSeedSource};
use super::registration::registration_target;
use super::user_view::scoped_to;
use super::{Convention, ConventionError, RegistrationLedger, ValidationError};

#[derive(Debug, Default)]
struct State {
    /// Conventions in insertion order; deleted ones stay in place.
    conventions: Vec<Convention>,
    index: HashMap<String, usize>,
    ledgers: HashMap<String, RegistrationLedger>,
}

impl State {
    fn get(&self, id: &str) -> Option<&Convention> {
        self.index.get(id).and_then(|&slot| self.conventions.get(slot))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Convention> {
        let slot = *self.index.get(id)?;
        self.conventions.get_mut(slot)
    }

    fn insert(&mut self, convention: Convention) {
        self.index
            .insert(convention.id.clone(), self.conventions.len());
        self.conventions.push(convention);
    }

    fn live(&self) -> impl Iterator<Item = &Convention> {
        self.conventions
            .iter()
            .filter(|convention| !convention.is_deleted)
    }

    fn ledger_mut(&mut self, user_id: &str) -> &mut RegistrationLedger {
        self.ledgers
            .entry(user_id.to_owned())
            .or_insert_with(|| RegistrationLedger::new(user_id))
    }
}

/// Convention manager holding everything in memory.
///
/// # Examples
/// ```no_run
/// use chrono::{TimeZone, Utc};
/// use convention_backend::domain::ports::ConventionManager;
/// use convention_backend::domain::{Convention, ConventionError, InMemoryConventionManager};
///
/// # async fn demo() -> Result<(), ConventionError> {
/// let manager = InMemoryConventionManager::new();
/// let at = Utc.with_ymd_and_hms(2022, 5, 1, 16, 0, 0).single().expect("valid");
/// let created = manager
///     .create_convention(Convention::new("Sample", at, at))
///     .await?;
/// manager.register_convention(&created.id, "u1", 3).await?;
///
/// let stored = manager.get_convention(&created.id).await?;
/// assert_eq!(stored.map(|c| c.total_number_of_participants), Some(3));
/// # Ok(())
/// # }
/// ```
pub struct InMemoryConventionManager {
    state: Mutex<State>,
    seed: Arc<dyn ConventionSeedSource>,
}

impl InMemoryConventionManager {
    /// Create an empty manager whose `populate_data` seeds nothing.
    pub fn new() -> Self {
        Self::with_seed_source(Arc::new(StaticSeedSource::default()))
    }

    /// Create an empty manager seeded from `seed` on `populate_data`.
    pub fn with_seed_source(seed: Arc<dyn ConventionSeedSource>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            seed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self, user_id: Option<&str>, registered_only: bool, max: usize) -> Vec<Convention> {
        let state = self.lock();
        let ledger = user_id.and_then(|id| state.ledgers.get(id));
        let limit = if max == 0 { usize::MAX } else { max };

        let selected: Vec<&Convention> = if registered_only {
            ledger
                .map(|ledger| {
                    ledger
                        .convention_ids()
                        .iter()
                        .filter_map(|id| state.get(id))
                        .filter(|convention| !convention.is_deleted)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            state.live().collect()
        };

        selected
            .into_iter()
            .take(limit)
            .map(|convention| match user_id {
                Some(_) => scoped_to(convention.clone(), ledger),
                None => convention.clone(),
            })
            .collect()
    }
}

impl Default for InMemoryConventionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_of(conventions: Vec<Convention>) -> ConventionStream<'static> {
    stream::iter(conventions.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl ConventionManager for InMemoryConventionManager {
    async fn create_convention(
        &self,
        convention: Convention,
    ) -> Result<Convention, ConventionError> {
        let record = convention.into_new_record();
        let mut state = self.lock();
        if state.index.contains_key(&record.id) {
            return Err(ValidationError::already_exists(format!(
                "convention {} already exists",
                record.id
            ))
            .into());
        }
        state.insert(record.clone());
        info!(convention_id = %record.id, "convention created");
        Ok(record)
    }

    async fn get_convention(&self, id: &str) -> Result<Option<Convention>, ConventionError> {
        Ok(self.lock().get(id).cloned())
    }

    async fn update_convention(
        &self,
        convention: Convention,
    ) -> Result<Convention, ConventionError> {
        let mut state = self.lock();
        let Some(stored) = state.get_mut(&convention.id) else {
            return Err(ValidationError::not_found(format!(
                "convention {} does not exist",
                convention.id
            ))
            .into());
        };
        let record = convention.into_replacement_of(stored);
        *stored = record.clone();
        let pruned = state
            .ledgers
            .values_mut()
            .map(|ledger| ledger.prune_dropped_events(&record))
            .filter(|pruned| *pruned)
            .count();
        if pruned > 0 {
            debug!(convention_id = %record.id, ledgers = pruned, "dropped event registrations pruned");
        }
        info!(convention_id = %record.id, "convention updated");
        Ok(record)
    }

    async fn delete_convention(&self, id: &str) -> Result<(), ConventionError> {
        if let Some(stored) = self.lock().get_mut(id)
            && !stored.is_deleted
        {
            stored.is_deleted = true;
            info!(convention_id = %id, "convention deleted");
        }
        Ok(())
    }

    fn conventions(&self, max: usize) -> ConventionStream<'_> {
        stream_of(self.snapshot(None, false, max))
    }

    fn conventions_for_user<'a>(&'a self, user_id: &'a str, max: usize) -> ConventionStream<'a> {
        stream_of(self.snapshot(Some(user_id), false, max))
    }

    fn registered_conventions<'a>(&'a self, user_id: &'a str) -> ConventionStream<'a> {
        stream_of(self.snapshot(Some(user_id), true, 0))
    }

    async fn register_convention(
        &self,
        convention_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError> {
        let mut state = self.lock();
        let mut convention =
            registration_target(state.get(convention_id).cloned(), convention_id, user_id)?;
        let delta = state
            .ledger_mut(user_id)
            .record_convention(&mut convention, number_of_participants);
        debug!(
            convention_id,
            user_id,
            prior = delta.prior,
            next = delta.next,
            "convention registration recorded"
        );
        if let Some(stored) = state.get_mut(convention_id) {
            *stored = convention;
        }
        Ok(())
    }

    async fn register_event(
        &self,
        convention_id: &str,
        event_id: &str,
        user_id: &str,
        number_of_participants: u32,
    ) -> Result<(), ConventionError> {
        let mut state = self.lock();
        let mut convention =
            registration_target(state.get(convention_id).cloned(), convention_id, user_id)?;
        let mut ledger = state
            .ledgers
            .get(user_id)
            .cloned()
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
        state.ledgers.insert(user_id.to_owned(), ledger);
        if let Some(stored) = state.get_mut(convention_id) {
            *stored = convention;
        }
        Ok(())
    }

    async fn populate_data(&self) -> Result<(), ConventionError> {
        if !self.lock().conventions.is_empty() {
            debug!("conventions already present; skipping seed");
            return Ok(());
        }
        let seeds = self.seed.load().await?;

        let mut state = self.lock();
        if !state.conventions.is_empty() {
            return Ok(());
        }
        let count = seeds.len();
        for seed in seeds {
            let record = seed.into_new_record();
            if !state.index.contains_key(&record.id) {
                state.insert(record);
            }
        }
        info!(count, "seeded conventions");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConventionError> {
        *self.lock() = State::default();
        info!("cleared conventions and registrations");
        Ok(())
    }
}
