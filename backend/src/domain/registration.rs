//! Per-user registration ledger.
//!
//! Each user owns one [`RegistrationLedger`] holding at most one
//! [`RegistrationItem`] per `(target id, target type)` pair. Applying a new
//! participant count to a ledger yields a [`RegistrationDelta`] that the
//! managers replay onto the matching aggregate counter, so the ledger and the
//! aggregates are always updated by the same rule.

use serde::{Deserialize, Serialize};

use super::{Convention, ValidationError};

/// Entity a registration item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    /// A whole convention.
    Convention,
    /// One event of a convention.
    Event,
}

/// One user's registration against a convention or event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationItem {
    pub target_id: String,
    pub target_type: TargetType,
    /// Owning convention; set only for event items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub number_of_participants: u32,
}

impl RegistrationItem {
    fn matches(&self, target_type: TargetType, target_id: &str) -> bool {
        self.target_type == target_type && self.target_id == target_id
    }

    fn is_event_of(&self, convention_id: &str) -> bool {
        self.target_type == TargetType::Event && self.parent_id.as_deref() == Some(convention_id)
    }
}

/// Change produced by applying a participant count to a ledger.
///
/// `prior` is the count held before the call (zero when no item existed) and
/// `next` the count held afterwards (zero when the item was removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationDelta {
    pub prior: u32,
    pub next: u32,
}

impl RegistrationDelta {
    /// Replay the delta onto an aggregate counter.
    ///
    /// Saturates at the `u32` bounds.
    ///
    /// # Examples
    /// ```
    /// use convention_backend::domain::RegistrationDelta;
    ///
    /// let delta = RegistrationDelta { prior: 3, next: 5 };
    /// assert_eq!(delta.apply_to(8), 10);
    /// ```
    pub const fn apply_to(self, aggregate: u32) -> u32 {
        aggregate.saturating_sub(self.prior).saturating_add(self.next)
    }

    /// True when the call left the ledger untouched.
    pub const fn is_noop(self) -> bool {
        self.prior == self.next
    }
}

/// Resolve the convention a registration call targets.
///
/// # Errors
/// `NotFound` when the convention is absent or deleted, then
/// `InvalidArgument` when `user_id` is empty.
pub(crate) fn registration_target(
    convention: Option<Convention>,
    convention_id: &str,
    user_id: &str,
) -> Result<Convention, ValidationError> {
    let convention = convention
        .filter(|convention| !convention.is_deleted)
        .ok_or_else(|| {
            ValidationError::not_found(format!("convention {convention_id} does not exist"))
        })?;
    if user_id.is_empty() {
        return Err(ValidationError::invalid_argument("user id must not be empty"));
    }
    Ok(convention)
}

/// Registration ledger for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLedger {
    #[serde(rename = "id")]
    pub user_id: String,
    #[serde(default)]
    pub items: Vec<RegistrationItem>,
}

impl RegistrationLedger {
    /// Start an empty ledger for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            items: Vec::new(),
        }
    }

    /// Participants held for the given target, if registered.
    pub fn participants(&self, target_type: TargetType, target_id: &str) -> Option<u32> {
        self.items
            .iter()
            .find(|item| item.matches(target_type, target_id))
            .map(|item| item.number_of_participants)
    }

    /// Ids of all conventions this user is registered for, in ledger order.
    pub fn convention_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.target_type == TargetType::Convention)
            .map(|item| item.target_id.clone())
            .collect()
    }

    /// True when no registrations remain.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a convention-level count.
    pub fn register_convention(
        &mut self,
        convention_id: &str,
        number_of_participants: u32,
    ) -> RegistrationDelta {
        self.apply(
            TargetType::Convention,
            convention_id,
            None,
            number_of_participants,
        )
    }

    /// Apply an event-level count.
    pub fn register_event(
        &mut self,
        convention_id: &str,
        event_id: &str,
        number_of_participants: u32,
    ) -> RegistrationDelta {
        self.apply(
            TargetType::Event,
            event_id,
            Some(convention_id),
            number_of_participants,
        )
    }

    /// Bring event items of `convention_id` back under `limit`.
    ///
    /// Items above the limit are lowered to it, or removed when the limit is
    /// zero. Returns the per-event deltas so aggregates can follow.
    pub fn clamp_events(
        &mut self,
        convention_id: &str,
        limit: u32,
    ) -> Vec<(String, RegistrationDelta)> {
        let over_limit: Vec<String> = self
            .items
            .iter()
            .filter(|item| item.is_event_of(convention_id) && item.number_of_participants > limit)
            .map(|item| item.target_id.clone())
            .collect();

        over_limit
            .into_iter()
            .map(|event_id| {
                let delta = self.apply(TargetType::Event, &event_id, Some(convention_id), limit);
                (event_id, delta)
            })
            .collect()
    }

    /// Drop event items of `convention` whose event no longer exists.
    ///
    /// Returns whether any item was removed.
    pub fn prune_dropped_events(&mut self, convention: &Convention) -> bool {
        let before = self.items.len();
        self.items.retain(|item| {
            !item.is_event_of(&convention.id) || convention.event(&item.target_id).is_some()
        });
        self.items.len() != before
    }

    /// Record a convention-level count and carry the deltas onto `convention`.
    ///
    /// Event items above the new count are clamped, and their event totals
    /// follow.
    pub(crate) fn record_convention(
        &mut self,
        convention: &mut Convention,
        number_of_participants: u32,
    ) -> RegistrationDelta {
        let delta = self.register_convention(&convention.id, number_of_participants);
        convention.total_number_of_participants =
            delta.apply_to(convention.total_number_of_participants);

        for (event_id, clamped) in self.clamp_events(&convention.id, number_of_participants) {
            if let Some(event) = convention.event_mut(&event_id) {
                event.total_number_of_participants =
                    clamped.apply_to(event.total_number_of_participants);
            }
        }
        delta
    }

    /// Record an event-level count and carry the delta onto the event.
    ///
    /// # Errors
    /// `NotFound` when the event is not part of `convention`;
    /// `FailedPrecondition` without a convention registration or when the
    /// count exceeds it.
    pub(crate) fn record_event(
        &mut self,
        convention: &mut Convention,
        event_id: &str,
        number_of_participants: u32,
    ) -> Result<RegistrationDelta, ValidationError> {
        if convention.event(event_id).is_none() {
            return Err(ValidationError::not_found(format!(
                "event {event_id} does not exist in convention {}",
                convention.id
            )));
        }
        let Some(limit) = self.participants(TargetType::Convention, &convention.id) else {
            return Err(ValidationError::failed_precondition(format!(
                "user {} is not registered for convention {}",
                self.user_id, convention.id
            )));
        };
        if number_of_participants > limit {
            return Err(ValidationError::failed_precondition(format!(
                "{number_of_participants} participants exceed the {limit} registered for convention {}",
                convention.id
            )));
        }

        let delta = self.register_event(&convention.id, event_id, number_of_participants);
        if let Some(event) = convention.event_mut(event_id) {
            event.total_number_of_participants =
                delta.apply_to(event.total_number_of_participants);
        }
        Ok(delta)
    }

    fn apply(
        &mut self,
        target_type: TargetType,
        target_id: &str,
        parent_id: Option<&str>,
        next: u32,
    ) -> RegistrationDelta {
        let position = self
            .items
            .iter()
            .position(|item| item.matches(target_type, target_id));

        match (position, next) {
            (None, 0) => RegistrationDelta { prior: 0, next: 0 },
            (None, _) => {
                self.items.push(RegistrationItem {
                    target_id: target_id.to_owned(),
                    target_type,
                    parent_id: parent_id.map(str::to_owned),
                    number_of_participants: next,
                });
                RegistrationDelta { prior: 0, next }
            }
            (Some(index), 0) => {
                let removed = self.items.remove(index);
                RegistrationDelta {
                    prior: removed.number_of_participants,
                    next: 0,
                }
            }
            (Some(index), _) => {
                let mut prior = next;
                if let Some(item) = self.items.get_mut(index) {
                    prior = item.number_of_participants;
                    item.number_of_participants = next;
                }
                RegistrationDelta { prior, next }
            }
        }
    }
}
