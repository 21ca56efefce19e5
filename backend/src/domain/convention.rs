//! Convention and event data model.
//!
//! A [`Convention`] is a multi-day gathering that owns its [`Event`]s. Both
//! carry a derived `total_number_of_participants` aggregate maintained by the
//! convention managers from the per-user registration ledgers; callers never
//! author it directly.
//!
//! ## Serialisation
//! Fields are camelCase on the wire. `id`, `events`, the aggregate, and the
//! deletion flag default when omitted so clients may post bare drafts.
//! `userInfo` is a transient, user-scoped projection and is skipped when
//! absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of activity an [`Event`] represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// A generic scheduled activity.
    #[default]
    Event,
    /// A presentation or lecture.
    Talk,
    /// A location-bound activity.
    Venue,
}

/// Registration details of a single user, attached to user-scoped views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// User the projection was produced for.
    pub user_id: String,
    /// Participants registered by that user.
    pub number_of_participants: u32,
}

impl UserInfo {
    /// Build a projection for `user_id`.
    pub fn new(user_id: impl Into<String>, number_of_participants: u32) -> Self {
        Self {
            user_id: user_id.into(),
            number_of_participants,
        }
    }
}

/// Sub-event of a convention.
///
/// ## Invariants
/// - Always owned by exactly one [`Convention`].
/// - `total_number_of_participants` equals the sum of all users' event-level
///   registrations for this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    pub title: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub total_number_of_participants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

impl Event {
    /// Create an event without an id; one is assigned on creation.
    pub fn new(
        event_type: EventType,
        title: impl Into<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            event_type,
            title: title.into(),
            from,
            to,
            total_number_of_participants: 0,
            user_info: None,
        }
    }
}

/// Multi-day convention composed of events.
///
/// ## Invariants
/// - `total_number_of_participants` equals the sum of all users'
///   convention-level registrations.
/// - `user_info` is never persisted; it only appears on user-scoped copies.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use convention_backend::domain::{Convention, Event, EventType};
///
/// let from = Utc.with_ymd_and_hms(2022, 5, 1, 16, 0, 0).unwrap();
/// let to = Utc.with_ymd_and_hms(2022, 5, 2, 23, 0, 0).unwrap();
/// let mut convention = Convention::new("Summer gathering", from, to)
///     .with_event(Event::new(EventType::Venue, "Wine tasting", from, to));
/// convention.assign_missing_ids();
///
/// assert!(!convention.id.is_empty());
/// assert!(convention.events.iter().all(|event| !event.id.is_empty()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Convention {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub total_number_of_participants: u32,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Convention {
    /// Create a convention draft without an id or events.
    pub fn new(title: impl Into<String>, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            from,
            to,
            total_number_of_participants: 0,
            events: Vec::new(),
            user_info: None,
            is_deleted: false,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Append an event.
    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Fill empty convention and event ids with fresh UUIDs.
    pub fn assign_missing_ids(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        for event in &mut self.events {
            if event.id.is_empty() {
                event.id = new_id();
            }
        }
    }

    /// Look up an event by id.
    pub fn event(&self, event_id: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.id == event_id)
    }

    /// Look up an event by id for mutation.
    pub fn event_mut(&mut self, event_id: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| event.id == event_id)
    }

    /// Strip every user projection, yielding the persisted form.
    pub fn without_user_info(mut self) -> Self {
        self.user_info = None;
        for event in &mut self.events {
            event.user_info = None;
        }
        self
    }

    /// Prepare a freshly created record: ids assigned, aggregates zeroed,
    /// projections removed, not deleted.
    pub(crate) fn into_new_record(mut self) -> Self {
        self.assign_missing_ids();
        self.total_number_of_participants = 0;
        self.is_deleted = false;
        for event in &mut self.events {
            event.total_number_of_participants = 0;
        }
        self.without_user_info()
    }

    /// Merge a full replacement onto the stored record.
    ///
    /// Client-authored fields come from `self`; derived aggregates and the
    /// deletion flag come from `stored`. Events that already existed keep
    /// their totals, new events start at zero.
    pub(crate) fn into_replacement_of(mut self, stored: &Self) -> Self {
        self.assign_missing_ids();
        self.total_number_of_participants = stored.total_number_of_participants;
        self.is_deleted = stored.is_deleted;
        for event in &mut self.events {
            event.total_number_of_participants = stored
                .event(&event.id)
                .map_or(0, |existing| existing.total_number_of_participants);
        }
        self.without_user_info()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
