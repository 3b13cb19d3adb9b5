//! Event model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::lifecycle::status::effective_status;

/// Lifecycle status of an event
///
/// Stored as the manual override; the effective value is derived through
/// [`Event::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Ongoing,
    Completed,
    Closed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Completed => "completed",
            EventStatus::Closed => "closed",
        }
    }

    /// Whether the event currently accepts registrations and orders
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, EventStatus::Published | EventStatus::Ongoing)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Normal,
    Merchandise,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Normal => f.write_str("normal"),
            EventKind::Merchandise => f.write_str("merchandise"),
        }
    }
}

/// Which participant category may register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "eligibility", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    IiitOnly,
    NonIiitOnly,
    All,
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eligibility::IiitOnly => f.write_str("IIIT-only"),
            Eligibility::NonIiitOnly => f.write_str("non-IIIT-only"),
            Eligibility::All => f.write_str("open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    Text,
    Number,
    Email,
    Dropdown,
    Checkbox,
    File,
}

/// Custom registration form field of a normal event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    pub label: String,
    pub field_type: FormFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// One purchasable configuration of a merchandise event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub size: String,
    pub color: String,
    pub stock: i32,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub organizer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: EventKind,
    pub eligibility: Eligibility,
    pub tags: Vec<String>,
    pub registration_deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_limit: Option<i32>,
    pub status_override: EventStatus,
    pub registration_fee: i64,
    pub form_fields: Vec<FormField>,
    pub form_locked: bool,
    pub variants: Vec<Variant>,
    pub purchase_limit: Option<i32>,
    pub requires_payment_approval: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Effective status at `now`. Never cache the result.
    pub fn effective_status(&self, now: DateTime<Utc>) -> EventStatus {
        effective_status(self.status_override, self.start_time, self.end_time, now)
    }

    pub fn variant(&self, variant_id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind,
            eligibility: self.eligibility,
            registration_deadline: self.registration_deadline,
            start_time: self.start_time,
            end_time: self.end_time,
            registration_fee: self.registration_fee,
            tags: self.tags.clone(),
        }
    }
}

/// Payload handed to the publish webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: EventKind,
    pub eligibility: Eligibility,
    pub registration_deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_fee: i64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariant {
    pub size: String,
    pub color: String,
    pub stock: i32,
    pub price: i64,
}

impl NewVariant {
    pub fn into_variant(self) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            size: self.size,
            color: self.color,
            stock: self.stock,
            price: self.price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: Option<String>,
    pub kind: EventKind,
    pub eligibility: Eligibility,
    #[serde(default)]
    pub tags: Vec<String>,
    pub registration_deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_limit: Option<i32>,
    #[serde(default)]
    pub registration_fee: i64,
    #[serde(default)]
    pub form_fields: Vec<FormField>,
    #[serde(default)]
    pub variants: Vec<NewVariant>,
    pub purchase_limit: Option<i32>,
    #[serde(default)]
    pub requires_payment_approval: bool,
}

/// Event row ready for insertion, always created as a draft
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub organizer_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: EventKind,
    pub eligibility: Eligibility,
    pub tags: Vec<String>,
    pub registration_deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub registration_limit: Option<i32>,
    pub registration_fee: i64,
    pub form_fields: Vec<FormField>,
    pub variants: Vec<Variant>,
    pub purchase_limit: Option<i32>,
    pub requires_payment_approval: bool,
}

impl NewEvent {
    pub fn from_request(organizer_id: i64, request: CreateEventRequest) -> Self {
        Self {
            organizer_id,
            name: request.name,
            description: request.description,
            kind: request.kind,
            eligibility: request.eligibility,
            tags: request.tags,
            registration_deadline: request.registration_deadline,
            start_time: request.start_time,
            end_time: request.end_time,
            registration_limit: request.registration_limit,
            registration_fee: request.registration_fee,
            form_fields: request.form_fields,
            variants: request.variants.into_iter().map(NewVariant::into_variant).collect(),
            purchase_limit: request.purchase_limit,
            requires_payment_approval: request.requires_payment_approval,
        }
    }
}

/// Partial edit of an event; `None` means "leave untouched"
///
/// `registration_limit` and `description` distinguish "unset" (`Some(None)`)
/// from "not part of the request" (`None`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub kind: Option<EventKind>,
    pub eligibility: Option<Eligibility>,
    pub tags: Option<Vec<String>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub registration_limit: Option<Option<i32>>,
    pub status_override: Option<EventStatus>,
    pub registration_fee: Option<i64>,
    pub form_fields: Option<Vec<FormField>>,
    pub variants: Option<Vec<NewVariant>>,
    #[serde(default, deserialize_with = "present")]
    pub purchase_limit: Option<Option<i32>>,
    pub requires_payment_approval: Option<bool>,
}

/// Maps an explicit `null` to `Some(None)` so it survives as "unset"
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
