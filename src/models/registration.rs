//! Registration model
//!
//! A registration doubles as a merchandise order: the normal path carries form
//! answers, the merchandise path carries a variant, a quantity and a payment
//! status.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotApplicable,
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::NotApplicable => f.write_str("not_applicable"),
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Approved => f.write_str("approved"),
            PaymentStatus::Rejected => f.write_str("rejected"),
        }
    }
}

pub type FormAnswers = BTreeMap<String, serde_json::Value>;

/// Audit trail of a manual attendance correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceOverride {
    pub reason: String,
    pub actor_id: i64,
    pub overridden_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub participant_id: i64,
    pub ticket_id: Option<String>,
    pub form_answers: FormAnswers,
    pub variant_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub payment_status: PaymentStatus,
    pub payment_proof_url: Option<String>,
    pub attended: bool,
    pub attended_at: Option<DateTime<Utc>>,
    pub attendance_override: Option<AttendanceOverride>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// A registration is confirmed once it holds a ticket
    pub fn is_confirmed(&self) -> bool {
        self.ticket_id.is_some()
    }

    pub fn is_order(&self) -> bool {
        self.variant_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub event_id: i64,
    #[serde(default)]
    pub form_answers: FormAnswers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub event_id: i64,
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// What the ledger should persist for a new registration or order
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: i64,
    pub participant_id: i64,
    pub ticket_id: Option<String>,
    pub form_answers: FormAnswers,
    pub order: Option<OrderLine>,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Storage-level constraint checked atomically with the ledger insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertGuard {
    /// Normal registration: count must stay below the event's current limit,
    /// and the event form gets locked
    Capacity,
    /// Order confirmed immediately: stock is decremented in the same unit
    DecrementStock,
    /// Approval-gated order: no stock is touched yet
    Deferred,
}

/// Result of the approval workflow's terminal decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderDecision {
    Approve { ticket_id: String },
    Reject,
}

/// Outcome of the conditional first-scan update
#[derive(Debug, Clone)]
pub enum AttendanceMark {
    Marked(Registration),
    AlreadyAttended(Registration),
}

/// Per-event attendance dashboard numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub event_id: i64,
    pub confirmed: i64,
    pub attended: i64,
    pub pending_orders: i64,
    pub manual_overrides: i64,
}

impl AttendanceSummary {
    pub fn from_registrations(event_id: i64, registrations: &[Registration]) -> Self {
        registrations.iter().fold(
            AttendanceSummary { event_id, ..Default::default() },
            |mut summary, r| {
                if r.is_confirmed() {
                    summary.confirmed += 1;
                }
                if r.attended {
                    summary.attended += 1;
                }
                if r.payment_status == PaymentStatus::Pending {
                    summary.pending_orders += 1;
                }
                if r.attendance_override.is_some() {
                    summary.manual_overrides += 1;
                }
                summary
            },
        )
    }
}
