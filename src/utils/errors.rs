//! Error handling for Felicity
//!
//! This module defines the main error type used throughout the engine.
//! Every guard failure maps onto a specific variant so callers can react
//! deterministically, and [`FelicityError::kind`] folds the variants into the
//! coarse taxonomy exposed at the boundary.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::event::{EventKind, EventStatus, Eligibility};

/// Main error type for Felicity
#[derive(Error, Debug)]
pub enum FelicityError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Registration not found: {registration_id}")]
    RegistrationNotFound { registration_id: i64 },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },

    #[error("Variant not found: {variant_id}")]
    VariantNotFound { variant_id: Uuid },

    #[error("Ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    #[error("Ticket {ticket_id} does not belong to event {event_id}")]
    TicketEventMismatch { ticket_id: String, event_id: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Operation '{operation}' is not allowed while the event is {status}")]
    InvalidPhase { status: EventStatus, operation: &'static str },

    #[error("Fields not editable while the event is {status}: {}", .fields.join(", "))]
    FieldsNotEditable { status: EventStatus, fields: Vec<String> },

    #[error("Change to {field} must widen the current value")]
    NonWideningChange { field: &'static str },

    #[error("Registration deadline passed at {deadline}")]
    DeadlinePassed { deadline: DateTime<Utc> },

    #[error("Participant is not eligible for a {required} event")]
    IneligibleParticipant { required: Eligibility },

    #[error("Event is full: registration limit of {limit} reached")]
    CapacityExceeded { limit: i32 },

    #[error("Insufficient stock for variant {variant_id}: requested {requested}")]
    InsufficientStock { variant_id: Uuid, requested: i32 },

    #[error("Purchase limit of {limit} exceeded: requested {requested}, already ordered {already_ordered}")]
    PurchaseLimitExceeded { limit: i32, requested: i32, already_ordered: i64 },

    #[error("Participant {participant_id} is already registered for event {event_id}")]
    DuplicateRegistration { event_id: i64, participant_id: i64 },

    #[error("Operation requires a {expected} event")]
    WrongEventKind { expected: EventKind },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Event {event_id} was modified concurrently; reload and retry")]
    StaleEvent { event_id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse error classification exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    WrongEvent,
    InvalidPhase,
    DeadlinePassed,
    IneligibleParticipant,
    CapacityExceeded,
    InsufficientStock,
    DuplicateRegistration,
    InvalidTransition,
    ValidationError,
    Conflict,
    Internal,
}

/// Result type alias for Felicity operations
pub type Result<T> = std::result::Result<T, FelicityError>;

impl FelicityError {
    /// Classify the error into the boundary taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            FelicityError::EventNotFound { .. }
            | FelicityError::RegistrationNotFound { .. }
            | FelicityError::UserNotFound { .. }
            | FelicityError::VariantNotFound { .. }
            | FelicityError::TicketNotFound { .. } => ErrorKind::NotFound,
            FelicityError::Forbidden(_) => ErrorKind::Forbidden,
            FelicityError::TicketEventMismatch { .. } => ErrorKind::WrongEvent,
            FelicityError::InvalidPhase { .. }
            | FelicityError::FieldsNotEditable { .. }
            | FelicityError::NonWideningChange { .. } => ErrorKind::InvalidPhase,
            FelicityError::DeadlinePassed { .. } => ErrorKind::DeadlinePassed,
            FelicityError::IneligibleParticipant { .. } => ErrorKind::IneligibleParticipant,
            FelicityError::CapacityExceeded { .. } | FelicityError::PurchaseLimitExceeded { .. } => {
                ErrorKind::CapacityExceeded
            }
            FelicityError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            FelicityError::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
            FelicityError::InvalidStateTransition { .. } => ErrorKind::InvalidTransition,
            FelicityError::WrongEventKind { .. } | FelicityError::InvalidInput(_) => {
                ErrorKind::ValidationError
            }
            FelicityError::StaleEvent { .. } => ErrorKind::Conflict,
            FelicityError::Database(_)
            | FelicityError::Migration(_)
            | FelicityError::Config(_)
            | FelicityError::Http(_)
            | FelicityError::Serialization(_)
            | FelicityError::Io(_)
            | FelicityError::UrlParse(_) => ErrorKind::Internal,
        }
    }

    /// Check if the error is recoverable by retrying the same request
    pub fn is_recoverable(&self) -> bool {
        match self {
            FelicityError::Http(_) | FelicityError::Io(_) | FelicityError::StaleEvent { .. } => true,
            FelicityError::Database(e) => matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self.kind() {
            ErrorKind::Internal => match self {
                FelicityError::Http(_) => ErrorSeverity::Error,
                _ => ErrorSeverity::Critical,
            },
            ErrorKind::Forbidden | ErrorKind::WrongEvent | ErrorKind::Conflict => ErrorSeverity::Warning,
            _ => ErrorSeverity::Info,
        }
    }

    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        FelicityError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
