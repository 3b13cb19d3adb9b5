//! Data models module
//!
//! This module contains all data structures used throughout the engine

pub mod event;
pub mod registration;
pub mod user;

// Re-export commonly used models
pub use event::{
    CreateEventRequest, Eligibility, Event, EventKind, EventStatus, EventSummary, FormField,
    FormFieldType, NewEvent, NewVariant, UpdateEventRequest, Variant,
};
pub use registration::{
    AttendanceMark, AttendanceOverride, AttendanceSummary, FormAnswers, InsertGuard,
    NewRegistration, OrderDecision, OrderLine, PaymentStatus, PlaceOrderRequest, RegisterRequest,
    Registration,
};
pub use user::{Actor, CreateUserRequest, ParticipantCategory, Role, User};
