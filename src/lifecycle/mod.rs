//! Event lifecycle rules
//!
//! Pure decision logic: effective status, field-level edit authorization and
//! the registration/order guards. Nothing in here touches storage.

pub mod edit_policy;
pub mod guard;
pub mod status;

pub use edit_policy::{authorize_edit, policy_for, EventField, PhasePolicy};
pub use status::effective_status;
