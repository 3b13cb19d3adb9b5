//! Capacity and inventory guard
//!
//! Non-contended checks run here as pure functions before the ledger write.
//! The contended ones (duplicate pair, capacity count, stock) are repeated
//! atomically by the store, see [`crate::database::Store`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::event::{Eligibility, Event, EventKind, FormFieldType, NewEvent, Variant};
use crate::models::registration::FormAnswers;
use crate::models::user::ParticipantCategory;
use crate::utils::errors::{FelicityError, Result};
use crate::utils::helpers::is_valid_email;

pub fn check_kind(event: &Event, expected: EventKind) -> Result<()> {
    if event.kind != expected {
        return Err(FelicityError::WrongEventKind { expected });
    }
    Ok(())
}

/// Status and deadline gate shared by registrations and orders
pub fn check_registration_window(event: &Event, now: DateTime<Utc>) -> Result<()> {
    let status = event.effective_status(now);
    if !status.accepts_registrations() {
        return Err(FelicityError::InvalidPhase { status, operation: "register" });
    }
    if now > event.registration_deadline {
        return Err(FelicityError::DeadlinePassed { deadline: event.registration_deadline });
    }
    Ok(())
}

pub fn check_eligibility(eligibility: Eligibility, category: ParticipantCategory) -> Result<()> {
    let eligible = match eligibility {
        Eligibility::All => true,
        Eligibility::IiitOnly => category == ParticipantCategory::Iiit,
        Eligibility::NonIiitOnly => category == ParticipantCategory::NonIiit,
    };
    if !eligible {
        return Err(FelicityError::IneligibleParticipant { required: eligibility });
    }
    Ok(())
}

/// Answers must cover every required field and respect dropdown options
pub fn validate_form_answers(event: &Event, answers: &FormAnswers) -> Result<()> {
    for field in &event.form_fields {
        let answer = answers.get(&field.key).filter(|value| !is_blank(value));
        let Some(answer) = answer else {
            if field.required {
                return Err(FelicityError::InvalidInput(format!("'{}' is required", field.label)));
            }
            continue;
        };

        let valid = match field.field_type {
            FormFieldType::Number => answer.is_number(),
            FormFieldType::Checkbox => answer.is_boolean() || answer.is_array(),
            FormFieldType::Dropdown => answer
                .as_str()
                .map_or(false, |choice| field.options.iter().any(|option| option == choice)),
            FormFieldType::Email => answer.as_str().map_or(false, is_valid_email),
            FormFieldType::Text | FormFieldType::File => answer.is_string(),
        };
        if !valid {
            return Err(FelicityError::InvalidInput(format!("Invalid answer for '{}'", field.label)));
        }
    }
    Ok(())
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Variant lookup and per-participant purchase limit
pub fn check_order<'a>(
    event: &'a Event,
    variant_id: Uuid,
    quantity: i32,
    already_ordered: i64,
) -> Result<&'a Variant> {
    if quantity < 1 {
        return Err(FelicityError::InvalidInput("Quantity must be at least 1".to_string()));
    }
    let variant = event
        .variant(variant_id)
        .ok_or(FelicityError::VariantNotFound { variant_id })?;

    if let Some(limit) = event.purchase_limit {
        if already_ordered + i64::from(quantity) > i64::from(limit) {
            return Err(FelicityError::PurchaseLimitExceeded {
                limit,
                requested: quantity,
                already_ordered,
            });
        }
    }
    Ok(variant)
}

/// Advisory stock check; the authoritative one is the store's conditional decrement
pub fn check_stock(variant: &Variant, quantity: i32) -> Result<()> {
    if variant.stock < quantity {
        return Err(FelicityError::InsufficientStock { variant_id: variant.id, requested: quantity });
    }
    Ok(())
}

/// Structural validation of an event configuration
pub fn validate_event_config(event: &NewEvent) -> Result<()> {
    if event.name.trim().is_empty() {
        return Err(FelicityError::InvalidInput("Event name is required".to_string()));
    }
    if event.registration_deadline > event.start_time {
        return Err(FelicityError::InvalidInput(
            "Registration deadline must not be after the start time".to_string(),
        ));
    }
    if event.start_time > event.end_time {
        return Err(FelicityError::InvalidInput("Start time must not be after the end time".to_string()));
    }
    if event.registration_fee < 0 {
        return Err(FelicityError::InvalidInput("Registration fee cannot be negative".to_string()));
    }
    if matches!(event.registration_limit, Some(limit) if limit < 1) {
        return Err(FelicityError::InvalidInput("Registration limit must be at least 1".to_string()));
    }

    if event.kind == EventKind::Merchandise {
        if event.variants.is_empty() {
            return Err(FelicityError::InvalidInput(
                "Merchandise events need at least one variant".to_string(),
            ));
        }
        if event.variants.iter().any(|v| v.stock < 0 || v.price < 0) {
            return Err(FelicityError::InvalidInput(
                "Variant stock and price cannot be negative".to_string(),
            ));
        }
        if matches!(event.purchase_limit, Some(limit) if limit < 1) {
            return Err(FelicityError::InvalidInput("Purchase limit must be at least 1".to_string()));
        }
    }

    let mut keys: Vec<&str> = event.form_fields.iter().map(|f| f.key.as_str()).collect();
    keys.sort_unstable();
    if keys.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(FelicityError::InvalidInput("Form field keys must be unique".to_string()));
    }
    Ok(())
}

impl From<&Event> for NewEvent {
    fn from(event: &Event) -> Self {
        NewEvent {
            organizer_id: event.organizer_id,
            name: event.name.clone(),
            description: event.description.clone(),
            kind: event.kind,
            eligibility: event.eligibility,
            tags: event.tags.clone(),
            registration_deadline: event.registration_deadline,
            start_time: event.start_time,
            end_time: event.end_time,
            registration_limit: event.registration_limit,
            registration_fee: event.registration_fee,
            form_fields: event.form_fields.clone(),
            variants: event.variants.clone(),
            purchase_limit: event.purchase_limit,
            requires_payment_approval: event.requires_payment_approval,
        }
    }
}
