//! Edit authorizer
//!
//! Which event fields may change is decided by a per-phase table. Each phase
//! lists the fields it admits, and the monotone fields carry a predicate the
//! new value must satisfy. A request is evaluated as a whole and rejected if
//! any touched field fails; nothing is applied partially.

use std::fmt;

use crate::models::event::{Event, EventStatus, NewVariant, UpdateEventRequest};
use crate::utils::errors::{FelicityError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    Name,
    Description,
    Kind,
    Eligibility,
    Tags,
    RegistrationDeadline,
    StartTime,
    EndTime,
    RegistrationLimit,
    StatusOverride,
    RegistrationFee,
    FormFields,
    Variants,
    PurchaseLimit,
    RequiresPaymentApproval,
}

impl EventField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventField::Name => "name",
            EventField::Description => "description",
            EventField::Kind => "kind",
            EventField::Eligibility => "eligibility",
            EventField::Tags => "tags",
            EventField::RegistrationDeadline => "registration_deadline",
            EventField::StartTime => "start_time",
            EventField::EndTime => "end_time",
            EventField::RegistrationLimit => "registration_limit",
            EventField::StatusOverride => "status_override",
            EventField::RegistrationFee => "registration_fee",
            EventField::FormFields => "form_fields",
            EventField::Variants => "variants",
            EventField::PurchaseLimit => "purchase_limit",
            EventField::RequiresPaymentApproval => "requires_payment_approval",
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UpdateEventRequest {
    /// Fields present in the request, in declaration order
    pub fn touched_fields(&self) -> Vec<EventField> {
        let present = [
            (self.name.is_some(), EventField::Name),
            (self.description.is_some(), EventField::Description),
            (self.kind.is_some(), EventField::Kind),
            (self.eligibility.is_some(), EventField::Eligibility),
            (self.tags.is_some(), EventField::Tags),
            (self.registration_deadline.is_some(), EventField::RegistrationDeadline),
            (self.start_time.is_some(), EventField::StartTime),
            (self.end_time.is_some(), EventField::EndTime),
            (self.registration_limit.is_some(), EventField::RegistrationLimit),
            (self.status_override.is_some(), EventField::StatusOverride),
            (self.registration_fee.is_some(), EventField::RegistrationFee),
            (self.form_fields.is_some(), EventField::FormFields),
            (self.variants.is_some(), EventField::Variants),
            (self.purchase_limit.is_some(), EventField::PurchaseLimit),
            (self.requires_payment_approval.is_some(), EventField::RequiresPaymentApproval),
        ];
        present
            .into_iter()
            .filter_map(|(touched, field)| touched.then_some(field))
            .collect()
    }
}

type WideningCheck = fn(&Event, &UpdateEventRequest) -> bool;

#[derive(Clone, Copy)]
pub struct FieldRule {
    pub field: EventField,
    widening: Option<WideningCheck>,
}

impl FieldRule {
    const fn free(field: EventField) -> Self {
        Self { field, widening: None }
    }

    const fn widening(field: EventField, check: WideningCheck) -> Self {
        Self { field, widening: Some(check) }
    }
}

/// What a phase admits
#[derive(Clone, Copy)]
pub enum PhasePolicy {
    Any,
    Only(&'static [FieldRule]),
    Frozen,
}

const PUBLISHED: &[FieldRule] = &[
    FieldRule::free(EventField::Description),
    FieldRule::widening(EventField::RegistrationDeadline, deadline_widens),
    FieldRule::widening(EventField::RegistrationLimit, limit_widens),
    FieldRule::free(EventField::StatusOverride),
];

const RUNNING: &[FieldRule] = &[FieldRule::free(EventField::StatusOverride)];

pub fn policy_for(status: EventStatus) -> PhasePolicy {
    match status {
        EventStatus::Draft => PhasePolicy::Any,
        EventStatus::Published => PhasePolicy::Only(PUBLISHED),
        EventStatus::Ongoing | EventStatus::Completed => PhasePolicy::Only(RUNNING),
        EventStatus::Closed => PhasePolicy::Frozen,
    }
}

fn deadline_widens(event: &Event, patch: &UpdateEventRequest) -> bool {
    patch
        .registration_deadline
        .map_or(true, |deadline| deadline >= event.registration_deadline)
}

// `None` is an unlimited event; any concrete limit narrows it.
fn limit_widens(event: &Event, patch: &UpdateEventRequest) -> bool {
    match (event.registration_limit, patch.registration_limit) {
        (_, None) => true,
        (_, Some(None)) => true,
        (None, Some(Some(_))) => false,
        (Some(old), Some(Some(new))) => new >= old,
    }
}

/// Decide whether `patch` may be applied to `event` in phase `status`
pub fn authorize_edit(event: &Event, status: EventStatus, patch: &UpdateEventRequest) -> Result<()> {
    let touched = patch.touched_fields();
    if touched.is_empty() {
        return Err(FelicityError::InvalidInput("Update request contains no fields".to_string()));
    }

    match policy_for(status) {
        PhasePolicy::Frozen => {
            return Err(FelicityError::InvalidPhase { status, operation: "edit event" });
        }
        PhasePolicy::Any => {}
        PhasePolicy::Only(rules) => {
            let rejected: Vec<String> = touched
                .iter()
                .filter(|field| !rules.iter().any(|rule| rule.field == **field))
                .map(|field| field.to_string())
                .collect();
            if !rejected.is_empty() {
                return Err(FelicityError::FieldsNotEditable { status, fields: rejected });
            }

            for rule in rules.iter().filter(|rule| touched.contains(&rule.field)) {
                if let Some(check) = rule.widening {
                    if !check(event, patch) {
                        return Err(FelicityError::NonWideningChange { field: rule.field.as_str() });
                    }
                }
            }
        }
    }

    if event.form_locked && touched.contains(&EventField::FormFields) {
        return Err(FelicityError::FieldsNotEditable {
            status,
            fields: vec![EventField::FormFields.to_string()],
        });
    }

    if let Some(target) = patch.status_override {
        if target == EventStatus::Ongoing {
            return Err(FelicityError::InvalidInput(
                "Ongoing is derived from the schedule and cannot be set".to_string(),
            ));
        }
        if target == EventStatus::Draft && status != EventStatus::Draft {
            return Err(FelicityError::transition(status, target));
        }
        // Completed never reverts; it may only be confirmed or closed
        if status == EventStatus::Completed && !matches!(target, EventStatus::Completed | EventStatus::Closed) {
            return Err(FelicityError::transition(status, target));
        }
    }

    Ok(())
}

/// Whether applying `patch` moves the event out of draft into publication
pub fn publishes(event: &Event, patch: &UpdateEventRequest) -> bool {
    event.status_override == EventStatus::Draft && patch.status_override == Some(EventStatus::Published)
}

/// Produce the edited event. Call only after [`authorize_edit`] succeeded.
pub fn apply(event: &Event, patch: UpdateEventRequest) -> Event {
    let mut next = event.clone();
    if let Some(name) = patch.name {
        next.name = name;
    }
    if let Some(description) = patch.description {
        next.description = description;
    }
    if let Some(kind) = patch.kind {
        next.kind = kind;
    }
    if let Some(eligibility) = patch.eligibility {
        next.eligibility = eligibility;
    }
    if let Some(tags) = patch.tags {
        next.tags = tags;
    }
    if let Some(deadline) = patch.registration_deadline {
        next.registration_deadline = deadline;
    }
    if let Some(start) = patch.start_time {
        next.start_time = start;
    }
    if let Some(end) = patch.end_time {
        next.end_time = end;
    }
    if let Some(limit) = patch.registration_limit {
        next.registration_limit = limit;
    }
    if let Some(status) = patch.status_override {
        next.status_override = status;
    }
    if let Some(fee) = patch.registration_fee {
        next.registration_fee = fee;
    }
    if let Some(fields) = patch.form_fields {
        next.form_fields = fields;
    }
    if let Some(variants) = patch.variants {
        next.variants = variants.into_iter().map(NewVariant::into_variant).collect();
    }
    if let Some(limit) = patch.purchase_limit {
        next.purchase_limit = limit;
    }
    if let Some(requires) = patch.requires_payment_approval {
        next.requires_payment_approval = requires;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{Eligibility, EventKind, FormField, FormFieldType};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn published_event() -> Event {
        let now = Utc::now();
        Event {
            id: 1,
            organizer_id: 7,
            name: "Hackathon".to_string(),
            description: None,
            kind: EventKind::Normal,
            eligibility: Eligibility::All,
            tags: vec![],
            registration_deadline: now + Duration::days(5),
            start_time: now + Duration::days(10),
            end_time: now + Duration::days(11),
            registration_limit: Some(50),
            status_override: EventStatus::Published,
            registration_fee: 0,
            form_fields: vec![],
            form_locked: false,
            variants: vec![],
            purchase_limit: None,
            requires_payment_approval: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_draft_accepts_any_field() {
        let mut event = published_event();
        event.status_override = EventStatus::Draft;
        let patch = UpdateEventRequest {
            name: Some("Renamed".into()),
            start_time: Some(event.start_time + Duration::days(1)),
            registration_limit: Some(Some(10)),
            ..Default::default()
        };
        assert!(authorize_edit(&event, EventStatus::Draft, &patch).is_ok());
        let next = apply(&event, patch);
        assert_eq!(next.name, "Renamed");
        assert_eq!(next.registration_limit, Some(10));
    }

    #[test]
    fn test_published_rejects_whole_request_on_foreign_field() {
        let event = published_event();
        let patch = UpdateEventRequest {
            description: Some(Some("fine".into())),
            name: Some("not fine".into()),
            ..Default::default()
        };
        let err = authorize_edit(&event, EventStatus::Published, &patch).unwrap_err();
        assert_matches!(err, FelicityError::FieldsNotEditable { fields, .. } if fields == vec!["name".to_string()]);
    }

    #[test]
    fn test_published_deadline_must_widen() {
        let event = published_event();
        let earlier = UpdateEventRequest {
            registration_deadline: Some(event.registration_deadline - Duration::days(1)),
            ..Default::default()
        };
        assert_matches!(
            authorize_edit(&event, EventStatus::Published, &earlier),
            Err(FelicityError::NonWideningChange { field: "registration_deadline" })
        );

        let later = UpdateEventRequest {
            registration_deadline: Some(event.registration_deadline + Duration::days(1)),
            ..Default::default()
        };
        assert!(authorize_edit(&event, EventStatus::Published, &later).is_ok());
    }

    #[test]
    fn test_published_limit_must_widen() {
        let event = published_event();
        let lower = UpdateEventRequest { registration_limit: Some(Some(49)), ..Default::default() };
        assert_matches!(
            authorize_edit(&event, EventStatus::Published, &lower),
            Err(FelicityError::NonWideningChange { field: "registration_limit" })
        );

        let unlimited = UpdateEventRequest { registration_limit: Some(None), ..Default::default() };
        assert!(authorize_edit(&event, EventStatus::Published, &unlimited).is_ok());

        let mut open = published_event();
        open.registration_limit = None;
        let capped = UpdateEventRequest { registration_limit: Some(Some(500)), ..Default::default() };
        assert!(authorize_edit(&open, EventStatus::Published, &capped).is_err());
    }

    #[test]
    fn test_running_phases_only_take_status() {
        let event = published_event();
        for status in [EventStatus::Ongoing, EventStatus::Completed] {
            let close = UpdateEventRequest { status_override: Some(EventStatus::Closed), ..Default::default() };
            assert!(authorize_edit(&event, status, &close).is_ok());

            let with_description = UpdateEventRequest {
                status_override: Some(EventStatus::Closed),
                description: Some(None),
                ..Default::default()
            };
            assert_matches!(
                authorize_edit(&event, status, &with_description),
                Err(FelicityError::FieldsNotEditable { .. })
            );
        }
    }

    #[test]
    fn test_completed_cannot_be_reopened() {
        let event = published_event();
        let reopen = UpdateEventRequest { status_override: Some(EventStatus::Published), ..Default::default() };
        assert_matches!(
            authorize_edit(&event, EventStatus::Completed, &reopen),
            Err(FelicityError::InvalidStateTransition { from, to }) if from == "completed" && to == "published"
        );

        let confirm = UpdateEventRequest { status_override: Some(EventStatus::Completed), ..Default::default() };
        assert!(authorize_edit(&event, EventStatus::Completed, &confirm).is_ok());
        assert!(authorize_edit(&event, EventStatus::Published, &confirm).is_ok());
    }

    #[test]
    fn test_closed_is_frozen() {
        let event = published_event();
        let patch = UpdateEventRequest { status_override: Some(EventStatus::Published), ..Default::default() };
        assert_matches!(
            authorize_edit(&event, EventStatus::Closed, &patch),
            Err(FelicityError::InvalidPhase { status: EventStatus::Closed, .. })
        );
    }

    #[test]
    fn test_locked_form_and_return_to_draft_are_rejected() {
        let mut event = published_event();
        event.status_override = EventStatus::Draft;
        event.form_locked = true;
        let patch = UpdateEventRequest {
            form_fields: Some(vec![FormField {
                key: "tshirt".into(),
                label: "T-shirt size".into(),
                field_type: FormFieldType::Dropdown,
                required: true,
                options: vec!["M".into(), "L".into()],
            }]),
            ..Default::default()
        };
        assert!(authorize_edit(&event, EventStatus::Draft, &patch).is_err());

        let event = published_event();
        let back = UpdateEventRequest { status_override: Some(EventStatus::Draft), ..Default::default() };
        assert_matches!(
            authorize_edit(&event, EventStatus::Published, &back),
            Err(FelicityError::InvalidStateTransition { .. })
        );
    }

    #[test]
    fn test_empty_request_is_invalid() {
        let event = published_event();
        assert_matches!(
            authorize_edit(&event, EventStatus::Draft, &UpdateEventRequest::default()),
            Err(FelicityError::InvalidInput(_))
        );
    }

    #[test]
    fn test_publish_detection() {
        let mut event = published_event();
        event.status_override = EventStatus::Draft;
        let patch = UpdateEventRequest { status_override: Some(EventStatus::Published), ..Default::default() };
        assert!(publishes(&event, &patch));
        assert!(!publishes(&published_event(), &patch));
    }
}
