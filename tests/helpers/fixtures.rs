//! Test data fixtures

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use felicity::models::{
    CreateEventRequest, CreateUserRequest, Eligibility, EventKind, FormField, FormFieldType, NewVariant,
    ParticipantCategory, Role,
};

pub const ORGANIZER_WEBHOOK: &str = "https://hooks.example.test/felicity";

/// Fixed "now" every test engine starts at
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@fest.example.test", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub fn organizer_request() -> CreateUserRequest {
    CreateUserRequest {
        email: unique_email("club"),
        first_name: "Cultural".to_string(),
        last_name: Some("Council".to_string()),
        role: Role::Organizer,
        category: ParticipantCategory::Iiit,
        webhook_url: Some(ORGANIZER_WEBHOOK.to_string()),
    }
}

pub fn participant_request(category: ParticipantCategory) -> CreateUserRequest {
    CreateUserRequest {
        email: unique_email("student"),
        first_name: "Asha".to_string(),
        last_name: Some("Rao".to_string()),
        role: Role::Participant,
        category,
        webhook_url: None,
    }
}

pub fn admin_request() -> CreateUserRequest {
    CreateUserRequest {
        email: unique_email("admin"),
        first_name: "Fest".to_string(),
        last_name: None,
        role: Role::Admin,
        category: ParticipantCategory::Iiit,
        webhook_url: None,
    }
}

/// Normal event opening registrations now, starting in ten days
pub fn normal_event(limit: Option<i32>) -> CreateEventRequest {
    let now = base_time();
    CreateEventRequest {
        name: "Battle of Bands".to_string(),
        description: Some("Inter-college music night".to_string()),
        kind: EventKind::Normal,
        eligibility: Eligibility::All,
        tags: vec!["music".to_string()],
        registration_deadline: now + Duration::days(5),
        start_time: now + Duration::days(10),
        end_time: now + Duration::days(10) + Duration::hours(6),
        registration_limit: limit,
        registration_fee: 0,
        form_fields: vec![FormField {
            key: "band".to_string(),
            label: "Band name".to_string(),
            field_type: FormFieldType::Text,
            required: true,
            options: vec![],
        }],
        variants: vec![],
        purchase_limit: None,
        requires_payment_approval: false,
    }
}

/// Merchandise event with a single variant
pub fn merch_event(stock: i32, requires_payment_approval: bool) -> CreateEventRequest {
    let now = base_time();
    CreateEventRequest {
        name: "Fest Hoodie".to_string(),
        description: None,
        kind: EventKind::Merchandise,
        eligibility: Eligibility::All,
        tags: vec!["merch".to_string()],
        registration_deadline: now + Duration::days(5),
        start_time: now + Duration::days(10),
        end_time: now + Duration::days(12),
        registration_limit: None,
        registration_fee: 0,
        form_fields: vec![],
        variants: vec![NewVariant {
            size: "M".to_string(),
            color: "Black".to_string(),
            stock,
            price: 799,
        }],
        purchase_limit: Some(3),
        requires_payment_approval,
    }
}

pub fn band_answers(band: &str) -> felicity::models::FormAnswers {
    let mut answers = felicity::models::FormAnswers::new();
    answers.insert("band".to_string(), serde_json::json!(band));
    answers
}
