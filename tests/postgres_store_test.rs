//! Postgres store tests
//!
//! The same guards the service tests exercise in memory, run through
//! `DatabaseService`. Skipped unless a database is configured; see
//! `helpers::database`.

mod helpers;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use serial_test::serial;

use helpers::database::TestDatabase;
use helpers::*;

use felicity::models::{
    EventStatus, ParticipantCategory, PaymentStatus, PlaceOrderRequest, RegisterRequest, UpdateEventRequest,
};
use felicity::services::{Clock, OrderPlacement, ScanOutcome};
use felicity::{ErrorKind, FelicityError};

async fn engine(db: &TestDatabase) -> TestEngine {
    TestEngine::with_store(Arc::new(db.service()))
}

#[tokio::test]
#[serial]
async fn test_event_round_trip_and_version_guard() {
    let Some(db) = TestDatabase::connect().await else { return };
    felicity::database::health_check(&db.pool).await.unwrap();
    let t = engine(&db).await;
    let organizer = t.organizer().await;

    let draft = t.engine.events.create_event(&organizer, merch_event(4, true)).await.unwrap();
    let stored = t.store.find_event(draft.id).await.unwrap().unwrap();
    assert_eq!(stored.status_override, EventStatus::Draft);
    assert_eq!(stored.variants.len(), 1);
    assert_eq!(stored.variants[0].stock, 4);
    assert_eq!(stored.tags, vec!["merch".to_string()]);

    let renamed = t
        .engine
        .events
        .edit_event(&organizer, draft.id, UpdateEventRequest { name: Some("Fest Tee".into()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(renamed.version, draft.version + 1);

    let mut stale = draft.clone();
    stale.name = "Lost write".into();
    let err = t.store.update_event(&stale, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(t.store.find_event(draft.id).await.unwrap().unwrap().name, "Fest Tee");

    t.engine.events.delete_event(&organizer, draft.id).await.unwrap();
    assert_eq!(db.count_records("events").await, 0);
    assert_eq!(db.count_records("event_variants").await, 0);
}

#[tokio::test]
#[serial]
async fn test_registration_guards_in_database() {
    let Some(db) = TestDatabase::connect().await else { return };
    let t = engine(&db).await;
    let organizer = t.organizer().await;
    let first = t.participant(ParticipantCategory::Iiit).await;
    let second = t.participant(ParticipantCategory::NonIiit).await;
    let event = t.published_event(&organizer, normal_event(Some(1))).await;
    let request = || RegisterRequest { event_id: event.id, form_answers: band_answers("Motherjane") };

    let registration = t.engine.registrations.register(&first, request()).await.unwrap();
    assert_eq!(registration.form_answers["band"], serde_json::json!("Motherjane"));
    assert!(t.store.find_event(event.id).await.unwrap().unwrap().form_locked);

    assert_matches!(
        t.engine.registrations.register(&first, request()).await,
        Err(FelicityError::DuplicateRegistration { .. })
    );
    assert_matches!(
        t.engine.registrations.register(&second, request()).await,
        Err(FelicityError::CapacityExceeded { limit: 1 })
    );
    assert_eq!(db.count_records("registrations").await, 1);

    let by_ticket = t
        .store
        .find_registration_by_ticket(registration.ticket_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_ticket.id, registration.id);
    assert_eq!(t.engine.registrations.my_registrations(&first).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_stock_and_order_workflow_in_database() {
    let Some(db) = TestDatabase::connect().await else { return };
    let t = engine(&db).await;
    let organizer = t.organizer().await;
    let buyer = t.participant(ParticipantCategory::Iiit).await;
    let other = t.participant(ParticipantCategory::Iiit).await;

    let instant = t.published_event(&organizer, merch_event(2, false)).await;
    let variant_id = instant.variants[0].id;
    let placement = t
        .engine
        .registrations
        .place_order(&buyer, PlaceOrderRequest { event_id: instant.id, variant_id, quantity: 2 })
        .await
        .unwrap();
    assert_matches!(placement, OrderPlacement::Confirmed(_));
    assert_eq!(t.stock_of(instant.id).await, 0);
    assert_eq!(t.store.ordered_quantity(instant.id, buyer.user_id).await.unwrap(), 2);
    assert_matches!(
        t.engine
            .registrations
            .place_order(&other, PlaceOrderRequest { event_id: instant.id, variant_id, quantity: 1 })
            .await,
        Err(FelicityError::InsufficientStock { .. })
    );

    let gated = t.published_event(&organizer, merch_event(1, true)).await;
    let variant_id = gated.variants[0].id;
    let mut pending = Vec::new();
    for actor in [&buyer, &other] {
        let placement = t
            .engine
            .registrations
            .place_order(actor, PlaceOrderRequest { event_id: gated.id, variant_id, quantity: 1 })
            .await
            .unwrap();
        pending.push(assert_matches!(placement, OrderPlacement::AwaitingApproval(order) => order));
    }

    let with_proof = t
        .engine
        .orders
        .attach_payment_proof(&buyer, pending[0].id, "upi://ref/5512")
        .await
        .unwrap();
    assert_eq!(with_proof.payment_proof_url.as_deref(), Some("upi://ref/5512"));

    let approved = t.engine.orders.approve_order(&organizer, pending[0].id).await.unwrap();
    assert_eq!(approved.payment_status, PaymentStatus::Approved);
    assert!(approved.ticket_id.is_some());
    assert_eq!(t.stock_of(gated.id).await, 0);

    let err = t.engine.orders.approve_order(&organizer, pending[1].id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    let still_pending = t.store.find_registration(pending[1].id).await.unwrap().unwrap();
    assert_eq!(still_pending.payment_status, PaymentStatus::Pending);

    assert_eq!(t.store.list_events_with_pending_orders().await.unwrap().len(), 1);
    t.clock.set(gated.end_time + Duration::minutes(1));
    assert_eq!(t.engine.orders.sweep_stale_orders().await.unwrap(), 1);
    let swept = t.store.find_registration(pending[1].id).await.unwrap().unwrap();
    assert_eq!(swept.payment_status, PaymentStatus::Rejected);
    assert!(t.store.list_events_with_pending_orders().await.unwrap().is_empty());

    assert_matches!(
        t.engine.orders.reject_order(&organizer, approved.id).await,
        Err(FelicityError::InvalidStateTransition { .. })
    );
}

#[tokio::test]
#[serial]
async fn test_attendance_in_database() {
    let Some(db) = TestDatabase::connect().await else { return };
    let t = engine(&db).await;
    let organizer = t.organizer().await;
    let participant = t.participant(ParticipantCategory::Iiit).await;
    let event = t.published_event(&organizer, normal_event(None)).await;
    let registration = t
        .engine
        .registrations
        .register(&participant, RegisterRequest { event_id: event.id, form_answers: band_answers("Pentagram") })
        .await
        .unwrap();
    let ticket = registration.ticket_id.clone().unwrap();

    t.clock.set(event.start_time);
    let first = t.engine.attendance.scan_ticket(&organizer, event.id, &ticket).await.unwrap();
    assert!(!first.is_duplicate());

    t.clock.advance(Duration::minutes(20));
    let again = t.engine.attendance.scan_ticket(&organizer, event.id, &ticket).await.unwrap();
    assert_matches!(again, ScanOutcome::Duplicate { first_scanned_at, .. } if first_scanned_at == event.start_time);

    let cleared = t
        .engine
        .attendance
        .override_attendance(&organizer, registration.id, false, "left before the show")
        .await
        .unwrap();
    assert!(!cleared.attended);
    assert!(cleared.attended_at.is_none());

    let reloaded = t.store.find_registration(registration.id).await.unwrap().unwrap();
    let audit = reloaded.attendance_override.unwrap();
    assert_eq!(audit.reason, "left before the show");
    assert_eq!(audit.actor_id, organizer.user_id);
    assert_eq!(audit.overridden_at, t.clock.now());
}

#[tokio::test]
#[serial]
async fn test_organizer_deletion_cascades_in_database() {
    let Some(db) = TestDatabase::connect().await else { return };
    let t = engine(&db).await;
    let organizer = t.organizer().await;
    let participant = t.participant(ParticipantCategory::Iiit).await;

    let event = t.published_event(&organizer, merch_event(3, false)).await;
    t.engine
        .registrations
        .place_order(&participant, PlaceOrderRequest { event_id: event.id, variant_id: event.variants[0].id, quantity: 1 })
        .await
        .unwrap();

    t.engine.events.delete_organizer(&organizer, organizer.user_id).await.unwrap();
    assert_eq!(db.count_records("events").await, 0);
    assert_eq!(db.count_records("event_variants").await, 0);
    assert_eq!(db.count_records("registrations").await, 0);
    assert_eq!(db.count_records("users").await, 1);
}
