//! HTTP notifier tests against a mock relay and webhook

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use helpers::*;

use felicity::config::NotificationSettings;
use felicity::database::{MemoryStore, Store};
use felicity::models::{CreateUserRequest, ParticipantCategory, RegisterRequest, Role};
use felicity::services::{Engine, ManualClock, NotificationService, Notifier, TicketNotice};
use felicity::{ErrorKind, FelicityError};

fn settings(mail_relay_url: Option<String>) -> NotificationSettings {
    NotificationSettings {
        mail_relay_url,
        ..Default::default()
    }
}

fn notice() -> TicketNotice {
    TicketNotice {
        participant_address: "asha@fest.example.test".to_string(),
        participant_name: "Asha Rao".to_string(),
        ticket_id: "TKT-1740823200000-a1B2c3D4e5".to_string(),
        event_name: "Battle of Bands".to_string(),
    }
}

/// Wait for detached deliveries to reach the mock server
async fn received(server: &MockServer, count: usize) -> Vec<Request> {
    for _ in 0..50 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.len() >= count {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn test_ticket_mail_posts_to_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .and(header("user-agent", "Felicity/0.1"))
        .and(body_partial_json(json!({
            "to": "asha@fest.example.test",
            "subject": "Your ticket for Battle of Bands",
            "ticket_id": "TKT-1740823200000-a1B2c3D4e5",
            "qr_payload": "TKT-1740823200000-a1B2c3D4e5",
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let service = NotificationService::new(settings(Some(format!("{}/relay", server.uri())))).unwrap();
    service.send_ticket(&notice()).await.unwrap();
}

#[tokio::test]
async fn test_relay_failure_is_an_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = NotificationService::new(settings(Some(server.uri()))).unwrap();
    let err = service.send_ticket(&notice()).await.unwrap_err();
    assert!(matches!(err, FelicityError::Http(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_disabled_notifier_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let service = NotificationService::new(NotificationSettings {
        enabled: false,
        mail_relay_url: Some(server.uri()),
        ..Default::default()
    })
    .unwrap();
    service.send_ticket(&notice()).await.unwrap();

    let t = TestEngine::new();
    let organizer = t.organizer().await;
    let published = t.published_event(&organizer, normal_event(None)).await;
    service
        .announce_published(&format!("{}/hook", server.uri()), &published.summary())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_announcement_rejects_malformed_webhook() {
    let t = TestEngine::new();
    let organizer = t.organizer().await;
    let event = t.published_event(&organizer, normal_event(None)).await;

    let service = NotificationService::new(settings(None)).unwrap();
    let err = service.announce_published("not a url", &event.summary()).await.unwrap_err();
    assert!(matches!(err, FelicityError::UrlParse(_)));
}

#[tokio::test]
async fn test_publish_and_register_reach_http_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = NotificationService::new(settings(Some(format!("{}/relay", server.uri())))).unwrap();
    let engine = Engine::new(store.clone(), Arc::new(notifier), Arc::new(ManualClock::new(base_time())));

    let organizer = store
        .create_user(CreateUserRequest {
            webhook_url: Some(format!("{}/hook", server.uri())),
            ..organizer_request()
        })
        .await
        .unwrap()
        .actor();
    let participant = store
        .create_user(participant_request(ParticipantCategory::Iiit))
        .await
        .unwrap()
        .actor();
    let quiet_organizer = store
        .create_user(CreateUserRequest {
            webhook_url: None,
            role: Role::Organizer,
            ..organizer_request()
        })
        .await
        .unwrap()
        .actor();

    // No webhook configured: publishing succeeds and posts nothing
    let unannounced = engine.events.create_event(&quiet_organizer, normal_event(None)).await.unwrap();
    engine.events.edit_event(&quiet_organizer, unannounced.id, publish()).await.unwrap();

    let draft = engine.events.create_event(&organizer, normal_event(None)).await.unwrap();
    engine.events.edit_event(&organizer, draft.id, publish()).await.unwrap();
    let registration = engine
        .registrations
        .register(&participant, RegisterRequest { event_id: draft.id, form_answers: band_answers("Agam") })
        .await
        .unwrap();

    let requests = received(&server, 2).await;
    assert_eq!(requests.len(), 2);

    let hook = requests.iter().find(|r| r.url.path() == "/hook").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&hook.body).unwrap();
    assert_eq!(body["content"], "New event published: **Battle of Bands**");
    assert_eq!(body["embeds"][0]["title"], "Battle of Bands");
    assert_eq!(body["embeds"][0]["description"], "Inter-college music night");
    assert_eq!(body["event"]["id"], json!(draft.id));
    assert_eq!(body["event"]["kind"], "normal");

    let relay = requests.iter().find(|r| r.url.path() == "/relay").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&relay.body).unwrap();
    assert_eq!(body["ticket_id"], json!(registration.ticket_id));
    assert!(body["text"].as_str().unwrap().contains("Hi Asha Rao"), "greets the participant by name: {}", body["text"]);
}
