//! Notification service implementation
//!
//! Ticket mails and publish announcements leave the engine through the
//! [`Notifier`] trait. Dispatch is detached: the business operation has
//! already committed when a notice is sent, and a delivery failure is only
//! logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::settings::NotificationSettings;
use crate::models::event::EventSummary;
use crate::utils::errors::{FelicityError, Result};
use crate::utils::helpers::{format_timestamp, truncate_text};
use crate::utils::logging::{log_notification_failure, log_notification_skipped};

/// Embed descriptions above this are cut by most chat webhooks
const DESCRIPTION_LIMIT: usize = 1024;

/// Everything the mail collaborator needs to deliver a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNotice {
    pub participant_address: String,
    pub participant_name: String,
    pub ticket_id: String,
    pub event_name: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_ticket(&self, notice: &TicketNotice) -> Result<()>;

    async fn announce_published(&self, webhook_url: &str, summary: &EventSummary) -> Result<()>;
}

/// Send a ticket mail without waiting for it
pub fn dispatch_ticket(notifier: Arc<dyn Notifier>, notice: TicketNotice) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_ticket(&notice).await {
            log_notification_failure("email", &notice.participant_address, &e.to_string());
        }
    });
}

/// Announce a publication without waiting for it
pub fn dispatch_announcement(notifier: Arc<dyn Notifier>, webhook_url: String, summary: EventSummary) {
    tokio::spawn(async move {
        if let Err(e) = notifier.announce_published(&webhook_url, &summary).await {
            log_notification_failure("webhook", &webhook_url, &e.to_string());
        }
    });
}

/// HTTP notifier: chat-style webhook for announcements, JSON mail relay for tickets
#[derive(Clone, Debug)]
pub struct NotificationService {
    client: Client,
    settings: NotificationSettings,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(settings: NotificationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.webhook_timeout_seconds))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(FelicityError::Http)?;

        Ok(Self { client, settings })
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self.client.post(url).json(payload).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn send_ticket(&self, notice: &TicketNotice) -> Result<()> {
        if !self.is_enabled() {
            log_notification_skipped("email", &notice.participant_address);
            return Ok(());
        }
        let Some(ref relay) = self.settings.mail_relay_url else {
            info!(
                ticket_id = %notice.ticket_id,
                to = %notice.participant_address,
                "No mail relay configured; ticket mail not sent"
            );
            return Ok(());
        };

        let payload = json!({
            "to": notice.participant_address,
            "subject": format!("Your ticket for {}", notice.event_name),
            "text": format!(
                "Hi {},\n\nYou're registered for {}. Present this ticket at the entrance:\n\n{}\n",
                notice.participant_name, notice.event_name, notice.ticket_id
            ),
            "ticket_id": notice.ticket_id,
            "qr_payload": notice.ticket_id,
        });
        self.post_json(relay, &payload).await?;

        debug!(ticket_id = %notice.ticket_id, "Ticket mail handed to relay");
        Ok(())
    }

    async fn announce_published(&self, webhook_url: &str, summary: &EventSummary) -> Result<()> {
        if !self.is_enabled() {
            log_notification_skipped("webhook", webhook_url);
            return Ok(());
        }
        url::Url::parse(webhook_url)?;

        let description = summary
            .description
            .as_deref()
            .map(|text| truncate_text(text, DESCRIPTION_LIMIT))
            .unwrap_or_default();
        let payload = json!({
            "content": format!("New event published: **{}**", summary.name),
            "embeds": [{
                "title": summary.name,
                "description": description,
                "fields": [
                    { "name": "Type", "value": summary.kind.to_string(), "inline": true },
                    { "name": "Eligibility", "value": summary.eligibility.to_string(), "inline": true },
                    { "name": "Fee", "value": summary.registration_fee.to_string(), "inline": true },
                    { "name": "Starts", "value": format_timestamp(summary.start_time), "inline": false },
                    { "name": "Register by", "value": format_timestamp(summary.registration_deadline), "inline": false },
                ],
            }],
            "event": summary,
        });
        self.post_json(webhook_url, &payload).await?;

        debug!(event_id = summary.id, "Publish announcement delivered");
        Ok(())
    }
}
