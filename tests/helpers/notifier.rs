//! Notifier doubles

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use felicity::models::EventSummary;
use felicity::services::{Notifier, TicketNotice};
use felicity::{FelicityError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Ticket(TicketNotice),
    Announcement { webhook_url: String, summary: EventSummary },
}

/// Records every notice; dispatch is detached, so reads wait briefly
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Sent>,
    rx: Mutex<mpsc::UnboundedReceiver<Sent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(rx) }
    }

    /// Next notice, or `None` if nothing arrives within a second
    pub async fn next(&self) -> Option<Sent> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.ok().flatten()
    }

    pub async fn next_ticket(&self) -> TicketNotice {
        match self.next().await {
            Some(Sent::Ticket(notice)) => notice,
            other => panic!("expected a ticket notice, got {:?}", other),
        }
    }

    /// Assert nothing else is sent
    pub async fn assert_quiet(&self) {
        let mut rx = self.rx.lock().await;
        let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(matches!(extra, Err(_) | Ok(None)), "unexpected notice: {:?}", extra);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_ticket(&self, notice: &TicketNotice) -> Result<()> {
        let _ = self.tx.send(Sent::Ticket(notice.clone()));
        Ok(())
    }

    async fn announce_published(&self, webhook_url: &str, summary: &EventSummary) -> Result<()> {
        let _ = self.tx.send(Sent::Announcement {
            webhook_url: webhook_url.to_string(),
            summary: summary.clone(),
        });
        Ok(())
    }
}

/// Notifier whose every delivery fails
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_ticket(&self, _notice: &TicketNotice) -> Result<()> {
        Err(FelicityError::Config("mail relay unreachable".to_string()))
    }

    async fn announce_published(&self, _webhook_url: &str, _summary: &EventSummary) -> Result<()> {
        Err(FelicityError::Config("webhook unreachable".to_string()))
    }
}
