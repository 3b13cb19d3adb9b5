//! Ticket issuer
//!
//! Tickets are `TKT-<unix millis>-<10 random alphanumerics>`. The time part
//! keeps them roughly sortable, the random part makes them unguessable, and
//! the `registrations_ticket_key` constraint backs global uniqueness.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

const PREFIX: &str = "TKT";
const RANDOM_LEN: usize = 10;

pub fn issue_ticket_id(now: DateTime<Utc>) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}-{}-{}", PREFIX, now.timestamp_millis(), random)
}

/// Cheap shape check used before hitting storage on a scan
pub fn looks_like_ticket(candidate: &str) -> bool {
    let mut parts = candidate.trim().splitn(3, '-');
    let (Some(prefix), Some(millis), Some(random)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    prefix == PREFIX
        && !millis.is_empty()
        && millis.chars().all(|c| c.is_ascii_digit())
        && random.len() == RANDOM_LEN
        && random.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ticket_format() {
        let now = Utc::now();
        let ticket = issue_ticket_id(now);
        assert!(ticket.starts_with(&format!("TKT-{}-", now.timestamp_millis())));
        assert!(looks_like_ticket(&ticket));
    }

    #[test]
    fn test_tickets_issued_in_the_same_millisecond_differ() {
        let now = Utc::now();
        let tickets: HashSet<String> = (0..10_000).map(|_| issue_ticket_id(now)).collect();
        assert_eq!(tickets.len(), 10_000);
    }

    #[test]
    fn test_rejects_malformed_tickets() {
        assert!(!looks_like_ticket(""));
        assert!(!looks_like_ticket("TKT-123"));
        assert!(!looks_like_ticket("ABC-123-abcdefghij"));
        assert!(!looks_like_ticket("TKT-12a-abcdefghij"));
        assert!(!looks_like_ticket("TKT-123-abc"));
        assert!(!looks_like_ticket("TKT-123-abcdefgh!j"));
    }
}
