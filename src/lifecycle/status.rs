//! Status resolver
//!
//! Derives the effective lifecycle status of an event from its stored
//! override and the wall clock. Draft, Closed and Completed overrides are
//! authoritative; Published and Ongoing are hints resolved against the
//! event window.

use chrono::{DateTime, Utc};

use crate::models::event::EventStatus;

/// Effective status of an event at `now`
pub fn effective_status(
    status_override: EventStatus,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EventStatus {
    match status_override {
        EventStatus::Draft | EventStatus::Closed | EventStatus::Completed => status_override,
        EventStatus::Published | EventStatus::Ongoing => {
            if now < start_time {
                EventStatus::Published
            } else if now <= end_time {
                EventStatus::Ongoing
            } else {
                EventStatus::Completed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap();
        (start, start + Duration::hours(6))
    }

    #[test]
    fn test_published_follows_the_clock() {
        let (start, end) = window();
        let status = |now| effective_status(EventStatus::Published, start, end, now);

        assert_eq!(status(start - Duration::seconds(1)), EventStatus::Published);
        assert_eq!(status(start), EventStatus::Ongoing);
        assert_eq!(status(end), EventStatus::Ongoing);
        assert_eq!(status(end + Duration::seconds(1)), EventStatus::Completed);
    }

    #[test]
    fn test_ongoing_override_is_only_a_hint() {
        let (start, end) = window();
        assert_eq!(
            effective_status(EventStatus::Ongoing, start, end, start - Duration::days(1)),
            EventStatus::Published
        );
    }

    fn any_status() -> impl Strategy<Value = EventStatus> {
        prop_oneof![
            Just(EventStatus::Draft),
            Just(EventStatus::Published),
            Just(EventStatus::Ongoing),
            Just(EventStatus::Completed),
            Just(EventStatus::Closed),
        ]
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(status in any_status(), offset in -100_000i64..100_000) {
            let (start, end) = window();
            let now = start + Duration::minutes(offset);
            prop_assert_eq!(
                effective_status(status, start, end, now),
                effective_status(status, start, end, now)
            );
        }

        #[test]
        fn prop_manual_states_ignore_time(offset in -100_000i64..100_000) {
            let (start, end) = window();
            let now = start + Duration::minutes(offset);
            prop_assert_eq!(effective_status(EventStatus::Draft, start, end, now), EventStatus::Draft);
            prop_assert_eq!(effective_status(EventStatus::Closed, start, end, now), EventStatus::Closed);
            prop_assert_eq!(effective_status(EventStatus::Completed, start, end, now), EventStatus::Completed);
        }

        #[test]
        fn prop_completed_never_reverts(a in -100_000i64..100_000, step in 0i64..100_000) {
            let (start, end) = window();
            let earlier = start + Duration::minutes(a);
            let later = earlier + Duration::minutes(step);
            if effective_status(EventStatus::Published, start, end, earlier) == EventStatus::Completed {
                prop_assert_eq!(
                    effective_status(EventStatus::Published, start, end, later),
                    EventStatus::Completed
                );
            }
        }
    }
}
