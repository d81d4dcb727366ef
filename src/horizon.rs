//! Day-boundary rules for tasks.
//!
//! Timestamps are stored in UTC, but "today" is the calendar day of the
//! viewer. Every function takes the evaluation instant `now`; its time zone
//! decides where the day boundaries fall. Nothing here reads the clock, so
//! the same task can land in a different bucket on the next call once a
//! midnight has passed.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::model::TimeHorizon;

/// Calendar date of `instant` in the time zone of `now`.
pub fn local_day<Tz: TimeZone>(instant: DateTime<Utc>, now: &DateTime<Tz>) -> NaiveDate {
    instant.with_timezone(&now.timezone()).date_naive()
}

/// The bucket a task is shown in at `now`.
///
/// Only Tomorrow moves: a task put in Tomorrow on an earlier day has arrived
/// and shows up in Today. A task last touched today stays in Tomorrow.
/// Without an update timestamp the stored horizon is returned as is.
pub fn effective_horizon<Tz: TimeZone>(
    stored: TimeHorizon,
    updated_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> TimeHorizon {
    match (stored, updated_at) {
        (TimeHorizon::Tomorrow, Some(updated_at)) => {
            // before today's local midnight <=> on an earlier local date
            if local_day(updated_at, now) < now.date_naive() {
                TimeHorizon::Today
            } else {
                TimeHorizon::Tomorrow
            }
        }
        _ => stored,
    }
}

/// Whether a completed task was completed on another day than today, in
/// which case it only shows up in the Done tab.
pub fn is_stale_completion<Tz: TimeZone>(
    completed: bool,
    updated_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> bool {
    match updated_at {
        Some(updated_at) if completed => local_day(updated_at, now) != now.date_naive(),
        _ => false,
    }
}

/// An incomplete task is overdue when it is effectively in Today but was
/// created on an earlier day. Tomorrow and Someday tasks are never overdue.
pub fn is_overdue<Tz: TimeZone>(
    stored: TimeHorizon,
    completed: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
) -> bool {
    let created_at = match created_at {
        Some(created_at) if !completed => created_at,
        _ => return false,
    };
    if effective_horizon(stored, updated_at, now) != TimeHorizon::Today {
        return false;
    }
    local_day(created_at, now) < now.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    /// 2026-02-01 12:00 at UTC-05:00.
    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 12, 0, 0)
            .unwrap()
    }

    fn utc(s: &str) -> Option<DateTime<Utc>> {
        Some(s.parse::<DateTime<Utc>>().unwrap())
    }

    #[rstest]
    #[case(TimeHorizon::Today, utc("2026-01-30T10:00:00Z"))]
    #[case(TimeHorizon::Today, None)]
    #[case(TimeHorizon::Someday, utc("2026-01-20T10:00:00Z"))]
    #[case(TimeHorizon::Someday, utc("2026-02-01T15:00:00Z"))]
    fn today_and_someday_never_move(
        #[case] stored: TimeHorizon,
        #[case] updated_at: Option<DateTime<Utc>>,
    ) {
        assert_eq!(effective_horizon(stored, updated_at, &now()), stored);
    }

    #[test]
    fn tomorrow_without_timestamp_stays() {
        assert_eq!(
            effective_horizon(TimeHorizon::Tomorrow, None, &now()),
            TimeHorizon::Tomorrow
        );
    }

    #[rstest]
    // 08:00 local today
    #[case("2026-02-01T13:00:00Z", TimeHorizon::Tomorrow)]
    // exactly local midnight
    #[case("2026-02-01T05:00:00Z", TimeHorizon::Tomorrow)]
    // one second before local midnight
    #[case("2026-02-01T04:59:59Z", TimeHorizon::Today)]
    // still Jan 31 locally although Feb 1 in UTC
    #[case("2026-02-01T02:00:00Z", TimeHorizon::Today)]
    #[case("2026-01-28T10:00:00Z", TimeHorizon::Today)]
    fn tomorrow_is_promoted_after_a_day_boundary(
        #[case] updated_at: &str,
        #[case] expected: TimeHorizon,
    ) {
        assert_eq!(
            effective_horizon(TimeHorizon::Tomorrow, utc(updated_at), &now()),
            expected
        );
    }

    #[test]
    fn promotion_follows_the_clock_without_any_write() {
        let updated_at = utc("2026-02-01T13:00:00Z");
        let next_morning = now() + chrono::Duration::hours(20);
        assert_eq!(
            effective_horizon(TimeHorizon::Tomorrow, updated_at, &now()),
            TimeHorizon::Tomorrow
        );
        assert_eq!(
            effective_horizon(TimeHorizon::Tomorrow, updated_at, &next_morning),
            TimeHorizon::Today
        );
    }

    #[rstest]
    #[case(false, utc("2026-01-30T10:00:00Z"), false)]
    #[case(false, None, false)]
    #[case(true, None, false)]
    #[case(true, utc("2026-02-01T13:00:00Z"), false)]
    #[case(true, utc("2026-02-01T04:00:00Z"), true)]
    #[case(true, utc("2026-01-31T23:00:00Z"), true)]
    fn stale_completion(
        #[case] completed: bool,
        #[case] updated_at: Option<DateTime<Utc>>,
        #[case] expected: bool,
    ) {
        assert_eq!(is_stale_completion(completed, updated_at, &now()), expected);
    }

    #[rstest]
    #[case::completed(TimeHorizon::Today, true, "2026-01-30T10:00:00Z", "2026-01-30T10:00:00Z", false)]
    #[case::today_created_today(TimeHorizon::Today, false, "2026-02-01T13:00:00Z", "2026-02-01T13:00:00Z", false)]
    #[case::today_created_yesterday(TimeHorizon::Today, false, "2026-01-31T15:00:00Z", "2026-01-31T15:00:00Z", true)]
    #[case::tomorrow_not_promoted(TimeHorizon::Tomorrow, false, "2026-02-01T13:00:00Z", "2026-02-01T13:00:00Z", false)]
    #[case::tomorrow_promoted(TimeHorizon::Tomorrow, false, "2026-01-31T15:00:00Z", "2026-01-31T15:00:00Z", true)]
    #[case::someday_old(TimeHorizon::Someday, false, "2026-01-01T15:00:00Z", "2026-01-01T15:00:00Z", false)]
    #[case::touched_today(TimeHorizon::Tomorrow, false, "2026-01-31T15:00:00Z", "2026-02-01T14:00:00Z", false)]
    fn overdue(
        #[case] stored: TimeHorizon,
        #[case] completed: bool,
        #[case] created_at: &str,
        #[case] updated_at: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            is_overdue(stored, completed, utc(created_at), utc(updated_at), &now()),
            expected
        );
    }

    #[test]
    fn missing_creation_time_is_never_overdue() {
        assert!(!is_overdue(
            TimeHorizon::Today,
            false,
            None,
            utc("2026-01-31T15:00:00Z"),
            &now()
        ));
    }

    #[test]
    fn touching_resets_promotion_and_overdue_together() {
        let created_at = utc("2026-01-31T15:00:00Z");
        let touched = utc("2026-02-01T14:00:00Z");
        assert_eq!(
            effective_horizon(TimeHorizon::Tomorrow, touched, &now()),
            TimeHorizon::Tomorrow
        );
        assert!(!is_overdue(TimeHorizon::Tomorrow, false, created_at, touched, &now()));
    }

    #[test]
    fn creation_after_now_is_not_overdue() {
        assert!(!is_overdue(
            TimeHorizon::Today,
            false,
            utc("2026-02-03T15:00:00Z"),
            utc("2026-02-03T15:00:00Z"),
            &now()
        ));
    }
}
