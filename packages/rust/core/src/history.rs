//! Prior-meeting history: how often each attendee appeared on the calendar
//! in the lookback window, and when they were last seen.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use morningbrief_shared::{CalendarEvent, MeetingContext, MeetingHistory};

/// `[start of date - days, start of date)` in `timezone`. `None` when the
/// lookback is disabled.
pub fn lookback_window(date: NaiveDate, timezone: Tz, days: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if days == 0 {
        return None;
    }
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let to = timezone.from_local_datetime(&midnight).earliest()?.with_timezone(&Utc);
    Some((to - ChronoDuration::days(i64::from(days)), to))
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Meeting counts and last start time for every address in `emails`.
pub fn tally(past: &[CalendarEvent], emails: &HashSet<String>) -> HashMap<String, MeetingHistory> {
    let mut history: HashMap<String, MeetingHistory> = HashMap::new();
    for event in past {
        for attendee in &event.attendees {
            let email = key(&attendee.email);
            if !emails.contains(&email) {
                continue;
            }
            history
                .entry(email)
                .and_modify(|h| {
                    h.meetings += 1;
                    h.last_met = h.last_met.max(event.start);
                })
                .or_insert(MeetingHistory {
                    meetings: 1,
                    last_met: event.start,
                });
        }
    }
    history
}

/// Addresses whose history is worth looking up.
pub fn attendee_emails(events: &[CalendarEvent]) -> HashSet<String> {
    events
        .iter()
        .flat_map(|e| e.attendees.iter())
        .map(|a| key(&a.email))
        .filter(|e| !e.is_empty())
        .collect()
}

/// Copy history onto every matching bundle.
pub fn attach(contexts: &mut [MeetingContext], history: &HashMap<String, MeetingHistory>) {
    for bundle in contexts.iter_mut().flat_map(|c| c.bundles.iter_mut()) {
        bundle.history = history.get(&key(&bundle.attendee.email)).copied();
    }
}
