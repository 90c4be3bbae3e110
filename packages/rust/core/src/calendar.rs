//! Calendar event source.
//!
//! The pipeline needs "today's events, in order", plus past events for the
//! prior-meeting history. The shipped source reads a calendar export (Google
//! Calendar `events.list` JSON) from disk.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use morningbrief_shared::{Attendee, BriefError, CalendarEvent, Result};

/// Title used for events without a summary.
pub const UNTITLED_MEETING: &str = "Untitled Meeting";

/// Produces the day's meetings, ordered by start time.
#[async_trait]
pub trait CalendarEventSource: Send + Sync {
    /// Any failure is reported as [`BriefError::CalendarUnavailable`].
    async fn list_events(&self, date: NaiveDate, timezone: Tz) -> Result<Vec<CalendarEvent>>;

    /// Events starting in `[from, to)`, ordered by start time.
    async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Vec<CalendarEvent>>;
}

// ---------------------------------------------------------------------------
// Export format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Wrapped { items: Vec<RawEvent> },
    List(Vec<RawEvent>),
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    status: Option<String>,
    start: RawTime,
    end: RawTime,
    #[serde(default)]
    attendees: Vec<RawAttendee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTime {
    #[serde(default)]
    date_time: Option<DateTime<chrono::FixedOffset>>,
    /// All-day events carry a bare date.
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttendee {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    /// The calendar owner's own entry.
    #[serde(default, rename = "self")]
    is_self: bool,
}

impl RawTime {
    fn to_utc(&self, timezone: Tz) -> Option<DateTime<Utc>> {
        if let Some(dt) = self.date_time {
            return Some(dt.with_timezone(&Utc));
        }
        let midnight = self.date?.and_hms_opt(0, 0, 0)?;
        timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// JsonFileCalendar
// ---------------------------------------------------------------------------

/// Reads events from an exported JSON file.
pub struct JsonFileCalendar {
    path: PathBuf,
}

impl JsonFileCalendar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            BriefError::CalendarUnavailable(format!("cannot read {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl CalendarEventSource for JsonFileCalendar {
    #[instrument(skip_all, fields(path = %self.path.display(), %date))]
    async fn list_events(&self, date: NaiveDate, timezone: Tz) -> Result<Vec<CalendarEvent>> {
        let events = parse_events(&self.read().await?, date, timezone)?;
        info!(events = events.len(), "calendar events loaded");
        Ok(events)
    }

    #[instrument(skip_all, fields(path = %self.path.display(), %from, %to))]
    async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        timezone: Tz,
    ) -> Result<Vec<CalendarEvent>> {
        let events = parse_events_between(&self.read().await?, from, to, timezone)?;
        debug!(events = events.len(), "past calendar events loaded");
        Ok(events)
    }
}

/// Parse an export and keep the meetings that start on `date` in `timezone`.
pub fn parse_events(content: &str, date: NaiveDate, timezone: Tz) -> Result<Vec<CalendarEvent>> {
    parse_filtered(content, timezone, |event| {
        event.start.with_timezone(&timezone).date_naive() == date
    })
}

/// Parse an export and keep the meetings that start in `[from, to)`.
pub fn parse_events_between(
    content: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    timezone: Tz,
) -> Result<Vec<CalendarEvent>> {
    parse_filtered(content, timezone, |event| event.start >= from && event.start < to)
}

fn parse_filtered(
    content: &str,
    timezone: Tz,
    keep: impl Fn(&CalendarEvent) -> bool,
) -> Result<Vec<CalendarEvent>> {
    let raw = match serde_json::from_str::<ExportFile>(content) {
        Ok(ExportFile::Wrapped { items }) | Ok(ExportFile::List(items)) => items,
        Err(e) => {
            return Err(BriefError::CalendarUnavailable(format!(
                "malformed calendar export: {e}"
            )));
        }
    };

    let mut events: Vec<CalendarEvent> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, event)| convert(event, index, timezone))
        .filter(|event| keep(event))
        .collect();

    events.sort_by_key(|e| e.start);
    Ok(events)
}

fn convert(raw: RawEvent, index: usize, timezone: Tz) -> Option<CalendarEvent> {
    if raw.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = raw.id.unwrap_or_else(|| format!("event-{index}"));
    let (Some(start), Some(end)) = (raw.start.to_utc(timezone), raw.end.to_utc(timezone)) else {
        warn!(%id, "event has no usable start/end, skipping");
        return None;
    };

    let mut seen = HashSet::new();
    let attendees: Vec<Attendee> = raw
        .attendees
        .into_iter()
        .filter(|a| !a.is_self)
        .filter_map(|a| {
            let email = a.email?.trim().to_string();
            (!email.is_empty() && seen.insert(email.to_lowercase()))
                .then(|| Attendee::new(email, a.display_name))
        })
        .collect();

    if attendees.is_empty() {
        debug!(%id, "no external attendees, skipping");
        return None;
    }

    let title = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNTITLED_MEETING.to_string());

    Some(CalendarEvent {
        id,
        title,
        start,
        end,
        attendees,
        location: raw.location.filter(|l| !l.trim().is_empty()),
        notes: raw.description.filter(|d| !d.trim().is_empty()),
    })
}
