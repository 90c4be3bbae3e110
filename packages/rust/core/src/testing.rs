//! In-process fakes for the external seams, shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;

use morningbrief_crm::{CrmField, FieldDef, LegacyCrm, LegacyPerson, PrimaryCrm, PrimaryPerson};
use morningbrief_news::{NewsApi, NewsQuery};
use morningbrief_shared::{
    Attendee, BriefError, CalendarEvent, EntityKind, MeetingContext, NewsItem, Result, RetryPolicy,
};

use crate::calendar::CalendarEventSource;
use crate::summarizer::Summarizer;

// ---------------------------------------------------------------------------
// CRM
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakePrimary {
    pub people: Vec<(String, PrimaryPerson)>,
    pub fail_with: Option<fn() -> BriefError>,
    /// Per-email artificial latency.
    pub slow: Vec<(String, Duration)>,
    pub find_calls: AtomicUsize,
    pub schema_calls: AtomicUsize,
    /// Note excerpts per person id, newest first.
    pub notes: Vec<(i64, Vec<String>)>,
    pub notes_fail: bool,
    pub notes_calls: AtomicUsize,
}

#[async_trait]
impl PrimaryCrm for FakePrimary {
    async fn find_person(&self, email: &str) -> Result<Option<PrimaryPerson>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, delay)) = self.slow.iter().find(|(e, _)| e == email) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        Ok(self
            .people
            .iter()
            .find(|(e, _)| e == email)
            .map(|(_, p)| p.clone()))
    }

    async fn list_entry_fields(&self, _person_id: i64) -> Result<Vec<CrmField>> {
        Ok(Vec::new())
    }

    async fn field_schema(&self) -> Result<Vec<FieldDef>> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![FieldDef {
            id: "field-social".into(),
            name: "LinkedIn URL".into(),
        }])
    }

    async fn person_notes(&self, person_id: i64, limit: usize) -> Result<Vec<String>> {
        self.notes_calls.fetch_add(1, Ordering::SeqCst);
        if self.notes_fail {
            return Err(BriefError::Transient("notes unavailable".into()));
        }
        Ok(self
            .notes
            .iter()
            .find(|(id, _)| *id == person_id)
            .map(|(_, notes)| notes.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct FakeLegacy {
    pub people: Vec<(String, LegacyPerson)>,
    pub search_calls: AtomicUsize,
}

#[async_trait]
impl LegacyCrm for FakeLegacy {
    async fn search_person(&self, email: &str) -> Result<Option<i64>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .people
            .iter()
            .find(|(e, _)| e == email)
            .map(|(_, p)| p.id))
    }

    async fn get_person(&self, person_id: i64) -> Result<Option<LegacyPerson>> {
        Ok(self
            .people
            .iter()
            .find(|(_, p)| p.id == person_id)
            .map(|(_, p)| p.clone()))
    }

    async fn field_schema(&self) -> Result<Vec<FieldDef>> {
        Err(BriefError::NotFound("schema".into()))
    }

    async fn field_values(&self, _person_id: i64) -> Result<Vec<CrmField>> {
        Ok(Vec::new())
    }
}

/// A primary-API person with one organization and an optional social field.
pub(crate) fn primary_person(
    id: i64,
    first: &str,
    company: &str,
    social: Option<&str>,
) -> PrimaryPerson {
    let mut person: PrimaryPerson = serde_json::from_value(json!({
        "id": id,
        "firstName": first,
        "organizations": [{"name": company}],
    }))
    .unwrap();
    if let Some(url) = social {
        person.fields.push(CrmField {
            id: "field-social".into(),
            name: "LinkedIn URL".into(),
            value: json!({"type": "text", "data": url}),
        });
    }
    person
}

pub(crate) fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        rate_limit_delay: Duration::from_millis(1),
    }
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

/// Returns `count` fresh items for each listed company; nothing otherwise.
#[derive(Default)]
pub(crate) struct FakeNews {
    pub companies: Vec<(String, usize)>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl NewsApi for FakeNews {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.kind != EntityKind::Company {
            return Ok(Vec::new());
        }
        let count = self
            .companies
            .iter()
            .find(|(c, _)| *c == query.entity)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        Ok((0..count)
            .map(|i| NewsItem {
                headline: format!("{} headline {}", query.entity, i + 1),
                source: "Wire".into(),
                url: None,
                published_at: Utc::now() - chrono::Duration::hours(i as i64 + 1),
                entity: query.entity.clone(),
                entity_kind: EntityKind::Company,
                relevance: 1.0,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Replies with a fixed narrative, or fails when `reply` is `None`.
#[derive(Default)]
pub(crate) struct FakeSummarizer {
    pub reply: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, context: &MeetingContext) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Some(text) => Ok(format!("{text}: {}", context.event.title)),
            None => Err(BriefError::Summarization("service unavailable".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeCalendar {
    pub events: Option<Vec<CalendarEvent>>,
    /// Past events served to range queries.
    pub past: Vec<CalendarEvent>,
    pub range_calls: AtomicUsize,
}

#[async_trait]
impl CalendarEventSource for FakeCalendar {
    async fn list_events(&self, _date: NaiveDate, _timezone: Tz) -> Result<Vec<CalendarEvent>> {
        self.events
            .clone()
            .ok_or_else(|| BriefError::CalendarUnavailable("calendar offline".into()))
    }

    async fn list_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _timezone: Tz,
    ) -> Result<Vec<CalendarEvent>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        if self.events.is_none() {
            return Err(BriefError::CalendarUnavailable("calendar offline".into()));
        }
        Ok(self
            .past
            .iter()
            .filter(|e| e.start >= from && e.start < to)
            .cloned()
            .collect())
    }
}

pub(crate) fn event(id: &str, title: &str, start: &str, attendees: &[&str]) -> CalendarEvent {
    let start: DateTime<Utc> = start.parse().unwrap();
    CalendarEvent {
        id: id.into(),
        title: title.into(),
        start,
        end: start + chrono::Duration::minutes(30),
        attendees: attendees
            .iter()
            .map(|email| Attendee::new(*email, None))
            .collect(),
        location: None,
        notes: None,
    }
}
