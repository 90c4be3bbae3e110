//! Core domain types for the morning brief pipeline.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BriefError, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Normalize an attendee identity: trimmed, lowercased, validated.
///
/// A malformed address is a [`BriefError::Config`], the one resolution error
/// that fails an attendee outright.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(BriefError::config(format!("malformed attendee email: {raw:?}")))
    }
}

// ---------------------------------------------------------------------------
// BriefId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for brief identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BriefId(pub Uuid);

impl BriefId {
    /// Generate a new time-sortable brief identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BriefId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BriefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BriefId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

/// A meeting participant as listed on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Identity as given by the calendar (normalized during resolution).
    pub email: String,
    /// Display name from the calendar entry, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_hint: Option<String>,
}

impl Attendee {
    pub fn new(email: impl Into<String>, name_hint: Option<String>) -> Self {
        Self {
            email: email.into(),
            name_hint,
        }
    }

    /// Shared internal mailboxes ("Internal Team", internal-ops@...) rather
    /// than people.
    pub fn is_internal_alias(&self) -> bool {
        let name = self.name_hint.as_deref().unwrap_or_default().trim().to_lowercase();
        let local = self
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        name.starts_with("internal") || local.starts_with("internal")
    }

    /// Best display name available without any lookup.
    pub fn fallback_name(&self) -> String {
        match self.name_hint.as_deref().map(str::trim) {
            Some(hint) if !hint.is_empty() => hint.to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or(&self.email)
                .trim()
                .to_string(),
        }
    }
}

/// One calendar event. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Attendees in calendar order, unique by email.
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

/// Which resolution stage produced a profile's social-profile data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// Newer CRM API had the person and a social field.
    PrimaryApi,
    /// Legacy CRM API supplied the social field. Lower confidence: the
    /// email-based legacy search can match the wrong record.
    LegacyRemap,
    /// Served from the run cache without external calls.
    CacheHit,
    /// Neither CRM had a social field; a search link was synthesized.
    FallbackLink,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryApi => "primary_api",
            Self::LegacyRemap => "legacy_remap",
            Self::CacheHit => "cache_hit",
            Self::FallbackLink => "fallback_link",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved contact. Stored in the run cache and never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    /// Normalized email.
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_url: Option<String>,
    /// Stage that produced `social_url`. Never [`ResolutionTier::CacheHit`]
    /// for a stored profile.
    pub resolution_tier: ResolutionTier,
    /// Excerpts of recent CRM notes, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_context: Vec<String>,
}

/// Prior meetings with one attendee inside the history lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingHistory {
    pub meetings: u32,
    pub last_met: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

/// What a news item is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Company,
}

/// A recent article relevant to an attendee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Person or company name the item was found for.
    pub entity: String,
    pub entity_kind: EntityKind,
    pub relevance: f32,
}

impl NewsItem {
    /// Key used to deduplicate items within one attendee's bundle:
    /// normalized headline plus normalized source.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            normalize_text(&self.headline),
            normalize_text(&self.source)
        )
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_text(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// Per-attendee enrichment completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Complete,
    Partial,
    Failed,
}

impl BundleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Everything gathered for one attendee of one meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentBundle {
    /// Raw calendar identity, always present even when enrichment failed.
    pub attendee: Attendee,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ContactProfile>,
    /// Tier observed for this lookup; `cache_hit` when the profile came from
    /// the run cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_tier: Option<ResolutionTier>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<MeetingHistory>,
    pub status: BundleStatus,
    /// Why the bundle is not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EnrichmentBundle {
    /// A bundle for an attendee whose enrichment could not run or finish.
    pub fn failed(attendee: Attendee, reason: impl Into<String>) -> Self {
        Self {
            attendee,
            profile: None,
            observed_tier: None,
            news: Vec::new(),
            history: None,
            status: BundleStatus::Failed,
            note: Some(reason.into()),
        }
    }

    /// Name to show for this attendee.
    pub fn display_name(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| self.attendee.fallback_name())
    }
}

/// One meeting with the enrichment of all its attendees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingContext {
    pub event: CalendarEvent,
    /// Bundles in attendee order.
    pub bundles: Vec<EnrichmentBundle>,
}

// ---------------------------------------------------------------------------
// Brief document
// ---------------------------------------------------------------------------

/// How a section's narrative was produced, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    /// Written by the summarization service.
    Full,
    /// Deterministic template over the enrichment bundles.
    Template,
    /// Nothing usable beyond the event title.
    TitleOnly,
}

/// One attendee line of a brief section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendeeSummary {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_tier: Option<ResolutionTier>,
    pub status: BundleStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headlines: Vec<String>,
    /// Most recent CRM note excerpt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<MeetingHistory>,
}

/// One meeting's rendered output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefSection {
    pub event_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub attendees: Vec<AttendeeSummary>,
    pub narrative: String,
    pub narrative_kind: NarrativeKind,
    /// Explicit markers such as "enrichment unavailable for b@y.com".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<String>,
}

impl BriefSection {
    /// Fully enriched and summarized.
    pub fn is_complete(&self) -> bool {
        self.narrative_kind == NarrativeKind::Full
            && self
                .attendees
                .iter()
                .all(|a| a.status == BundleStatus::Complete)
    }
}

/// The day's brief: sections in calendar order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefDocument {
    pub id: BriefId,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<BriefSection>,
    /// True only if every section is fully enriched and summarized.
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brief_id_roundtrip() {
        let id = BriefId::new();
        let s = id.to_string();
        let parsed: BriefId = s.parse().expect("parse BriefId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@X.com ").unwrap(), "alice@x.com");
    }

    #[test]
    fn normalize_email_rejects_malformed() {
        for raw in ["", "no-at-sign", "a@b", "two words@x.com", "@x.com"] {
            let err = normalize_email(raw).unwrap_err();
            assert!(matches!(err, BriefError::Config { .. }), "{raw}");
        }
    }

    #[test]
    fn attendee_fallback_name() {
        let a = Attendee::new("jane.doe@x.com", Some("  Jane Doe ".into()));
        assert_eq!(a.fallback_name(), "Jane Doe");

        let b = Attendee::new("jane.doe@x.com", Some("   ".into()));
        assert_eq!(b.fallback_name(), "jane.doe");

        let c = Attendee::new("bob@y.com", None);
        assert_eq!(c.fallback_name(), "bob");
    }

    #[test]
    fn news_dedup_key_ignores_case_and_punctuation() {
        let item = |headline: &str, source: &str| NewsItem {
            headline: headline.into(),
            source: source.into(),
            url: None,
            published_at: Utc::now(),
            entity: "X Corp".into(),
            entity_kind: EntityKind::Company,
            relevance: 1.0,
        };
        assert_eq!(
            item("X Corp raises $10M!", "Reuters").dedup_key(),
            item("x corp  raises 10M", "reuters").dedup_key()
        );
        assert_ne!(
            item("X Corp raises", "Reuters").dedup_key(),
            item("X Corp raises", "Bloomberg").dedup_key()
        );
    }

    #[test]
    fn dedup_key_lowercases_non_ascii() {
        let item = |headline: &str| NewsItem {
            headline: headline.into(),
            source: "Le Monde".into(),
            url: None,
            published_at: Utc::now(),
            entity: "Élan".into(),
            entity_kind: EntityKind::Company,
            relevance: 1.0,
        };
        assert_eq!(
            item("ÉLAN LÈVE 10M").dedup_key(),
            item("élan lève 10M").dedup_key()
        );
        assert_eq!(normalize_text("Straße ÖL"), "straße öl");
    }

    #[test]
    fn internal_aliases_are_detected() {
        assert!(Attendee::new("internal-ops@corp.com", None).is_internal_alias());
        assert!(Attendee::new("team@corp.com", Some(" Internal Team".into())).is_internal_alias());
        assert!(!Attendee::new("intern.ada@corp.com", Some("Ada".into())).is_internal_alias());
        assert!(!Attendee::new("a@x.com", None).is_internal_alias());
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&ResolutionTier::LegacyRemap).unwrap();
        assert_eq!(json, r#""legacy_remap""#);
        assert_eq!(ResolutionTier::FallbackLink.to_string(), "fallback_link");
    }

    #[test]
    fn failed_bundle_keeps_identity() {
        let bundle =
            EnrichmentBundle::failed(Attendee::new("b@y.com", None), "deadline exceeded");
        assert_eq!(bundle.status, BundleStatus::Failed);
        assert_eq!(bundle.attendee.email, "b@y.com");
        assert_eq!(bundle.display_name(), "b");
        assert!(bundle.profile.is_none());
    }

    #[test]
    fn document_serialization() {
        let doc = BriefDocument {
            id: BriefId::new(),
            date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            generated_at: Utc::now(),
            sections: vec![],
            complete: true,
        };
        let json = serde_json::to_string_pretty(&doc).expect("serialize");
        let parsed: BriefDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.date, doc.date);
        assert!(parsed.complete);
    }
}
