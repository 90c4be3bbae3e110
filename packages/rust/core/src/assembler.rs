//! Brief assembler.
//!
//! Merges enriched meetings and their narratives into a [`BriefDocument`].
//! Sections keep calendar order and are never dropped; each one degrades
//! independently: full narrative, then the template fallback, then the raw
//! event title.

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use morningbrief_shared::{
    AttendeeSummary, BriefDocument, BriefId, BriefSection, BundleStatus, EnrichmentBundle,
    MeetingContext, NarrativeKind,
};

use crate::summarizer::fallback_narrative;

/// What the summarization step produced for one meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    /// Text from the summarizer.
    Summarized(String),
    /// No summary; the reason becomes a degradation marker.
    Unavailable(String),
}

/// Build the document. `narratives[i]` belongs to `contexts[i]`; a missing
/// entry counts as unavailable.
#[instrument(skip_all, fields(%date, meetings = contexts.len()))]
pub fn assemble(date: NaiveDate, contexts: Vec<MeetingContext>, narratives: Vec<Narrative>) -> BriefDocument {
    let mut narratives = narratives.into_iter();
    let sections: Vec<BriefSection> = contexts
        .into_iter()
        .map(|ctx| {
            let narrative = narratives
                .next()
                .unwrap_or_else(|| Narrative::Unavailable("no summary produced".into()));
            build_section(ctx, narrative)
        })
        .collect();

    let complete = sections.iter().all(BriefSection::is_complete);
    let degraded = sections.iter().filter(|s| !s.is_complete()).count();
    info!(sections = sections.len(), degraded, complete, "brief assembled");

    BriefDocument {
        id: BriefId::new(),
        date,
        generated_at: Utc::now(),
        sections,
        complete,
    }
}

fn build_section(ctx: MeetingContext, narrative: Narrative) -> BriefSection {
    let mut degradations: Vec<String> = ctx.bundles.iter().filter_map(degradation_marker).collect();

    let (narrative, narrative_kind) = match narrative {
        Narrative::Summarized(text) => (text, NarrativeKind::Full),
        Narrative::Unavailable(reason) => {
            degradations.push(format!("summary unavailable ({reason})"));
            match fallback_narrative(&ctx) {
                Some(text) => (text, NarrativeKind::Template),
                None => (ctx.event.title.clone(), NarrativeKind::TitleOnly),
            }
        }
    };

    let attendees = ctx.bundles.iter().map(summarize_attendee).collect();
    let event = ctx.event;

    BriefSection {
        event_id: event.id,
        title: event.title,
        start: event.start,
        end: event.end,
        location: event.location,
        attendees,
        narrative,
        narrative_kind,
        degradations,
    }
}

fn summarize_attendee(bundle: &EnrichmentBundle) -> AttendeeSummary {
    let profile = bundle.profile.as_ref();
    AttendeeSummary {
        email: bundle.attendee.email.clone(),
        name: bundle.display_name(),
        company: profile.and_then(|p| p.company.clone()),
        role: profile.and_then(|p| p.role.clone()),
        social_url: profile.and_then(|p| p.social_url.clone()),
        resolution_tier: profile.map(|p| p.resolution_tier),
        status: bundle.status,
        headlines: bundle.news.iter().map(|n| n.headline.clone()).collect(),
        recent_context: profile.and_then(|p| p.recent_context.first().cloned()),
        history: bundle.history,
    }
}

fn degradation_marker(bundle: &EnrichmentBundle) -> Option<String> {
    let email = &bundle.attendee.email;
    let detail = bundle
        .note
        .as_deref()
        .map(|n| format!(" ({n})"))
        .unwrap_or_default();
    match bundle.status {
        BundleStatus::Complete => None,
        BundleStatus::Partial => Some(format!("partial enrichment for {email}{detail}")),
        BundleStatus::Failed => Some(format!("enrichment unavailable for {email}{detail}")),
    }
}
