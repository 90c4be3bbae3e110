//! End-to-end brief pipeline: calendar → enrichment → summaries → assembly.
//!
//! The run moves strictly forward through [`PipelineState`]. One deadline
//! governs the whole run; enrichment stops early enough to leave
//! `assembly_reserve` for summaries and assembly. Only a calendar failure or
//! an invalid global setting aborts; everything else degrades a section.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Serialize;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, instrument, warn};

use morningbrief_shared::{
    BriefDocument, BriefError, BundleStatus, CalendarEvent, MAX_RUN_DEADLINE, MeetingContext,
    MeetingHistory, PipelineSettings, Result,
};

use crate::assembler::{self, Narrative};
use crate::calendar::CalendarEventSource;
use crate::enrichment::EnrichmentCoordinator;
use crate::history;
use crate::summarizer::Summarizer;

/// Pipeline phases, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Fetching,
    Enriching,
    Summarizing,
    Assembling,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Fetching => "Fetching calendar",
            Self::Enriching => "Enriching attendees",
            Self::Summarizing => "Summarizing meetings",
            Self::Assembling => "Assembling brief",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Forward-only record of the states a run went through.
#[derive(Debug, Clone)]
struct StateTrail {
    states: Vec<PipelineState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![PipelineState::Fetching],
        }
    }

    fn current(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Fetching)
    }

    fn advance(&mut self, next: PipelineState, progress: &dyn ProgressReporter) {
        let current = self.current();
        if current.is_terminal() || next <= current {
            warn!(?current, ?next, "ignoring backward pipeline transition");
            return;
        }
        debug!(?current, ?next, "pipeline transition");
        self.states.push(next);
        progress.phase(next.label());
    }
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub document: BriefDocument,
    pub elapsed: Duration,
    /// States visited, in order.
    pub states: Vec<PipelineState>,
    pub attendees: AttendeeCounts,
}

/// Bundle statuses across the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendeeCounts {
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
}

impl AttendeeCounts {
    fn tally(contexts: &[MeetingContext]) -> Self {
        let mut counts = Self::default();
        for bundle in contexts.iter().flat_map(|c| c.bundles.iter()) {
            match bundle.status {
                BundleStatus::Complete => counts.complete += 1,
                BundleStatus::Partial => counts.partial += 1,
                BundleStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.complete + self.partial + self.failed
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when all attendees of a meeting are settled.
    fn meeting_enriched(&self, title: &str, current: usize, total: usize);
    /// Called when a meeting's narrative is settled.
    fn meeting_summarized(&self, title: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn meeting_enriched(&self, _title: &str, _current: usize, _total: usize) {}
    fn meeting_summarized(&self, _title: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Drives one brief run.
pub struct PipelineOrchestrator {
    calendar: Arc<dyn CalendarEventSource>,
    coordinator: Arc<EnrichmentCoordinator>,
    summarizer: Option<Arc<dyn Summarizer>>,
    settings: PipelineSettings,
    timezone: Tz,
}

impl PipelineOrchestrator {
    /// Fails with [`BriefError::Config`] if the configured timezone is unknown.
    pub fn new(
        calendar: Arc<dyn CalendarEventSource>,
        coordinator: Arc<EnrichmentCoordinator>,
        summarizer: Option<Arc<dyn Summarizer>>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let timezone = parse_timezone(&settings.timezone)?;
        Ok(Self {
            calendar,
            coordinator,
            summarizer,
            settings,
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Run the pipeline for `date`.
    ///
    /// Errors only when the calendar cannot be read; every other failure is
    /// folded into the document as a degraded section.
    #[instrument(skip_all, fields(%date, timezone = %self.timezone))]
    pub async fn run(&self, date: NaiveDate, progress: &dyn ProgressReporter) -> Result<RunReport> {
        let started = Instant::now();
        let budget = self.settings.deadline.min(MAX_RUN_DEADLINE);
        let deadline = started.checked_add(budget).unwrap_or(started);
        let reserve = self.settings.assembly_reserve.min(budget);
        let enrichment_cutoff = deadline - reserve;

        let mut trail = StateTrail::new();
        progress.phase(PipelineState::Fetching.label());
        info!(deadline_ms = budget.as_millis() as u64, "starting brief run");

        // --- Fetching ---
        let events = match self.calendar.list_events(date, self.timezone).await {
            Ok(events) => events,
            Err(e) => {
                trail.advance(PipelineState::Aborted, progress);
                error!(error = %e, "calendar unavailable, aborting run");
                return Err(match e {
                    BriefError::CalendarUnavailable(_) => e,
                    other => BriefError::CalendarUnavailable(other.to_string()),
                });
            }
        };
        info!(meetings = events.len(), "calendar fetched");

        // --- Enriching ---
        trail.advance(PipelineState::Enriching, progress);
        let total = events.len();
        let enriched = std::sync::atomic::AtomicUsize::new(0);
        let enrichment = join_all(events.iter().map(|event| {
            let enriched = &enriched;
            async move {
                let ctx = self.coordinator.enrich(event, enrichment_cutoff).await;
                let n = enriched.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                progress.meeting_enriched(&event.title, n, total);
                ctx
            }
        }));
        let (mut contexts, past) = tokio::join!(
            enrichment,
            self.meeting_history(date, &events, enrichment_cutoff)
        );
        history::attach(&mut contexts, &past);
        let attendees = AttendeeCounts::tally(&contexts);
        info!(
            complete = attendees.complete,
            partial = attendees.partial,
            failed = attendees.failed,
            "enrichment finished"
        );

        // --- Summarizing ---
        trail.advance(PipelineState::Summarizing, progress);
        let summarized = std::sync::atomic::AtomicUsize::new(0);
        let narratives: Vec<Narrative> = join_all(contexts.iter().map(|ctx| {
            let summarized = &summarized;
            async move {
                let narrative = self.narrate(ctx, deadline).await;
                let n = summarized.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                progress.meeting_summarized(&ctx.event.title, n, total);
                narrative
            }
        }))
        .await;

        // --- Assembling ---
        trail.advance(PipelineState::Assembling, progress);
        let document = assembler::assemble(date, contexts, narratives);

        trail.advance(PipelineState::Done, progress);
        let report = RunReport {
            document,
            elapsed: started.elapsed(),
            states: trail.states,
            attendees,
        };
        info!(
            brief_id = %report.document.id,
            sections = report.document.sections.len(),
            complete = report.document.complete,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "brief run complete"
        );
        progress.done(&report);
        Ok(report)
    }

    /// Prior meetings for today's attendees. Optional context: any failure
    /// yields an empty map.
    async fn meeting_history(
        &self,
        date: NaiveDate,
        events: &[CalendarEvent],
        cutoff: Instant,
    ) -> HashMap<String, MeetingHistory> {
        let Some((from, to)) = history::lookback_window(date, self.timezone, self.settings.history_days)
        else {
            return HashMap::new();
        };
        let emails = history::attendee_emails(events);
        if emails.is_empty() {
            return HashMap::new();
        }

        match timeout_at(cutoff, self.calendar.list_events_between(from, to, self.timezone)).await {
            Ok(Ok(past)) => {
                let found = history::tally(&past, &emails);
                debug!(past_events = past.len(), known = found.len(), "meeting history loaded");
                found
            }
            Ok(Err(e)) => {
                warn!(error = %e, "meeting history unavailable");
                HashMap::new()
            }
            Err(_) => {
                warn!("meeting history timed out");
                HashMap::new()
            }
        }
    }

    /// Ask the summarizer for one meeting, bounded by the smaller of the call
    /// timeout and the time left before `deadline`.
    async fn narrate(&self, ctx: &MeetingContext, deadline: Instant) -> Narrative {
        let Some(summarizer) = &self.summarizer else {
            return Narrative::Unavailable("summarizer not configured".into());
        };
        if !ctx.bundles.iter().any(|b| b.profile.is_some()) {
            return Narrative::Unavailable("no enrichment to summarize".into());
        }

        let now = Instant::now();
        if now >= deadline {
            return Narrative::Unavailable("run deadline reached".into());
        }
        let call_deadline = now
            .checked_add(self.settings.summarizer_timeout)
            .map_or(deadline, |t| t.min(deadline));

        match timeout_at(call_deadline, summarizer.summarize(ctx)).await {
            Ok(Ok(text)) => Narrative::Summarized(text),
            Ok(Err(e)) => {
                warn!(event_id = %ctx.event.id, error = %e, "summarization failed");
                Narrative::Unavailable(e.to_string())
            }
            Err(_) => {
                warn!(event_id = %ctx.event.id, "summarization timed out");
                Narrative::Unavailable("summarization timed out".into())
            }
        }
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| BriefError::config(format!("invalid timezone '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use morningbrief_news::{GatherOptions, NewsGatherer};
    use morningbrief_shared::{CalendarEvent, CrmConfig, NarrativeKind, ResolutionTier};
    use parking_lot::Mutex;

    use crate::cache::ContactCache;
    use crate::enrichment::{DEADLINE_NOTE, EnrichmentConfig};
    use crate::resolver::ContactResolver;
    use crate::testing::{
        FakeCalendar, FakeLegacy, FakeNews, FakePrimary, FakeSummarizer, event, fast_retry,
        primary_person,
    };

    fn settings(deadline: Duration, reserve: Duration) -> PipelineSettings {
        PipelineSettings {
            concurrency: 4,
            attendee_timeout: Duration::from_secs(30),
            deadline,
            assembly_reserve: reserve,
            summarizer_timeout: Duration::from_secs(5),
            news_window_days: 30,
            timezone: "America/New_York".into(),
            history_days: 120,
        }
    }

    fn orchestrator(
        events: Option<Vec<CalendarEvent>>,
        primary: FakePrimary,
        summarizer: Option<FakeSummarizer>,
        settings: PipelineSettings,
    ) -> PipelineOrchestrator {
        let calendar = FakeCalendar {
            events,
            ..Default::default()
        };
        orchestrator_with(Arc::new(calendar), primary, summarizer, settings)
    }

    fn orchestrator_with(
        calendar: Arc<FakeCalendar>,
        primary: FakePrimary,
        summarizer: Option<FakeSummarizer>,
        settings: PipelineSettings,
    ) -> PipelineOrchestrator {
        let resolver = ContactResolver::new(
            Arc::new(primary),
            Arc::new(FakeLegacy::default()),
            Arc::new(ContactCache::new()),
            &CrmConfig::default(),
            fast_retry(),
        )
        .unwrap();
        let news = NewsGatherer::new(
            Arc::new(FakeNews {
                companies: vec![("X Corp".into(), 2)],
                ..Default::default()
            }),
            fast_retry(),
            GatherOptions::default(),
        );
        let coordinator = EnrichmentCoordinator::new(
            Arc::new(resolver),
            Arc::new(news),
            EnrichmentConfig::from(&settings),
        );
        PipelineOrchestrator::new(
            calendar,
            Arc::new(coordinator),
            summarizer.map(|s| Arc::new(s) as Arc<dyn Summarizer>),
            settings,
        )
        .unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn known_a() -> FakePrimary {
        FakePrimary {
            people: vec![("a@x.com".into(), primary_person(1, "A", "X Corp", Some("linkedin.com/a")))],
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        enriched: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().push(name.to_string());
        }
        fn meeting_enriched(&self, title: &str, _current: usize, _total: usize) {
            self.enriched.lock().push(title.to_string());
        }
        fn meeting_summarized(&self, _title: &str, _current: usize, _total: usize) {}
        fn done(&self, _report: &RunReport) {}
    }

    #[tokio::test]
    async fn nine_o_clock_sync() {
        let pipeline = orchestrator(
            Some(vec![event("e1", "9:00 Sync", "2026-10-17T13:00:00Z", &["a@x.com", "b@y.com"])]),
            known_a(),
            Some(FakeSummarizer::replying("Brief")),
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );
        let progress = RecordingProgress::default();

        let report = pipeline.run(date(), &progress).await.unwrap();
        let doc = &report.document;

        assert_eq!(doc.sections.len(), 1);
        let section = &doc.sections[0];
        assert_eq!(section.title, "9:00 Sync");
        assert_eq!(section.narrative, "Brief: 9:00 Sync");
        assert_eq!(section.narrative_kind, NarrativeKind::Full);

        let a = &section.attendees[0];
        assert_eq!(a.email, "a@x.com");
        assert_eq!(a.company.as_deref(), Some("X Corp"));
        assert_eq!(a.social_url.as_deref(), Some("linkedin.com/a"));
        assert_eq!(a.status, BundleStatus::Complete);
        assert_eq!(a.headlines.len(), 2);

        let b = &section.attendees[1];
        assert_eq!(b.email, "b@y.com");
        assert_eq!(b.status, BundleStatus::Partial);
        assert_eq!(b.resolution_tier, Some(ResolutionTier::FallbackLink));
        assert!(b.social_url.as_deref().unwrap().contains("google.com/search"));

        assert!(!doc.complete);
        assert_eq!(
            report.attendees,
            AttendeeCounts {
                complete: 1,
                partial: 1,
                failed: 0
            }
        );
        assert_eq!(
            report.states,
            vec![
                PipelineState::Fetching,
                PipelineState::Enriching,
                PipelineState::Summarizing,
                PipelineState::Assembling,
                PipelineState::Done,
            ]
        );
        assert_eq!(progress.phases.lock().first().map(String::as_str), Some("Fetching calendar"));
        assert_eq!(*progress.enriched.lock(), vec!["9:00 Sync".to_string()]);
    }

    #[tokio::test]
    async fn prior_meetings_reach_the_brief() {
        let calendar = Arc::new(FakeCalendar {
            events: Some(vec![event("e1", "Sync", "2026-10-17T13:00:00Z", &["a@x.com", "b@y.com"])]),
            past: vec![
                event("p1", "Intro", "2026-08-03T14:00:00Z", &["a@x.com"]),
                event("p2", "Demo", "2026-09-30T15:00:00Z", &["A@x.com"]),
                // outside the 120-day window
                event("p0", "Ancient", "2026-01-05T15:00:00Z", &["a@x.com", "b@y.com"]),
            ],
            ..Default::default()
        });
        let pipeline = orchestrator_with(
            calendar.clone(),
            known_a(),
            Some(FakeSummarizer::replying("Brief")),
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        let attendees = &report.document.sections[0].attendees;

        let a = attendees[0].history.expect("history for a@x.com");
        assert_eq!(a.meetings, 2);
        assert_eq!(a.last_met, "2026-09-30T15:00:00Z".parse::<chrono::DateTime<Utc>>().unwrap());
        assert!(attendees[1].history.is_none());
        assert_eq!(calendar.range_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn history_lookback_can_be_disabled() {
        let calendar = Arc::new(FakeCalendar {
            events: Some(vec![event("e1", "Sync", "2026-10-17T13:00:00Z", &["a@x.com"])]),
            past: vec![event("p1", "Intro", "2026-09-30T15:00:00Z", &["a@x.com"])],
            ..Default::default()
        });
        let mut settings = settings(Duration::from_secs(30), Duration::from_secs(5));
        settings.history_days = 0;
        let pipeline = orchestrator_with(calendar.clone(), known_a(), None, settings);

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        assert!(report.document.sections[0].attendees[0].history.is_none());
        assert_eq!(calendar.range_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_deadline_runs_normally() {
        let pipeline = orchestrator(
            Some(vec![event("e1", "Sync", "2026-10-17T13:00:00Z", &["a@x.com"])]),
            known_a(),
            Some(FakeSummarizer::replying("Brief")),
            settings(Duration::from_secs(u64::MAX), Duration::from_millis(500)),
        );

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();

        assert!(report.document.complete);
        assert_eq!(report.document.sections.len(), 1);
        assert_eq!(report.states.last(), Some(&PipelineState::Done));
    }

    #[tokio::test]
    async fn short_deadline_still_yields_a_document() {
        let primary = FakePrimary {
            slow: vec![("slow@x.com".into(), Duration::from_secs(20))],
            ..known_a()
        };
        let pipeline = orchestrator(
            Some(vec![event("e1", "Sync", "2026-10-17T13:00:00Z", &["a@x.com", "slow@x.com"])]),
            primary,
            Some(FakeSummarizer::replying("Brief")),
            settings(Duration::from_millis(1000), Duration::from_millis(500)),
        );

        let started = Instant::now();
        let report = pipeline.run(date(), &SilentProgress).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(1000));
        let section = &report.document.sections[0];
        assert_eq!(section.attendees[0].status, BundleStatus::Complete);
        assert_eq!(section.attendees[1].status, BundleStatus::Failed);
        assert!(
            section
                .degradations
                .iter()
                .any(|d| d.contains("slow@x.com") && d.contains(DEADLINE_NOTE))
        );
        assert!(!report.document.complete);
    }

    #[tokio::test]
    async fn crm_failures_keep_every_meeting_in_order() {
        let primary = FakePrimary {
            fail_with: Some(|| BriefError::Transient("crm down".into())),
            ..Default::default()
        };
        let pipeline = orchestrator(
            Some(vec![
                event("e1", "First", "2026-10-17T13:00:00Z", &["a@x.com"]),
                event("e2", "Second", "2026-10-17T14:00:00Z", &["b@y.com", "c@z.com"]),
                event("e3", "Third", "2026-10-17T15:00:00Z", &["broken"]),
            ]),
            primary,
            Some(FakeSummarizer::replying("Brief")),
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        let titles: Vec<&str> = report.document.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);

        // failed primary lookups degrade to the fallback link
        let first = &report.document.sections[0].attendees[0];
        assert_eq!(first.resolution_tier, Some(ResolutionTier::FallbackLink));
        assert_eq!(first.status, BundleStatus::Partial);

        let third = &report.document.sections[2];
        assert_eq!(third.attendees[0].status, BundleStatus::Failed);
        assert_eq!(third.narrative_kind, NarrativeKind::TitleOnly);
        assert_eq!(third.narrative, "Third");
    }

    #[tokio::test]
    async fn calendar_failure_aborts() {
        let pipeline = orchestrator(
            None,
            known_a(),
            None,
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );
        let progress = RecordingProgress::default();

        let err = pipeline.run(date(), &progress).await.unwrap_err();
        assert!(matches!(err, BriefError::CalendarUnavailable(_)));
        assert_eq!(progress.phases.lock().last().map(String::as_str), Some("Aborted"));
    }

    #[tokio::test]
    async fn empty_calendar_is_a_complete_empty_brief() {
        let pipeline = orchestrator(
            Some(vec![]),
            known_a(),
            None,
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        assert!(report.document.sections.is_empty());
        assert!(report.document.complete);
        assert_eq!(report.states.last(), Some(&PipelineState::Done));
    }

    #[tokio::test]
    async fn summarizer_failure_falls_back_to_template() {
        let pipeline = orchestrator(
            Some(vec![event("e1", "9:00 Sync", "2026-10-17T13:00:00Z", &["a@x.com"])]),
            known_a(),
            Some(FakeSummarizer::default()),
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        let section = &report.document.sections[0];
        assert_eq!(section.narrative_kind, NarrativeKind::Template);
        assert!(section.narrative.starts_with("9:00 Sync: meeting with A"));
        assert!(
            section
                .degradations
                .iter()
                .any(|d| d.starts_with("summary unavailable"))
        );
        assert!(!report.document.complete);
    }

    #[tokio::test]
    async fn slow_summarizer_is_cut_off() {
        let mut pipeline = orchestrator(
            Some(vec![event("e1", "Sync", "2026-10-17T13:00:00Z", &["a@x.com"])]),
            known_a(),
            None,
            settings(Duration::from_secs(30), Duration::from_secs(5)),
        );
        let summarizer = Arc::new(FakeSummarizer {
            reply: Some("late".into()),
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        pipeline.summarizer = Some(summarizer.clone());
        pipeline.settings.summarizer_timeout = Duration::from_millis(50);

        let report = pipeline.run(date(), &SilentProgress).await.unwrap();
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.document.sections[0].narrative_kind, NarrativeKind::Template);
        assert!(
            report.document.sections[0]
                .degradations
                .contains(&"summary unavailable (summarization timed out)".to_string())
        );
    }

    #[test]
    fn invalid_timezone_is_a_config_error() {
        let mut s = settings(Duration::from_secs(30), Duration::from_secs(5));
        s.timezone = "Mars/Olympus".into();
        let err = parse_timezone(&s.timezone).unwrap_err();
        assert!(matches!(err, BriefError::Config { .. }));
    }

    #[test]
    fn state_trail_only_moves_forward() {
        let mut trail = StateTrail::new();
        trail.advance(PipelineState::Summarizing, &SilentProgress);
        trail.advance(PipelineState::Enriching, &SilentProgress);
        trail.advance(PipelineState::Done, &SilentProgress);
        trail.advance(PipelineState::Aborted, &SilentProgress);
        assert_eq!(
            trail.states,
            vec![PipelineState::Fetching, PipelineState::Summarizing, PipelineState::Done]
        );
    }
}
