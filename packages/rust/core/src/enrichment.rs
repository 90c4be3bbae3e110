//! Per-meeting attendee enrichment.
//!
//! Every attendee is resolved and then searched for news in its own task.
//! One semaphore bounds concurrent attendee work across the whole run, each
//! attendee has its own timeout, and the run deadline cuts off whatever has
//! not finished. Bundles are always returned in attendee order, and an
//! attendee that could not be enriched still gets a `failed` bundle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, instrument, warn};

use morningbrief_news::NewsGatherer;
use morningbrief_shared::{
    Attendee, BundleStatus, CalendarEvent, ContactProfile, EnrichmentBundle, MeetingContext,
    NewsItem, PipelineSettings, ResolutionTier,
};

use crate::resolver::{ContactResolver, Resolution};

/// Note attached to attendees cut off by the run deadline.
pub const DEADLINE_NOTE: &str = "run deadline reached before enrichment finished";

/// Knobs for the coordinator, taken from [`PipelineSettings`].
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub concurrency: usize,
    pub attendee_timeout: Duration,
    pub news_window_days: u32,
}

impl From<&PipelineSettings> for EnrichmentConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            concurrency: settings.concurrency.max(1),
            attendee_timeout: settings.attendee_timeout,
            news_window_days: settings.news_window_days,
        }
    }
}

/// Fans out attendee enrichment under a shared concurrency bound.
pub struct EnrichmentCoordinator {
    resolver: Arc<ContactResolver>,
    news: Arc<NewsGatherer>,
    semaphore: Arc<Semaphore>,
    config: EnrichmentConfig,
}

impl EnrichmentCoordinator {
    pub fn new(resolver: Arc<ContactResolver>, news: Arc<NewsGatherer>, config: EnrichmentConfig) -> Self {
        Self {
            resolver,
            news,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            config,
        }
    }

    /// Enrich every attendee of `event`, giving up on stragglers at `deadline`.
    ///
    /// Tasks still running at the deadline are detached, not aborted: they
    /// finish their current call and stop at the next deadline check.
    #[instrument(skip_all, fields(event_id = %event.id, attendees = event.attendees.len()))]
    pub async fn enrich(&self, event: &CalendarEvent, deadline: Instant) -> MeetingContext {
        let mut handles = Vec::with_capacity(event.attendees.len());

        for attendee in &event.attendees {
            let resolver = self.resolver.clone();
            let news = self.news.clone();
            let sem = self.semaphore.clone();
            let config = self.config.clone();
            let task_attendee = attendee.clone();

            let handle = tokio::spawn(async move {
                let _permit = match timeout_at(deadline, sem.acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    Ok(Err(_)) => {
                        return EnrichmentBundle::failed(task_attendee, "enrichment pool closed");
                    }
                    Err(_) => return EnrichmentBundle::failed(task_attendee, DEADLINE_NOTE),
                };

                let outcome = timeout(
                    config.attendee_timeout,
                    enrich_attendee(&resolver, &news, &task_attendee, &config, deadline),
                )
                .await;
                match outcome {
                    Ok(bundle) => bundle,
                    Err(_) => {
                        warn!(email = %task_attendee.email, "attendee enrichment timed out");
                        EnrichmentBundle::failed(
                            task_attendee,
                            format!(
                                "enrichment timed out after {}ms",
                                config.attendee_timeout.as_millis()
                            ),
                        )
                    }
                }
            });
            handles.push((attendee.clone(), handle));
        }

        let mut bundles = Vec::with_capacity(handles.len());
        for (attendee, handle) in handles {
            let bundle = match timeout_at(deadline, handle).await {
                Ok(Ok(bundle)) => bundle,
                Ok(Err(e)) => {
                    warn!(email = %attendee.email, error = %e, "enrichment task failed");
                    EnrichmentBundle::failed(attendee, format!("enrichment task failed: {e}"))
                }
                Err(_) => {
                    warn!(email = %attendee.email, "run deadline reached, abandoning enrichment");
                    EnrichmentBundle::failed(attendee, DEADLINE_NOTE)
                }
            };
            bundles.push(bundle);
        }

        let complete = bundles
            .iter()
            .filter(|b| b.status == BundleStatus::Complete)
            .count();
        info!(complete, total = bundles.len(), "meeting enriched");

        MeetingContext {
            event: event.clone(),
            bundles,
        }
    }
}

async fn enrich_attendee(
    resolver: &ContactResolver,
    news: &NewsGatherer,
    attendee: &Attendee,
    config: &EnrichmentConfig,
    deadline: Instant,
) -> EnrichmentBundle {
    let resolution = match resolver.resolve(attendee).await {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!(email = %attendee.email, error = %e, "attendee resolution failed");
            return EnrichmentBundle::failed(attendee.clone(), e.to_string());
        }
    };

    if Instant::now() >= deadline {
        debug!(email = %attendee.email, "deadline reached after resolution, skipping news");
        return bundle(attendee, resolution, Vec::new(), Some(DEADLINE_NOTE.into()));
    }

    let (person, company) = news_subjects(&resolution.profile, attendee);
    let items = news
        .fetch(person.as_deref(), company.as_deref(), config.news_window_days)
        .await;

    bundle(attendee, resolution, items, None)
}

/// Search subjects for an attendee. A display name that is only the email's
/// local part is not worth a person query.
fn news_subjects(profile: &ContactProfile, attendee: &Attendee) -> (Option<String>, Option<String>) {
    let has_real_name =
        profile.company.is_some() || profile.display_name != attendee.fallback_name() || attendee.name_hint.is_some();
    let person = has_real_name.then(|| profile.display_name.clone());
    (person, profile.company.clone())
}

fn bundle(
    attendee: &Attendee,
    resolution: Resolution,
    news: Vec<NewsItem>,
    extra_note: Option<String>,
) -> EnrichmentBundle {
    let (status, mut notes) = classify(&resolution.profile, &news);
    notes.extend(extra_note);

    EnrichmentBundle {
        attendee: attendee.clone(),
        observed_tier: Some(resolution.observed_tier),
        profile: Some(resolution.profile),
        news,
        history: None,
        status,
        note: (!notes.is_empty()).then(|| notes.join("; ")),
    }
}

/// `complete` needs a primary-API profile and some news; anything less is
/// `partial`.
fn classify(profile: &ContactProfile, news: &[NewsItem]) -> (BundleStatus, Vec<String>) {
    let mut notes = Vec::new();
    if profile.resolution_tier != ResolutionTier::PrimaryApi {
        notes.push(format!("social profile via {}", profile.resolution_tier));
    }
    if news.is_empty() {
        notes.push("no recent news".to_string());
    }

    let status = if notes.is_empty() {
        BundleStatus::Complete
    } else {
        BundleStatus::Partial
    };
    (status, notes)
}
