//! Tiered contact resolution across the two CRM API generations.
//!
//! Tiers run in strict order and stop at the first one that yields a
//! social-profile URL:
//!
//! 1. primary API: person record, then list-entry fields
//! 2. legacy API: search by email, person record, custom field values
//! 3. fallback: a synthesized search link
//!
//! Name, company and role come from whichever CRM call answered first,
//! independent of which tier produced the link. Recent notes come from the
//! primary API when it knows the person. Tier errors never escape
//! [`ContactResolver::resolve`]; they only downgrade the tier.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use url::Url;

use morningbrief_crm::{LegacyCrm, PrimaryCrm, SocialMatcher, legacy_social_url};
use morningbrief_shared::{
    Attendee, BriefError, ContactProfile, CrmConfig, ResolutionTier, Result, RetryPolicy,
    normalize_email, with_backoff,
};

use crate::cache::ContactStore;

const PRIMARY_SCOPE: &str = "primary";
const LEGACY_SCOPE: &str = "legacy";

/// Outcome of one resolution tier.
#[derive(Debug)]
enum TierOutcome<T> {
    Found(T),
    NotFound,
    Failed(BriefError),
}

impl<T> TierOutcome<T> {
    fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::Failed(_) => "failed",
        }
    }
}

/// Classify a lookup result: absent and `NotFound` errors are both "not found".
fn lookup<T>(result: Result<Option<T>>) -> TierOutcome<T> {
    match result {
        Ok(Some(value)) => TierOutcome::Found(value),
        Ok(None) | Err(BriefError::NotFound(_)) => TierOutcome::NotFound,
        Err(e) => TierOutcome::Failed(e),
    }
}

/// Identity fields gathered along the tier chain; first writer wins.
#[derive(Debug, Default)]
struct Identity {
    name: Option<String>,
    company: Option<String>,
    role: Option<String>,
    recent_context: Vec<String>,
}

impl Identity {
    fn fill(&mut self, name: Option<String>, company: Option<String>, role: Option<String>) {
        self.name = self.name.take().or(name);
        self.company = self.company.take().or(company);
        self.role = self.role.take().or(role);
    }
}

/// A resolved profile and the tier observed for this particular lookup.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub profile: ContactProfile,
    /// [`ResolutionTier::CacheHit`] when served from the store, otherwise the
    /// profile's own tier.
    pub observed_tier: ResolutionTier,
}

/// Resolves attendee emails to [`ContactProfile`]s.
pub struct ContactResolver {
    primary: Arc<dyn PrimaryCrm>,
    legacy: Arc<dyn LegacyCrm>,
    store: Arc<dyn ContactStore>,
    matcher: SocialMatcher,
    retry: RetryPolicy,
    fallback_search: Url,
    recent_notes: usize,
}

impl ContactResolver {
    pub fn new(
        primary: Arc<dyn PrimaryCrm>,
        legacy: Arc<dyn LegacyCrm>,
        store: Arc<dyn ContactStore>,
        config: &CrmConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let fallback_search = Url::parse(&config.fallback_search_url).map_err(|e| {
            BriefError::config(format!(
                "invalid fallback_search_url {:?}: {e}",
                config.fallback_search_url
            ))
        })?;

        Ok(Self {
            primary,
            legacy,
            store,
            matcher: SocialMatcher::new(&config.social_domains),
            retry,
            fallback_search,
            recent_notes: config.recent_notes,
        })
    }

    /// Resolve one attendee.
    ///
    /// Only a malformed email is an error. Concurrent calls for the same
    /// email wait on the store's key lock and are then served from the store.
    #[instrument(skip_all, fields(email = %attendee.email))]
    pub async fn resolve(&self, attendee: &Attendee) -> Result<Resolution> {
        let email = normalize_email(&attendee.email)?;

        if let Some(profile) = self.store.get(&email) {
            return Ok(cache_hit(profile));
        }

        let lock = self.store.key_lock(&email);
        let _guard = lock.lock().await;

        if let Some(profile) = self.store.get(&email) {
            debug!("resolved by a concurrent lookup");
            return Ok(cache_hit(profile));
        }

        let profile = self.resolve_uncached(&email, attendee).await;
        debug!(tier = %profile.resolution_tier, "contact resolved");
        self.store.put(&email, profile.clone());

        Ok(Resolution {
            observed_tier: profile.resolution_tier,
            profile,
        })
    }

    async fn resolve_uncached(&self, email: &str, attendee: &Attendee) -> ContactProfile {
        let mut identity = Identity::default();

        let primary = self.primary_tier(email, &mut identity).await;
        let (social_url, tier) = match primary {
            TierOutcome::Found(url) => (url, ResolutionTier::PrimaryApi),
            other => {
                log_tier(PRIMARY_SCOPE, &other);
                let legacy = self.legacy_tier(email, &mut identity).await;
                match legacy {
                    TierOutcome::Found(url) => (url, ResolutionTier::LegacyRemap),
                    other => {
                        log_tier(LEGACY_SCOPE, &other);
                        let name = identity
                            .name
                            .clone()
                            .unwrap_or_else(|| attendee.fallback_name());
                        (
                            self.fallback_link(&name, identity.company.as_deref()),
                            ResolutionTier::FallbackLink,
                        )
                    }
                }
            }
        };

        ContactProfile {
            email: email.to_string(),
            display_name: identity.name.unwrap_or_else(|| attendee.fallback_name()),
            company: identity.company,
            role: identity.role,
            social_url: Some(social_url),
            resolution_tier: tier,
            recent_context: identity.recent_context,
        }
    }

    // -----------------------------------------------------------------------
    // Tier 1: primary API
    // -----------------------------------------------------------------------

    async fn primary_tier(&self, email: &str, identity: &mut Identity) -> TierOutcome<String> {
        let person = match lookup(
            with_backoff(&self.retry, "primary person lookup", || {
                self.primary.find_person(email)
            })
            .await,
        ) {
            TierOutcome::Found(person) => person,
            TierOutcome::NotFound => return TierOutcome::NotFound,
            TierOutcome::Failed(e) => return TierOutcome::Failed(e),
        };

        identity.fill(person.full_name(), person.company(), person.job_title.clone());
        identity.recent_context = self.person_notes(person.id).await;

        let known = self.field_ids(PRIMARY_SCOPE).await;
        if let Some(found) = self.matcher.find(&person.fields, &known) {
            self.remember_field(PRIMARY_SCOPE, &found.field_id);
            return TierOutcome::Found(found.url);
        }

        let entry_fields = match with_backoff(&self.retry, "primary list entries", || {
            self.primary.list_entry_fields(person.id)
        })
        .await
        {
            Ok(fields) => fields,
            Err(BriefError::NotFound(_)) => return TierOutcome::NotFound,
            Err(e) => return TierOutcome::Failed(e),
        };

        match self.matcher.find(&entry_fields, &known) {
            Some(found) => {
                self.remember_field(PRIMARY_SCOPE, &found.field_id);
                TierOutcome::Found(found.url)
            }
            None => TierOutcome::NotFound,
        }
    }

    /// Recent note excerpts; empty when disabled or unavailable.
    async fn person_notes(&self, person_id: i64) -> Vec<String> {
        if self.recent_notes == 0 {
            return Vec::new();
        }
        match with_backoff(&self.retry, "primary person notes", || {
            self.primary.person_notes(person_id, self.recent_notes)
        })
        .await
        {
            Ok(notes) => notes,
            Err(e) => {
                debug!(person_id, error = %e, "person notes unavailable");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tier 2: legacy API
    // -----------------------------------------------------------------------

    async fn legacy_tier(&self, email: &str, identity: &mut Identity) -> TierOutcome<String> {
        let legacy_id = match self.store.legacy_id(email) {
            Some(id) => id,
            None => {
                let search = with_backoff(&self.retry, "legacy person search", || {
                    self.legacy.search_person(email)
                })
                .await;
                match lookup(search) {
                    TierOutcome::Found(id) => {
                        self.store.put_legacy_id(email, id);
                        id
                    }
                    TierOutcome::NotFound => return TierOutcome::NotFound,
                    TierOutcome::Failed(e) => return TierOutcome::Failed(e),
                }
            }
        };

        let person = match lookup(
            with_backoff(&self.retry, "legacy person fetch", || {
                self.legacy.get_person(legacy_id)
            })
            .await,
        ) {
            TierOutcome::Found(person) => person,
            TierOutcome::NotFound => return TierOutcome::NotFound,
            TierOutcome::Failed(e) => return TierOutcome::Failed(e),
        };

        identity.fill(person.full_name(), None, None);

        if let Some(url) = legacy_social_url(&person) {
            return TierOutcome::Found(url);
        }

        let values = match with_backoff(&self.retry, "legacy field values", || {
            self.legacy.field_values(legacy_id)
        })
        .await
        {
            Ok(values) => values,
            Err(BriefError::NotFound(_)) => return TierOutcome::NotFound,
            Err(e) => return TierOutcome::Failed(e),
        };

        let known = self.field_ids(LEGACY_SCOPE).await;
        match self.matcher.find(&values, &known) {
            Some(found) => {
                self.remember_field(LEGACY_SCOPE, &found.field_id);
                TierOutcome::Found(found.url)
            }
            None => TierOutcome::NotFound,
        }
    }

    // -----------------------------------------------------------------------
    // Tier 3: fallback link
    // -----------------------------------------------------------------------

    /// Deterministic search link seeded with name, company and "LinkedIn".
    fn fallback_link(&self, name: &str, company: Option<&str>) -> String {
        let terms: Vec<&str> = [Some(name), company, Some("LinkedIn")]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let mut url = self.fallback_search.clone();
        url.query_pairs_mut().append_pair("q", &terms.join(" "));
        url.to_string()
    }

    // -----------------------------------------------------------------------
    // Field-schema discovery
    // -----------------------------------------------------------------------

    /// Social-profile field ids for a CRM scope, discovered once per run.
    async fn field_ids(&self, scope: &str) -> Vec<String> {
        if let Some(ids) = self.store.field_mapping(scope) {
            return ids;
        }

        let lock = self.store.key_lock(&format!("field-schema:{scope}"));
        let _guard = lock.lock().await;
        if let Some(ids) = self.store.field_mapping(scope) {
            return ids;
        }

        let schema = if scope == PRIMARY_SCOPE {
            with_backoff(&self.retry, "primary field schema", || self.primary.field_schema()).await
        } else {
            with_backoff(&self.retry, "legacy field schema", || self.legacy.field_schema()).await
        };

        match schema {
            Ok(schema) => {
                let ids = self.matcher.schema_ids(&schema);
                debug!(scope, fields = schema.len(), social = ids.len(), "field schema discovered");
                self.store.put_field_mapping(scope, ids.clone());
                ids
            }
            Err(e) => {
                debug!(scope, error = %e, "field schema unavailable, matching by name and value");
                Vec::new()
            }
        }
    }

    /// Record a field id that turned out to hold a social URL.
    fn remember_field(&self, scope: &str, field_id: &str) {
        let mut ids = self.store.field_mapping(scope).unwrap_or_default();
        if !ids.iter().any(|id| id == field_id) {
            ids.push(field_id.to_string());
            self.store.put_field_mapping(scope, ids);
        }
    }
}

fn cache_hit(profile: ContactProfile) -> Resolution {
    Resolution {
        profile,
        observed_tier: ResolutionTier::CacheHit,
    }
}

fn log_tier(scope: &str, outcome: &TierOutcome<String>) {
    match outcome {
        TierOutcome::Failed(e) => {
            warn!(tier = scope, error = %e, "resolution tier failed, downgrading")
        }
        other => debug!(tier = scope, outcome = other.label(), "no social profile from tier"),
    }
}
