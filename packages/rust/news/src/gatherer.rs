//! Per-attendee news gathering: query, merge, dedup, rank, bound.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use morningbrief_shared::{NewsConfig, NewsItem, RetryPolicy, with_backoff};

use crate::client::{NewsApi, NewsQuery};

/// Bounds applied to every fetch.
#[derive(Debug, Clone)]
pub struct GatherOptions {
    /// Items kept per attendee after merging.
    pub max_items: usize,
    /// Page size per query.
    pub per_query_limit: u32,
    /// Issue a person-name query in addition to the company query.
    pub person_queries: bool,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            max_items: 3,
            per_query_limit: 5,
            person_queries: true,
        }
    }
}

impl From<&NewsConfig> for GatherOptions {
    fn from(config: &NewsConfig) -> Self {
        Self {
            max_items: config.max_items,
            per_query_limit: config.per_query_limit.max(1),
            person_queries: config.person_queries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    person: Option<String>,
    company: Option<String>,
    window_days: u32,
}

/// Gathers a bounded, deduplicated set of recent news for one attendee.
///
/// Results are memoized per input for the lifetime of the gatherer, so a
/// repeated fetch for the same person and company returns the same items
/// without calling the API again. Concurrent fetches for the same input
/// share one round of queries. News is optional context: failures are
/// logged and contribute nothing, and a fetch with a failed query is not
/// memoized.
pub struct NewsGatherer {
    api: Option<Arc<dyn NewsApi>>,
    retry: RetryPolicy,
    options: GatherOptions,
    memo: Mutex<HashMap<MemoKey, Vec<NewsItem>>>,
    in_flight: Mutex<HashMap<MemoKey, Arc<AsyncMutex<()>>>>,
}

impl NewsGatherer {
    pub fn new(api: Arc<dyn NewsApi>, retry: RetryPolicy, options: GatherOptions) -> Self {
        Self {
            api: Some(api),
            retry,
            options,
            memo: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A gatherer that never finds news (no API key configured).
    pub fn disabled() -> Self {
        Self {
            api: None,
            retry: RetryPolicy::none(),
            options: GatherOptions::default(),
            memo: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Recent items about `person_name` and `company_name`, newest first,
    /// at most `max_items`.
    #[instrument(skip_all, fields(person = ?person_name, company = ?company_name))]
    pub async fn fetch(
        &self,
        person_name: Option<&str>,
        company_name: Option<&str>,
        window_days: u32,
    ) -> Vec<NewsItem> {
        let Some(api) = &self.api else {
            return Vec::new();
        };

        let person = clean(person_name);
        let company = clean(company_name);
        let key = MemoKey {
            person: person.map(str::to_lowercase),
            company: company.map(str::to_lowercase),
            window_days,
        };
        if let Some(items) = self.memoized(&key) {
            return items;
        }

        let key_lock = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let _guard = key_lock.lock().await;
        if let Some(items) = self.memoized(&key) {
            return items;
        }

        let to = Utc::now().date_naive();
        let from = to - ChronoDuration::days(i64::from(window_days));
        let limit = self.options.per_query_limit;

        let company_query = company.map(|c| NewsQuery::company(c, from, to, limit));
        let person_query = person
            .filter(|_| self.options.person_queries)
            .map(|p| NewsQuery::person(p, company, from, to, limit));

        if company_query.is_none() && person_query.is_none() {
            return Vec::new();
        }

        let (company_items, person_items) = tokio::join!(
            self.run_query(api.as_ref(), company_query),
            self.run_query(api.as_ref(), person_query),
        );
        let all_ok = company_items.is_some() && person_items.is_some();

        let cutoff = Utc::now() - ChronoDuration::days(i64::from(window_days));
        let items = merge(
            company_items.unwrap_or_default(),
            person_items.unwrap_or_default(),
            cutoff,
            self.options.max_items,
        );

        debug!(kept = items.len(), memoized = all_ok, "news gathered");
        if all_ok {
            self.memo.lock().insert(key, items.clone());
        }
        items
    }

    fn memoized(&self, key: &MemoKey) -> Option<Vec<NewsItem>> {
        let items = self.memo.lock().get(key).cloned();
        if items.is_some() {
            debug!("news served from memo");
        }
        items
    }

    /// `None` when the query was issued and failed; a skipped query is an
    /// empty success.
    async fn run_query(&self, api: &dyn NewsApi, query: Option<NewsQuery>) -> Option<Vec<NewsItem>> {
        let Some(query) = query else {
            return Some(Vec::new());
        };

        match with_backoff(&self.retry, "news search", || api.search(&query)).await {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(q = %query.q, error = %e, "news query failed, continuing without it");
                None
            }
        }
    }
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Merge both result sets, drop stale and duplicate items, order by recency
/// then relevance and keep the first `max_items`.
fn merge(
    company_items: Vec<NewsItem>,
    person_items: Vec<NewsItem>,
    cutoff: chrono::DateTime<Utc>,
    max_items: usize,
) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = company_items
        .into_iter()
        .chain(person_items)
        .filter(|item| item.published_at >= cutoff)
        .collect();

    items.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.relevance.total_cmp(&a.relevance))
    });

    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.dedup_key()));
    items.truncate(max_items);
    items
}
