//! News search API client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use morningbrief_shared::http::{build_client, fetch_json};
use morningbrief_shared::{EntityKind, NewsItem, Result};

/// One search against the news API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    /// Free-text query string.
    pub q: String,
    /// Person or company the query is about.
    pub entity: String,
    pub kind: EntityKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub limit: u32,
}

impl NewsQuery {
    /// Exact-phrase query for a company.
    pub fn company(name: &str, from: NaiveDate, to: NaiveDate, limit: u32) -> Self {
        Self {
            q: format!("\"{name}\""),
            entity: name.to_string(),
            kind: EntityKind::Company,
            from,
            to,
            limit,
        }
    }

    /// Person query, narrowed by company when known.
    pub fn person(name: &str, company: Option<&str>, from: NaiveDate, to: NaiveDate, limit: u32) -> Self {
        let q = match company {
            Some(company) => format!("\"{name}\" AND \"{company}\""),
            None => format!("\"{name}\""),
        };
        Self {
            q,
            entity: name.to_string(),
            kind: EntityKind::Person,
            from,
            to,
            limit,
        }
    }
}

/// Searches recent articles.
#[async_trait]
pub trait NewsApi: Send + Sync {
    /// Articles matching `query`, most relevant first.
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>>;
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

/// Client for a NewsAPI-compatible `/everything` endpoint.
pub struct NewsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, call_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(call_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl NewsApi for NewsApiClient {
    async fn search(&self, query: &NewsQuery) -> Result<Vec<NewsItem>> {
        let from = query.from.format("%Y-%m-%d").to_string();
        let to = query.to.format("%Y-%m-%d").to_string();
        let page_size = query.limit.to_string();
        let request = self
            .client
            .get(format!("{}/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query.q.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("sortBy", "relevancy"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ]);

        let response: Option<EverythingResponse> = fetch_json(request, "news search").await?;
        let articles = response.map(|r| r.articles).unwrap_or_default();
        let total = articles.len();

        let items: Vec<NewsItem> = articles
            .into_iter()
            .enumerate()
            .filter_map(|(rank, article)| to_item(article, rank, total, query))
            .collect();

        debug!(q = %query.q, returned = total, kept = items.len(), "news search complete");
        Ok(items)
    }
}

/// Articles come back in relevance order; rank maps to a score in (0, 1].
fn to_item(article: Article, rank: usize, total: usize, query: &NewsQuery) -> Option<NewsItem> {
    let headline = article.title.map(|t| t.trim().to_string())?;
    // Takedowns are reported with a placeholder title.
    if headline.is_empty() || headline == "[Removed]" {
        return None;
    }
    let published_at = article.published_at?;
    let source = article
        .source
        .and_then(|s| s.name)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".into());

    Some(NewsItem {
        headline,
        source,
        url: article.url,
        published_at,
        entity: query.entity.clone(),
        entity_kind: query.kind,
        relevance: 1.0 - rank as f32 / total.max(1) as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dates() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2026, 9, 17).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        )
    }

    #[test]
    fn query_strings() {
        let (from, to) = dates();
        assert_eq!(NewsQuery::company("X Corp", from, to, 5).q, "\"X Corp\"");
        assert_eq!(
            NewsQuery::person("Ada", Some("X Corp"), from, to, 5).q,
            "\"Ada\" AND \"X Corp\""
        );
        assert_eq!(NewsQuery::person("Ada", None, from, to, 5).kind, EntityKind::Person);
    }

    #[tokio::test]
    async fn search_maps_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/everything"))
            .and(query_param("q", "\"X Corp\""))
            .and(query_param("from", "2026-09-17"))
            .and(query_param("sortBy", "relevancy"))
            .and(header("X-Api-Key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "articles": [
                    {"title": "X Corp raises", "url": "https://n.example/1",
                     "publishedAt": "2026-10-16T08:00:00Z", "source": {"name": "Reuters"}},
                    {"title": "[Removed]", "publishedAt": "2026-10-15T08:00:00Z", "source": {"name": "?"}},
                    {"title": "X Corp hires", "publishedAt": "2026-10-14T08:00:00Z", "source": {}}
                ]
            })))
            .mount(&server)
            .await;

        let client = NewsApiClient::new(&server.uri(), "key", Duration::from_secs(5)).unwrap();
        let (from, to) = dates();
        let items = client.search(&NewsQuery::company("X Corp", from, to, 5)).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].headline, "X Corp raises");
        assert_eq!(items[0].source, "Reuters");
        assert_eq!(items[0].entity, "X Corp");
        assert!(items[0].relevance > items[1].relevance);
        assert_eq!(items[1].source, "unknown");
    }
}
