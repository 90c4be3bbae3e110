//! Current-generation (v2) CRM API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use morningbrief_shared::http::{build_client, fetch_json};
use morningbrief_shared::{BriefError, Result};

use crate::fields::{CrmField, FieldDef};

/// A person record from the v2 API, with its custom fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryPerson {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub fields: Vec<CrmField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub name: Option<String>,
}

impl PrimaryPerson {
    /// "First Last", or whichever part is present.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// Name of the first linked organization.
    pub fn company(&self) -> Option<String> {
        self.organizations
            .iter()
            .filter_map(|o| o.name.as_deref().map(str::trim))
            .find(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// Read-only lookups against the current CRM API.
#[async_trait]
pub trait PrimaryCrm: Send + Sync {
    /// Person matching `email` (already normalized), with custom fields.
    async fn find_person(&self, email: &str) -> Result<Option<PrimaryPerson>>;

    /// Fields on every list entry the person belongs to.
    async fn list_entry_fields(&self, person_id: i64) -> Result<Vec<CrmField>>;

    /// Person field definitions for the account.
    async fn field_schema(&self) -> Result<Vec<FieldDef>>;

    /// Excerpts of the person's most recent notes, newest first.
    async fn person_notes(&self, person_id: i64, limit: usize) -> Result<Vec<String>>;
}

/// Longest note excerpt carried into a profile, in characters.
pub const NOTE_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ListEntry {
    #[serde(default)]
    fields: Vec<CrmField>,
}

#[derive(Debug, Deserialize)]
struct Note {
    #[serde(default, alias = "body")]
    content: Option<String>,
}

/// Trimmed note text cut to [`NOTE_EXCERPT_CHARS`], with an ellipsis when cut.
pub fn note_excerpt(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut chars = text.char_indices();
    match chars.nth(NOTE_EXCERPT_CHARS) {
        Some((cut, _)) => Some(format!("{}...", text[..cut].trim_end())),
        None => Some(text.to_string()),
    }
}

/// HTTP client for the v2 API (bearer auth).
pub struct PrimaryCrmClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PrimaryCrmClient {
    pub fn new(base_url: &str, api_key: impl Into<String>, call_timeout: std::time::Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(call_timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl PrimaryCrm for PrimaryCrmClient {
    async fn find_person(&self, email: &str) -> Result<Option<PrimaryPerson>> {
        let page: Option<Page<PrimaryPerson>> =
            fetch_json(self.get("/persons").query(&[("email", email)]), "crm person search").await?;

        let Some(found) = page.and_then(|p| p.data.into_iter().next()) else {
            return Ok(None);
        };

        // Search results omit custom fields; fetch the full record.
        let detail: Option<PrimaryPerson> = fetch_json(
            self.get(&format!("/persons/{}", found.id))
                .query(&[("fieldTypes", "enriched"), ("fieldTypes", "global")]),
            "crm person detail",
        )
        .await?;

        match detail {
            Some(person) => Ok(Some(person)),
            None => {
                debug!(person_id = found.id, "person detail missing, using search record");
                Ok(Some(found))
            }
        }
    }

    async fn list_entry_fields(&self, person_id: i64) -> Result<Vec<CrmField>> {
        let page: Option<Page<ListEntry>> = fetch_json(
            self.get(&format!("/persons/{person_id}/list-entries")),
            "crm list entries",
        )
        .await?;

        Ok(page
            .map(|p| p.data.into_iter().flat_map(|e| e.fields).collect())
            .unwrap_or_default())
    }

    async fn field_schema(&self) -> Result<Vec<FieldDef>> {
        let page: Option<Page<FieldDef>> =
            fetch_json(self.get("/persons/fields"), "crm field schema").await?;
        page.map(|p| p.data)
            .ok_or_else(|| BriefError::NotFound("person field schema".into()))
    }

    async fn person_notes(&self, person_id: i64, limit: usize) -> Result<Vec<String>> {
        let page: Option<Page<Note>> = fetch_json(
            self.get(&format!("/persons/{person_id}/notes"))
                .query(&[("limit", limit.to_string())]),
            "crm person notes",
        )
        .await?;

        Ok(page
            .map(|p| {
                p.data
                    .iter()
                    .filter_map(|n| n.content.as_deref().and_then(note_excerpt))
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }
}
