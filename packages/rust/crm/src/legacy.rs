//! Legacy (v1) CRM API.
//!
//! Person ids differ from the current API and there is no lookup by exact
//! email, only a free-text `term` search. Matches are therefore best-effort.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use morningbrief_shared::http::{build_client, fetch_json};
use morningbrief_shared::{BriefError, Result};

use crate::fields::{CrmField, FieldDef};

/// A person record from the v1 API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPerson {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub primary_email: Option<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub social_profiles: Vec<SocialProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialProfile {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
}

impl LegacyPerson {
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn has_email(&self, email: &str) -> bool {
        self.primary_email
            .iter()
            .chain(self.emails.iter())
            .any(|e| e.trim().eq_ignore_ascii_case(email))
    }
}

/// Read-only lookups against the legacy CRM API.
#[async_trait]
pub trait LegacyCrm: Send + Sync {
    /// Legacy person id for `email`.
    async fn search_person(&self, email: &str) -> Result<Option<i64>>;

    async fn get_person(&self, person_id: i64) -> Result<Option<LegacyPerson>>;

    /// Person field definitions for the account.
    async fn field_schema(&self) -> Result<Vec<FieldDef>>;

    /// Custom field values attached to the person, keyed by field id.
    async fn field_values(&self, person_id: i64) -> Result<Vec<CrmField>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    persons: Vec<LegacyPerson>,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    field_id: serde_json::Value,
    #[serde(default)]
    value: serde_json::Value,
}

/// HTTP client for the v1 API (basic auth, key as password).
pub struct LegacyCrmClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LegacyCrmClient {
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
            .basic_auth("", Some(&self.api_key))
    }
}

#[async_trait]
impl LegacyCrm for LegacyCrmClient {
    async fn search_person(&self, email: &str) -> Result<Option<i64>> {
        let response: Option<SearchResponse> = fetch_json(
            self.get("/persons").query(&[("term", email)]),
            "legacy crm search",
        )
        .await?;
        let persons = response.map(|r| r.persons).unwrap_or_default();

        if let Some(exact) = persons.iter().find(|p| p.has_email(email)) {
            return Ok(Some(exact.id));
        }

        // Term search also matches names; without an exact email hit the
        // first result is the best guess.
        let guess = persons.first().map(|p| p.id);
        if let Some(id) = guess {
            debug!(email, legacy_id = id, "no exact email match in legacy search, using first result");
        }
        Ok(guess)
    }

    async fn get_person(&self, person_id: i64) -> Result<Option<LegacyPerson>> {
        fetch_json(self.get(&format!("/persons/{person_id}")), "legacy crm person").await
    }

    async fn field_schema(&self) -> Result<Vec<FieldDef>> {
        fetch_json::<Vec<FieldDef>>(self.get("/persons/fields"), "legacy crm field schema")
            .await?
            .ok_or_else(|| BriefError::NotFound("legacy person field schema".into()))
    }

    async fn field_values(&self, person_id: i64) -> Result<Vec<CrmField>> {
        let values: Option<Vec<FieldValue>> = fetch_json(
            self.get("/field-values").query(&[("person_id", person_id)]),
            "legacy crm field values",
        )
        .await?;

        Ok(values
            .unwrap_or_default()
            .into_iter()
            .map(|v| CrmField {
                id: match v.field_id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
                name: String::new(),
                value: v.value,
            })
            .collect())
    }
}

/// Social URL from the legacy record's built-in profile list.
pub fn legacy_social_url(person: &LegacyPerson) -> Option<String> {
    person
        .social_profiles
        .iter()
        .find(|p| p.kind.eq_ignore_ascii_case("linkedin") && !p.url.trim().is_empty())
        .map(|p| p.url.trim().to_string())
}
