//! Social-profile field discovery over raw CRM field maps.
//!
//! Neither CRM version has a dedicated social-profile attribute; it lives in
//! a custom field whose id differs per account. A field is recognized by a
//! previously discovered id, by its name, or by a value that contains one of
//! the configured social domains.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One custom field on a person or list entry, in either API version.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmField {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// A field definition from a schema listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDef {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A social-profile URL and the field it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialMatch {
    pub field_id: String,
    pub url: String,
}

/// Recognizes social-profile fields.
#[derive(Debug, Clone)]
pub struct SocialMatcher {
    domains: Vec<String>,
}

impl SocialMatcher {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Field names like "LinkedIn URL" or "Social Profile".
    pub fn is_social_name(name: &str) -> bool {
        let name = name.to_lowercase();
        name.contains("linkedin") || name.contains("social")
    }

    pub fn is_social_value(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.domains.iter().any(|d| text.contains(d.as_str()))
    }

    /// Ids of schema fields whose name marks them as social-profile fields.
    pub fn schema_ids(&self, schema: &[FieldDef]) -> Vec<String> {
        schema
            .iter()
            .filter(|f| Self::is_social_name(&f.name))
            .map(|f| f.id.clone())
            .collect()
    }

    /// Find the social-profile URL among `fields`.
    ///
    /// Known ids and name matches win over a value scan, so an explicit
    /// "LinkedIn" field is preferred to a URL pasted into a notes field.
    pub fn find(&self, fields: &[CrmField], known_ids: &[String]) -> Option<SocialMatch> {
        let by_key = fields.iter().find_map(|field| {
            if !known_ids.contains(&field.id) && !Self::is_social_name(&field.name) {
                return None;
            }
            first_text(&field.value).map(|url| SocialMatch {
                field_id: field.id.clone(),
                url,
            })
        });
        if by_key.is_some() {
            return by_key;
        }

        fields.iter().find_map(|field| {
            let mut texts = Vec::new();
            collect_texts(&field.value, &mut texts);
            texts
                .into_iter()
                .find(|t| self.is_social_value(t))
                .map(|url| SocialMatch {
                    field_id: field.id.clone(),
                    url,
                })
        })
    }
}

/// First non-empty string inside a field value.
pub fn first_text(value: &Value) -> Option<String> {
    let mut texts = Vec::new();
    collect_texts(value, &mut texts);
    texts.into_iter().next()
}

/// Field values are plain strings in the legacy API and wrapped objects
/// (`{"type": "text", "data": ...}`) in the current one; dropdowns and
/// multi-value fields nest further.
fn collect_texts(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_texts(v, out)),
        Value::Object(map) => {
            for key in ["data", "url", "value", "text"] {
                if let Some(inner) = map.get(key) {
                    collect_texts(inner, out);
                }
            }
        }
        _ => {}
    }
}

/// Accept numeric (legacy) and string (current) ids alike.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcher() -> SocialMatcher {
        SocialMatcher::new(["linkedin.com"])
    }

    fn field(id: &str, name: &str, value: Value) -> CrmField {
        CrmField {
            id: id.into(),
            name: name.into(),
            value,
        }
    }

    #[test]
    fn matches_by_name() {
        let fields = vec![
            field("f1", "Title", json!("CTO")),
            field("f2", "LinkedIn Profile", json!({"type": "text", "data": "linkedin.com/a"})),
        ];
        let found = matcher().find(&fields, &[]).unwrap();
        assert_eq!(found.field_id, "f2");
        assert_eq!(found.url, "linkedin.com/a");
    }

    #[test]
    fn matches_by_known_id() {
        let fields = vec![field("field-77", "Profile", json!("https://example.org/me"))];
        let found = matcher().find(&fields, &["field-77".into()]).unwrap();
        assert_eq!(found.url, "https://example.org/me");
    }

    #[test]
    fn matches_by_domain_in_nested_value() {
        let fields = vec![
            field("f1", "Notes", json!("met at conference")),
            field(
                "f9",
                "Links",
                json!([{"data": "https://github.com/a"}, {"data": "https://www.LinkedIn.com/in/a"}]),
            ),
        ];
        let found = matcher().find(&fields, &[]).unwrap();
        assert_eq!(found.field_id, "f9");
        assert_eq!(found.url, "https://www.LinkedIn.com/in/a");
    }

    #[test]
    fn empty_social_field_is_no_match() {
        let fields = vec![field("f2", "LinkedIn", json!({"type": "text", "data": null}))];
        assert!(matcher().find(&fields, &[]).is_none());
    }

    #[test]
    fn schema_ids_by_name() {
        let schema = vec![
            FieldDef { id: "1".into(), name: "Industry".into() },
            FieldDef { id: "2".into(), name: "Social URL".into() },
        ];
        assert_eq!(matcher().schema_ids(&schema), vec!["2".to_string()]);
    }

    #[test]
    fn numeric_ids_deserialize_as_strings() {
        let field: CrmField =
            serde_json::from_value(json!({"id": 1234, "value": "x"})).unwrap();
        assert_eq!(field.id, "1234");
        assert_eq!(field.name, "");
    }
}
