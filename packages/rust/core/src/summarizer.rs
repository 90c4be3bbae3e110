//! Meeting narratives: the summarization seam, its HTTP implementation and
//! the deterministic fallbacks used when it cannot answer in time.

use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use morningbrief_shared::http::{build_client, fetch_json};
use morningbrief_shared::{BriefError, BundleStatus, EnrichmentBundle, MeetingContext, Result, SummarizerConfig};

/// Turns one meeting's context into narrative text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &MeetingContext) -> Result<String>;
}

const SYSTEM_PROMPT: &str = "You write concise, professional morning briefs. For the meeting \
given, write a short paragraph covering who is attending, what is relevant about them and \
their companies (including recent news), and one or two suggested talking points. Keep the \
tone conversational and focus on actionable insight. Do not invent facts.";

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`Summarizer`] backed by a chat-completions endpoint.
pub struct ChatSummarizer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timezone: Tz,
}

impl ChatSummarizer {
    pub fn new(config: &SummarizerConfig, api_key: impl Into<String>, timezone: Tz) -> Result<Self> {
        Ok(Self {
            client: build_client(Duration::from_millis(config.timeout_ms))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timezone,
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    #[instrument(skip_all, fields(event_id = %context.event.id, model = %self.model))]
    async fn summarize(&self, context: &MeetingContext) -> Result<String> {
        let prompt = build_prompt(context, self.timezone);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: ChatResponse = fetch_json(request, "summarization")
            .await
            .map_err(|e| BriefError::Summarization(e.to_string()))?
            .ok_or_else(|| BriefError::Summarization("endpoint not found".into()))?;

        let text = response
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BriefError::Summarization("empty completion".into()))?;

        debug!(chars = text.len(), "narrative generated");
        Ok(text)
    }
}

/// Structured text context for one meeting.
pub fn build_prompt(context: &MeetingContext, timezone: Tz) -> String {
    let event = &context.event;
    let mut out = format!("Meeting: {}\n", event.title);
    out.push_str(&format!(
        "Time: {} - {}\n",
        event.start.with_timezone(&timezone).format("%I:%M %p"),
        event.end.with_timezone(&timezone).format("%I:%M %p"),
    ));
    if let Some(location) = &event.location {
        out.push_str(&format!("Location: {location}\n"));
    }
    if let Some(notes) = &event.notes {
        out.push_str(&format!("Description: {notes}\n"));
    }

    out.push_str("Attendees:\n");
    for bundle in participants(context) {
        out.push_str(&format!("  - {} ({})", bundle.display_name(), bundle.attendee.email));
        if let Some(profile) = &bundle.profile {
            if let Some(company) = &profile.company {
                out.push_str(&format!(" from {company}"));
            }
            if let Some(role) = &profile.role {
                out.push_str(&format!(", {role}"));
            }
        }
        out.push('\n');

        if let Some(profile) = bundle.profile.as_ref().filter(|p| !p.recent_context.is_empty()) {
            let notes: Vec<&str> = profile.recent_context.iter().take(2).map(String::as_str).collect();
            out.push_str(&format!("    Recent context: {}\n", notes.join(" ")));
        }
        if let Some(history) = &bundle.history {
            out.push_str(&format!(
                "    Prior meetings: {}, last on {}\n",
                history.meetings,
                history.last_met.with_timezone(&timezone).format("%B %d, %Y"),
            ));
        }

        if !bundle.news.is_empty() {
            out.push_str(&format!("    Recent news: {} articles found\n", bundle.news.len()));
            for item in bundle.news.iter().take(2) {
                out.push_str(&format!("      - {}\n", item.headline));
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

/// Longest "About" snippet in a template narrative.
const ABOUT_CHARS: usize = 120;

/// Bundles for real people; shared internal mailboxes are left out.
fn participants(context: &MeetingContext) -> impl Iterator<Item = &EnrichmentBundle> {
    context.bundles.iter().filter(|b| !b.attendee.is_internal_alias())
}

/// Template narrative built from the bundles alone.
///
/// `None` when no attendee has usable enrichment; the section then falls back
/// to the event title.
pub fn fallback_narrative(context: &MeetingContext) -> Option<String> {
    let usable: Vec<&EnrichmentBundle> = participants(context)
        .filter(|b| b.status != BundleStatus::Failed && b.profile.is_some())
        .collect();
    if usable.is_empty() {
        return None;
    }

    let people: Vec<String> = participants(context)
        .map(|b| {
            let name = b.display_name();
            let detail: Vec<&str> = b
                .profile
                .iter()
                .flat_map(|p| [p.role.as_deref(), p.company.as_deref()])
                .flatten()
                .collect();
            if detail.is_empty() {
                name
            } else {
                format!("{name} ({})", detail.join(", "))
            }
        })
        .collect();

    let mut out = format!("{}: meeting with {}.", context.event.title, people.join(", "));

    let about = context
        .event
        .notes
        .as_deref()
        .and_then(|n| excerpt(n, ABOUT_CHARS))
        .or_else(|| {
            usable
                .iter()
                .filter_map(|b| b.profile.as_ref()?.recent_context.first())
                .find_map(|n| excerpt(n, ABOUT_CHARS))
        });
    if let Some(about) = about {
        out.push_str(&format!(" About: {}", sentence(about)));
    }

    let top = usable
        .iter()
        .flat_map(|b| b.news.iter())
        .max_by(|a, b| a.published_at.cmp(&b.published_at));
    if let Some(item) = top {
        out.push_str(&format!(" Top news: \"{}\" ({}).", item.headline, item.source));
    }

    let starters = conversation_starters(&usable);
    if !starters.is_empty() {
        out.push_str("\n\nConversation starters:");
        for starter in starters {
            out.push_str(&format!("\n- {starter}"));
        }
    }
    Some(out)
}

/// Up to three talking points drawn from companies, news and roles.
pub fn conversation_starters(bundles: &[&EnrichmentBundle]) -> Vec<String> {
    let mut starters: Vec<String> = Vec::new();
    let mut push = |s: String| {
        if !starters.contains(&s) {
            starters.push(s);
        }
    };

    for bundle in bundles {
        let Some(profile) = &bundle.profile else {
            continue;
        };
        if let Some(company) = &profile.company {
            push(format!("Ask about recent developments at {company}"));
        }
        if let Some(note) = profile.recent_context.first().and_then(|n| excerpt(n, 80)) {
            push(format!("Follow up on: {note}"));
        }
        if let Some(history) = &bundle.history {
            push(format!(
                "Pick up from your last meeting on {}",
                history.last_met.format("%B %d")
            ));
        }
        if let Some(item) = bundle.news.first() {
            push(format!("Discuss recent news: {}", item.headline));
        }
        if let Some(role) = &profile.role {
            push(format!("Ask about their role as {role}"));
        }
    }
    push("Ask about their current priorities and challenges".into());
    push("Discuss potential collaboration opportunities".into());

    starters.truncate(3);
    starters
}

/// Whitespace-collapsed text cut to `max` characters with an ellipsis.
fn excerpt(text: &str, max: usize) -> Option<String> {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.is_empty() {
        return None;
    }
    match clean.char_indices().nth(max) {
        Some((cut, _)) => Some(format!("{}…", clean[..cut].trim_end())),
        None => Some(clean),
    }
}

fn sentence(text: String) -> String {
    if text.ends_with(['.', '!', '?', '…']) {
        text
    } else {
        format!("{text}.")
    }
}
