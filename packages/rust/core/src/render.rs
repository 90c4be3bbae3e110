//! Brief rendering and file delivery.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use morningbrief_shared::{AttendeeSummary, BriefDocument, BriefError, BriefSection, Result};

/// Output format for a delivered brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BriefError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(BriefError::validation(format!(
                "unknown output format '{other}' (expected markdown or json)"
            ))),
        }
    }
}

/// Render in the requested format.
pub fn render(doc: &BriefDocument, format: OutputFormat, timezone: Tz) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(render_markdown(doc, timezone)),
        OutputFormat::Json => render_json(doc),
    }
}

pub fn render_json(doc: &BriefDocument) -> Result<String> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| BriefError::validation(format!("JSON serialization failed: {e}")))
}

/// Markdown brief; times are shown in `timezone`.
pub fn render_markdown(doc: &BriefDocument, timezone: Tz) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Morning Brief — {}", doc.date.format("%B %d, %Y"));
    out.push('\n');

    match doc.sections.len() {
        0 => out.push_str("No meetings with external attendees today.\n"),
        1 => out.push_str("You have 1 meeting scheduled today.\n"),
        n => {
            let _ = writeln!(out, "You have {n} meetings scheduled today.");
        }
    }

    for section in &doc.sections {
        out.push('\n');
        render_section(&mut out, section, timezone);
    }

    if !doc.complete {
        out.push_str("\n---\n\n");
        out.push_str("_Some sections were generated without full enrichment or summary._\n");
    }
    out
}

fn render_section(out: &mut String, section: &BriefSection, timezone: Tz) {
    let _ = writeln!(
        out,
        "## {}–{} {}",
        local_time(section.start, timezone),
        local_time(section.end, timezone),
        section.title
    );
    out.push('\n');

    if let Some(location) = &section.location {
        let _ = writeln!(out, "**Location:** {location}");
        out.push('\n');
    }

    if !section.attendees.is_empty() {
        out.push_str("**Attendees:**\n\n");
        for attendee in &section.attendees {
            render_attendee(out, attendee, timezone);
        }
        out.push('\n');
    }

    out.push_str(section.narrative.trim());
    out.push('\n');

    if !section.degradations.is_empty() {
        out.push('\n');
        for marker in &section.degradations {
            let _ = writeln!(out, "> Note: {marker}");
        }
    }
}

fn render_attendee(out: &mut String, attendee: &AttendeeSummary, timezone: Tz) {
    let mut line = format!("- **{}**", attendee.name);
    match (&attendee.role, &attendee.company) {
        (Some(role), Some(company)) => {
            let _ = write!(line, ", {role} at {company}");
        }
        (None, Some(company)) => {
            let _ = write!(line, " ({company})");
        }
        (Some(role), None) => {
            let _ = write!(line, ", {role}");
        }
        (None, None) => {}
    }
    if let Some(url) = &attendee.social_url {
        let _ = write!(line, " [profile]({url})");
    }
    if let Some(tier) = attendee.resolution_tier {
        let _ = write!(line, " _via {tier}_");
    }
    let _ = writeln!(out, "{line}");

    if let Some(history) = &attendee.history {
        let times = if history.meetings == 1 { "time" } else { "times" };
        let _ = writeln!(
            out,
            "  - Met {} {times} before, last on {}",
            history.meetings,
            history.last_met.with_timezone(&timezone).format("%b %-d")
        );
    }
    if let Some(context) = &attendee.recent_context {
        let _ = writeln!(out, "  - Recent context: {context}");
    }

    for headline in attendee.headlines.iter().take(2) {
        let _ = writeln!(out, "  - {headline}");
    }
}

fn local_time(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone).format("%-I:%M %p").to_string()
}

/// File name for a brief: `brief-YYYY-MM-DD.<ext>`.
pub fn brief_file_name(doc: &BriefDocument, format: OutputFormat) -> String {
    format!("brief-{}.{}", doc.date.format("%Y-%m-%d"), format.extension())
}

/// Write rendered content to `target` via a temp file and rename.
#[instrument(skip_all, fields(path = %target.display()))]
pub fn write_brief(target: &Path, content: &str) -> Result<PathBuf> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| BriefError::io(parent, e))?;
    }

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BriefError::validation(format!("not a file path: {}", target.display())))?;
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| BriefError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| BriefError::io(target, e))?;

    debug!(bytes = content.len(), "wrote brief");
    Ok(target.to_path_buf())
}
