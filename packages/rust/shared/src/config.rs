//! Application configuration for MorningBrief.
//!
//! User config lives at `~/.morningbrief/morningbrief.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BriefError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "morningbrief.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".morningbrief";

// ---------------------------------------------------------------------------
// Config structs (matching morningbrief.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Concurrency, timeouts and the delivery deadline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Backoff for rate-limited and transient external calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// CRM endpoints and social-profile matching.
    #[serde(default)]
    pub crm: CrmConfig,

    /// News search settings.
    #[serde(default)]
    pub news: NewsConfig,

    /// Summarization service settings.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Where finished briefs go.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum attendees enriched concurrently across the whole run.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Timeout for a single external HTTP call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Timeout for one attendee's resolution + news gathering.
    #[serde(default = "default_attendee_timeout_ms")]
    pub attendee_timeout_ms: u64,

    /// Wall-clock budget for the whole run.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Time kept back from enrichment for summarization and assembly.
    #[serde(default = "default_assembly_reserve_ms")]
    pub assembly_reserve_ms: u64,

    /// IANA timezone used to pick "today's" events.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Days of calendar history scanned for prior meetings. 0 disables.
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_ms: default_call_timeout_ms(),
            attendee_timeout_ms: default_attendee_timeout_ms(),
            deadline_secs: default_deadline_secs(),
            assembly_reserve_ms: default_assembly_reserve_ms(),
            timezone: default_timezone(),
            history_days: default_history_days(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_call_timeout_ms() -> u64 {
    10_000
}
fn default_attendee_timeout_ms() -> u64 {
    45_000
}
fn default_deadline_secs() -> u64 {
    300
}
fn default_assembly_reserve_ms() -> u64 {
    30_000
}
fn default_timezone() -> String {
    "America/New_York".into()
}
fn default_history_days() -> u32 {
    120
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per external call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay for transient errors.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// First backoff delay after a rate-limit response.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_rate_limit_delay_ms() -> u64 {
    1_500
}

/// `[crm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Name of the env var holding the CRM API key (never store the key itself).
    #[serde(default = "default_crm_key_env")]
    pub api_key_env: String,

    /// Base URL of the current (v2) CRM API.
    #[serde(default = "default_primary_base_url")]
    pub primary_base_url: String,

    /// Base URL of the legacy (v1) CRM API.
    #[serde(default = "default_legacy_base_url")]
    pub legacy_base_url: String,

    /// Substrings that identify a social-profile URL in a field value.
    #[serde(default = "default_social_domains")]
    pub social_domains: Vec<String>,

    /// Search page used to synthesize a profile link when no CRM has one.
    #[serde(default = "default_fallback_search_url")]
    pub fallback_search_url: String,

    /// Recent person notes carried into a profile. 0 disables.
    #[serde(default = "default_recent_notes")]
    pub recent_notes: usize,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_crm_key_env(),
            primary_base_url: default_primary_base_url(),
            legacy_base_url: default_legacy_base_url(),
            social_domains: default_social_domains(),
            fallback_search_url: default_fallback_search_url(),
            recent_notes: default_recent_notes(),
        }
    }
}

fn default_crm_key_env() -> String {
    "CRM_API_KEY".into()
}
fn default_primary_base_url() -> String {
    "https://api.affinity.co/v2".into()
}
fn default_legacy_base_url() -> String {
    "https://api.affinity.co".into()
}
fn default_social_domains() -> Vec<String> {
    vec!["linkedin.com".into()]
}
fn default_fallback_search_url() -> String {
    "https://www.google.com/search".into()
}
fn default_recent_notes() -> usize {
    3
}

/// `[news]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Name of the env var holding the news API key. News is skipped when unset.
    #[serde(default = "default_news_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_news_base_url")]
    pub base_url: String,

    /// Lookback window for articles.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Maximum items kept per attendee after merging.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Page size requested per query.
    #[serde(default = "default_per_query_limit")]
    pub per_query_limit: u32,

    /// Also query by person name, not only by company.
    #[serde(default = "default_true")]
    pub person_queries: bool,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_news_key_env(),
            base_url: default_news_base_url(),
            window_days: default_window_days(),
            max_items: default_max_items(),
            per_query_limit: default_per_query_limit(),
            person_queries: true,
        }
    }
}

fn default_news_key_env() -> String {
    "NEWS_API_KEY".into()
}
fn default_news_base_url() -> String {
    "https://newsapi.org/v2".into()
}
fn default_window_days() -> u32 {
    30
}
fn default_max_items() -> usize {
    3
}
fn default_per_query_limit() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

/// `[summarizer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Name of the env var holding the API key. Template narratives are used when unset.
    #[serde(default = "default_summarizer_key_env")]
    pub api_key_env: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_summarizer_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-meeting summarization timeout.
    #[serde(default = "default_summarizer_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_summarizer_key_env(),
            base_url: default_summarizer_base_url(),
            model: default_model(),
            timeout_ms: default_summarizer_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_summarizer_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_summarizer_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_summarizer_timeout_ms() -> u64 {
    20_000
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}

/// `[delivery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory where rendered briefs are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Brief history database.
    #[serde(default = "default_history_db")]
    pub history_db: String,

    /// Briefs older than this are removed by `cleanup`.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            history_db: default_history_db(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_output_dir() -> String {
    "~/morningbrief".into()
}
fn default_history_db() -> String {
    "~/.morningbrief/history.db".into()
}
fn default_retention_days() -> u32 {
    30
}

// ---------------------------------------------------------------------------
// Pipeline settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Longest run deadline honored; larger values are clamped to it.
pub const MAX_RUN_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// Run deadline for `secs`, clamped to [`MAX_RUN_DEADLINE`].
pub fn run_deadline(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_RUN_DEADLINE)
}

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Global bound on concurrent attendee enrichment.
    pub concurrency: usize,
    /// Per-attendee enrichment timeout.
    pub attendee_timeout: Duration,
    /// Overall run deadline, measured from the start of the run.
    pub deadline: Duration,
    /// Portion of the deadline kept back for summarization and assembly.
    pub assembly_reserve: Duration,
    /// Summarizer call timeout.
    pub summarizer_timeout: Duration,
    /// News lookback window.
    pub news_window_days: u32,
    /// IANA timezone name.
    pub timezone: String,
    /// Prior-meeting lookback in days; 0 disables.
    pub history_days: u32,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.pipeline.concurrency.max(1) as usize,
            attendee_timeout: Duration::from_millis(config.pipeline.attendee_timeout_ms),
            deadline: run_deadline(config.pipeline.deadline_secs),
            assembly_reserve: Duration::from_millis(config.pipeline.assembly_reserve_ms),
            summarizer_timeout: Duration::from_millis(config.summarizer.timeout_ms),
            news_window_days: config.news.window_days,
            timezone: config.pipeline.timezone.clone(),
            history_days: config.pipeline.history_days,
        }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            rate_limit_delay: Duration::from_millis(config.retry.rate_limit_delay_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.morningbrief/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| BriefError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.morningbrief/morningbrief.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BriefError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BriefError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BriefError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BriefError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BriefError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Read a secret from the env var named in config. Empty values count as unset.
pub fn read_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// Check that the CRM API key env var is set and non-empty.
///
/// A missing CRM key is a global configuration failure: the run is aborted
/// rather than producing a brief where every attendee fails the same way.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let var_name = &config.crm.api_key_env;
    match read_secret(var_name) {
        Some(_) => Ok(()),
        None => Err(BriefError::config(format!(
            "CRM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("deadline_secs"));
        assert!(toml_str.contains("CRM_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.concurrency, 4);
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.crm.social_domains, vec!["linkedin.com".to_string()]);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[pipeline]
concurrency = 8
timezone = "Europe/London"

[news]
person_queries = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.concurrency, 8);
        assert_eq!(config.pipeline.deadline_secs, 300);
        assert_eq!(config.pipeline.timezone, "Europe/London");
        assert!(!config.news.person_queries);
        assert_eq!(config.news.window_days, 30);
    }

    #[test]
    fn pipeline_settings_from_app_config() {
        let mut app = AppConfig::default();
        app.pipeline.concurrency = 0;
        let settings = PipelineSettings::from(&app);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.deadline, Duration::from_secs(300));
        assert_eq!(settings.summarizer_timeout, Duration::from_millis(20_000));
        assert_eq!(settings.news_window_days, 30);
        assert_eq!(settings.history_days, 120);
    }

    #[test]
    fn oversized_deadline_is_clamped() {
        let mut app = AppConfig::default();
        app.pipeline.deadline_secs = u64::MAX;
        assert_eq!(PipelineSettings::from(&app).deadline, MAX_RUN_DEADLINE);
        assert_eq!(run_deadline(60), Duration::from_secs(60));
    }

    #[test]
    fn retry_policy_from_app_config() {
        let app = AppConfig::default();
        let policy = RetryPolicy::from(&app);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.rate_limit_delay, Duration::from_millis(1_500));
    }

    #[test]
    fn credential_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.crm.api_key_env = "MB_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_credentials(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("CRM API key not found"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/briefs"), PathBuf::from("/tmp/briefs"));
    }
}
