//! Shared types, error model, retry policy and configuration for MorningBrief.
//!
//! This crate is the foundation depended on by all other MorningBrief crates.
//! It provides:
//! - [`BriefError`]: the unified error type and failure taxonomy
//! - Domain types ([`CalendarEvent`], [`ContactProfile`], [`EnrichmentBundle`], [`BriefDocument`])
//! - Configuration ([`AppConfig`], [`PipelineSettings`], config loading)
//! - [`with_backoff`]: the one retry helper used by every external client
//! - [`http`]: client construction and response classification

pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrmConfig, DeliveryConfig, MAX_RUN_DEADLINE, NewsConfig, PipelineConfig,
    PipelineSettings, RetryConfig, SummarizerConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, read_secret, run_deadline, validate_credentials,
};
pub use error::{BriefError, Result};
pub use retry::{RetryPolicy, with_backoff};
pub use types::{
    Attendee, AttendeeSummary, BriefDocument, BriefId, BriefSection, BundleStatus, CalendarEvent,
    ContactProfile, EnrichmentBundle, EntityKind, MeetingContext, MeetingHistory, NarrativeKind,
    NewsItem, ResolutionTier, normalize_email,
};
