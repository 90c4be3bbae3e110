//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use morningbrief_core::cache::ContactCache;
use morningbrief_core::calendar::JsonFileCalendar;
use morningbrief_core::enrichment::{EnrichmentConfig, EnrichmentCoordinator};
use morningbrief_core::pipeline::{PipelineOrchestrator, ProgressReporter, RunReport};
use morningbrief_core::render::{OutputFormat, brief_file_name, render, write_brief};
use morningbrief_core::resolver::ContactResolver;
use morningbrief_core::summarizer::{ChatSummarizer, Summarizer};
use morningbrief_crm::{LegacyCrmClient, PrimaryCrmClient};
use morningbrief_news::{GatherOptions, NewsApiClient, NewsGatherer};
use morningbrief_shared::{
    AppConfig, MAX_RUN_DEADLINE, PipelineSettings, RetryPolicy, expand_home, init_config,
    load_config, read_secret, run_deadline, validate_credentials,
};
use morningbrief_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MorningBrief: a daily briefing on the people you are meeting today.
#[derive(Parser)]
#[command(
    name = "morningbrief",
    version,
    about = "Build a morning brief of today's meetings, enriched from your CRM and the news.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Brief output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum Format {
    Markdown,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Markdown => OutputFormat::Markdown,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate and deliver the brief for a day.
    Run {
        /// Day to brief (YYYY-MM-DD). Defaults to today in the configured timezone.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Calendar export (Google Calendar events JSON).
        #[arg(long)]
        events: PathBuf,

        /// Output file, or "-" for stdout. Defaults to the configured output directory.
        #[arg(short, long)]
        out: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,

        /// Override the overall run deadline (at most one day).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_RUN_DEADLINE.as_secs()))]
        deadline_secs: Option<u64>,

        /// Do not record the brief in the history database.
        #[arg(long)]
        no_save: bool,
    },

    /// List recently generated briefs.
    History {
        /// Maximum number of briefs to list.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Print a stored brief.
    Show {
        /// Brief ID (from `history`).
        id: String,

        /// Output format.
        #[arg(long, value_enum, default_value = "markdown")]
        format: Format,
    },

    /// Delete old briefs from the history database.
    Cleanup {
        /// Keep briefs from the last N days (defaults to `retention_days`).
        #[arg(long)]
        days: Option<u32>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "morningbrief=info",
        1 => "morningbrief=debug",
        _ => "morningbrief=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            date,
            events,
            out,
            format,
            deadline_secs,
            no_save,
        } => {
            let args = RunArgs {
                date,
                events,
                out,
                format: format.into(),
                deadline_secs,
                save: !no_save,
            };
            cmd_run(&args).await
        }
        Command::History { limit } => cmd_history(limit).await,
        Command::Show { id, format } => cmd_show(&id, format.into()).await,
        Command::Cleanup { days } => cmd_cleanup(days).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

struct RunArgs {
    date: Option<NaiveDate>,
    events: PathBuf,
    out: Option<String>,
    format: OutputFormat,
    deadline_secs: Option<u64>,
    save: bool,
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(args: &RunArgs) -> Result<()> {
    // Missing CRM credentials abort before any work
    let config = load_config()?;
    validate_credentials(&config)?;

    let mut settings = PipelineSettings::from(&config);
    if let Some(secs) = args.deadline_secs {
        settings.deadline = run_deadline(secs);
    }
    let timezone: Tz = settings
        .timezone
        .parse()
        .map_err(|e| eyre!("invalid timezone '{}': {e}", settings.timezone))?;

    let cache = Arc::new(ContactCache::new());
    let coordinator = build_coordinator(&config, &settings, cache.clone())?;
    let summarizer = build_summarizer(&config, timezone)?;

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(JsonFileCalendar::new(&args.events)),
        Arc::new(coordinator),
        summarizer,
        settings,
    )?;
    let date = args.date.unwrap_or_else(|| orchestrator.today());

    info!(%date, events = %args.events.display(), "generating morning brief");

    let reporter = CliProgress::new();
    let report = orchestrator.run(date, &reporter).await?;

    let content = render(&report.document, args.format, timezone)?;
    let destination = deliver(&report, &content, args, &config)?;

    if args.save {
        if let Err(e) = record_history(&report, &destination, &config).await {
            warn!(error = %e, "failed to record brief history");
        }
    }

    if destination != "stdout" {
        print_summary(&report, &destination, &cache);
    }
    Ok(())
}

fn build_coordinator(
    config: &AppConfig,
    settings: &PipelineSettings,
    cache: Arc<ContactCache>,
) -> Result<EnrichmentCoordinator> {
    let call_timeout = Duration::from_millis(config.pipeline.call_timeout_ms);
    let retry = RetryPolicy::from(config);

    let crm_key = read_secret(&config.crm.api_key_env)
        .ok_or_else(|| eyre!("CRM API key not found. Set the {} environment variable.", config.crm.api_key_env))?;
    let primary = PrimaryCrmClient::new(&config.crm.primary_base_url, crm_key.clone(), call_timeout)?;
    let legacy = LegacyCrmClient::new(&config.crm.legacy_base_url, crm_key, call_timeout)?;
    let resolver = ContactResolver::new(
        Arc::new(primary),
        Arc::new(legacy),
        cache,
        &config.crm,
        retry.clone(),
    )?;

    let news = match read_secret(&config.news.api_key_env) {
        Some(key) => {
            let client = NewsApiClient::new(&config.news.base_url, key, call_timeout)?;
            NewsGatherer::new(Arc::new(client), retry, GatherOptions::from(&config.news))
        }
        None => {
            warn!(
                env = %config.news.api_key_env,
                "news API key not set, briefs will have no headlines"
            );
            NewsGatherer::disabled()
        }
    };

    Ok(EnrichmentCoordinator::new(
        Arc::new(resolver),
        Arc::new(news),
        EnrichmentConfig::from(settings),
    ))
}

fn build_summarizer(config: &AppConfig, timezone: Tz) -> Result<Option<Arc<dyn Summarizer>>> {
    match read_secret(&config.summarizer.api_key_env) {
        Some(key) => {
            let summarizer: Arc<dyn Summarizer> =
                Arc::new(ChatSummarizer::new(&config.summarizer, key, timezone)?);
            Ok(Some(summarizer))
        }
        None => {
            warn!(
                env = %config.summarizer.api_key_env,
                "summarizer API key not set, using template narratives"
            );
            Ok(None)
        }
    }
}

/// Write the rendered brief. Returns where it went.
fn deliver(report: &RunReport, content: &str, args: &RunArgs, config: &AppConfig) -> Result<String> {
    let target = match args.out.as_deref() {
        Some("-") => {
            println!("{content}");
            return Ok("stdout".to_string());
        }
        Some(path) => PathBuf::from(path),
        None => expand_home(&config.delivery.output_dir).join(brief_file_name(&report.document, args.format)),
    };

    let written = write_brief(&target, content)?;
    Ok(written.display().to_string())
}

async fn record_history(report: &RunReport, destination: &str, config: &AppConfig) -> Result<()> {
    let db_path = expand_home(&config.delivery.history_db);
    let storage = Storage::open(&db_path).await?;
    let record = storage.insert_brief(&report.document).await?;
    storage.mark_delivered(&record.id, destination).await?;
    info!(id = %record.id, hash = %record.content_hash, "brief recorded");
    Ok(())
}

fn print_summary(report: &RunReport, destination: &str, cache: &ContactCache) {
    let doc = &report.document;
    let stats = cache.stats();
    let counts = report.attendees;

    println!();
    println!(
        "  Morning brief {}",
        if doc.complete { "ready!" } else { "ready (with gaps)." }
    );
    println!("  ID:        {}", doc.id);
    println!("  Date:      {}", doc.date);
    println!("  Meetings:  {}", doc.sections.len());
    println!(
        "  Attendees: {} ({} complete, {} partial, {} failed)",
        counts.total(),
        counts.complete,
        counts.partial,
        counts.failed
    );
    println!(
        "  Contacts:  {} resolved ({} cache hits)",
        stats.profiles, stats.hits
    );
    println!("  Path:      {destination}");
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn meeting_enriched(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Enriched [{current}/{total}] {title}"));
    }

    fn meeting_summarized(&self, title: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Summarized [{current}/{total}] {title}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// history / show / cleanup
// ---------------------------------------------------------------------------

fn history_path() -> Result<PathBuf> {
    let config = load_config()?;
    Ok(expand_home(&config.delivery.history_db))
}

async fn open_history(path: &Path) -> Result<Option<Storage>> {
    if !path.exists() {
        println!("No briefs recorded yet.");
        return Ok(None);
    }
    Ok(Some(Storage::open_readonly(path).await?))
}

async fn cmd_history(limit: u32) -> Result<()> {
    let Some(storage) = open_history(&history_path()?).await? else {
        return Ok(());
    };

    let records = storage.list_recent(limit).await?;
    if records.is_empty() {
        println!("No briefs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>8}  {:<8}  DELIVERED",
        "ID", "DATE", "MEETINGS", "STATUS"
    );
    for r in records {
        println!(
            "{:<36}  {:<10}  {:>8}  {:<8}  {}",
            r.id,
            r.brief_date,
            r.section_count,
            if r.complete { "complete" } else { "partial" },
            r.delivered_at.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_show(id: &str, format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let Some(storage) = open_history(&expand_home(&config.delivery.history_db)).await? else {
        return Ok(());
    };

    let doc = storage
        .get_brief(id)
        .await?
        .ok_or_else(|| eyre!("no brief with id '{id}'"))?;
    let timezone: Tz = config
        .pipeline
        .timezone
        .parse()
        .map_err(|e| eyre!("invalid timezone '{}': {e}", config.pipeline.timezone))?;

    println!("{}", render(&doc, format, timezone)?);
    Ok(())
}

async fn cmd_cleanup(days: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let days = days.unwrap_or(config.delivery.retention_days);
    let db_path = expand_home(&config.delivery.history_db);
    if !db_path.exists() {
        println!("No briefs recorded yet.");
        return Ok(());
    }

    let storage = Storage::open(&db_path).await?;
    let removed = storage.delete_older_than(days).await?;
    println!("Removed {removed} brief(s) older than {days} days.");
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
