//! MorningBrief CLI: a daily brief of today's meetings.
//!
//! Reads the day's calendar, enriches every external attendee from the CRM
//! and the news, and delivers a Markdown or JSON brief.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
