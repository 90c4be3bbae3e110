//! Recent news about meeting attendees and their companies.
//!
//! [`NewsApiClient`] talks to a NewsAPI-compatible search endpoint;
//! [`NewsGatherer`] issues the company and person queries for one attendee
//! concurrently and reduces them to a short, deduplicated list.

mod client;
mod gatherer;

pub use client::{NewsApi, NewsApiClient, NewsQuery};
pub use gatherer::{GatherOptions, NewsGatherer};
