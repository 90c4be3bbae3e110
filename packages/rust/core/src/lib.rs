//! Core pipeline orchestration and domain logic for MorningBrief.
//!
//! This crate ties together the calendar source, attendee resolution, news
//! gathering and summarization into the daily brief run
//! ([`pipeline::PipelineOrchestrator`]).

pub mod assembler;
pub mod cache;
pub mod calendar;
pub mod enrichment;
pub mod history;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod summarizer;

#[cfg(test)]
mod testing;
