//! State module for tracking crawl results
//!
//! # Components
//!
//! - `PageOutcome`: what happened to each visited URL (archived, not found, load failed, ...)
//! - `FailureKind`: classification of non-fatal failures for structured logs

mod failure;
mod outcome;

// Re-export main types
pub use failure::FailureKind;
pub use outcome::PageOutcome;
