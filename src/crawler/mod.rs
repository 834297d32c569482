//! Crawler module for discovering and collecting pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP probing and external script fetching
//! - HTML link, script and form extraction
//! - The bounded breadth-first frontier and navigation graph
//! - The per-URL collection pipeline
//! - Per-site coordination and multi-site orchestration

mod collector;
mod coordinator;
mod fetcher;
mod frontier;
mod orchestrator;
mod parser;

pub use collector::{Collected, PageCollector};
pub use coordinator::{Coordinator, CrawlSummary};
pub use fetcher::{build_http_client, random_user_agent, Fetcher, ProbeResult};
pub use frontier::{
    Frontier, FrontierLimits, NavigationEdge, Next, TerminationReason, UrlRecord,
};
pub use orchestrator::Orchestrator;
pub use parser::{parse_html, ParsedPage, ScriptRef};
