//! Bounded breadth-first frontier
//!
//! This module handles:
//! - The seen set used for duplicate suppression, and the discovery-ordered
//!   list of the same URLs
//! - The FIFO queue of the depth being processed
//! - Per-depth buffers of accepted links, sampled down on promotion
//! - The navigation graph
//! - The four crawl limits (URLs, depth, per-depth fan-out, wall clock)

use crate::config::CrawlerConfig;
use crate::url::{canonicalize_url, UrlFilter};
use crate::UrlError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

/// A URL handed to the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Canonical URL
    pub url: Url,
    /// Breadth-first depth (the seed is depth 0)
    pub depth: u32,
    /// The page the URL was discovered on
    pub parent: Option<Url>,
}

/// "`src` linked to `dst`, discovered at depth `depth`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEdge {
    pub src: String,
    pub dst: String,
    pub depth: u32,
}

/// Why a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Nothing left to visit
    Exhausted,
    /// The visited count reached `max-urls`
    MaxUrls,
    /// The next depth lies beyond `max-depth`
    MaxDepth,
    /// The wall-clock budget ran out
    Timeout,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::MaxUrls => "max_urls",
            Self::MaxDepth => "max_depth",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the frontier hands out next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Url(UrlRecord),
    Done(TerminationReason),
}

/// Crawl limits enforced by the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    pub max_urls: usize,
    pub max_depth: u32,
    pub max_per_depth: usize,
    pub timeout: Duration,
}

impl FrontierLimits {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_urls: config.max_urls,
            max_depth: config.max_depth,
            max_per_depth: config.max_per_depth,
            timeout: config.timeout(),
        }
    }
}

/// Bounded breadth-first explorer of one site
///
/// Depths are processed strictly in order. Links found on depth `d` pages
/// are buffered for depth `d + 1`; once depth `d` drains, at most
/// `max_per_depth` of them are drawn (uniformly, with a PRNG seeded from
/// `(site_id, d + 1)`) and queued in discovery order.
pub struct Frontier {
    site_id: u32,
    limits: FrontierLimits,

    /// Canonical form of every URL ever accepted
    seen: HashSet<String>,
    /// The seen set in discovery order, seed first
    discovered: Vec<String>,
    queue: VecDeque<UrlRecord>,
    buffers: BTreeMap<u32, Vec<UrlRecord>>,

    visited: Vec<UrlRecord>,
    edges: Vec<NavigationEdge>,
    enqueued: usize,

    /// Links were dropped because their depth exceeded `max_depth`
    depth_limited: bool,
    started: Instant,
}

impl Frontier {
    /// Creates a frontier seeded with `seed` at depth 0
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - The seed is queued and marked seen
    /// * `Err(UrlError)` - The seed has no canonical form
    pub fn new(site_id: u32, seed: Url, limits: FrontierLimits) -> Result<Self, UrlError> {
        let seed = canonicalize_url(seed)?;

        let mut seen = HashSet::new();
        seen.insert(seed.as_str().to_string());
        let discovered = vec![seed.as_str().to_string()];

        let mut queue = VecDeque::new();
        queue.push_back(UrlRecord {
            url: seed,
            depth: 0,
            parent: None,
        });

        Ok(Self {
            site_id,
            limits,
            seen,
            discovered,
            queue,
            buffers: BTreeMap::new(),
            visited: Vec::new(),
            edges: Vec::new(),
            enqueued: 1,
            depth_limited: false,
            started: Instant::now(),
        })
    }

    /// Returns the next URL to collect, or why the crawl is over
    ///
    /// The handed-out URL counts as visited from this point on, and its
    /// incoming edge is appended to the navigation graph.
    pub fn next(&mut self) -> Next {
        if self.started.elapsed() >= self.limits.timeout {
            return Next::Done(TerminationReason::Timeout);
        }

        if self.visited.len() >= self.limits.max_urls {
            return Next::Done(TerminationReason::MaxUrls);
        }

        if self.queue.is_empty() {
            if let Err(reason) = self.promote() {
                return Next::Done(reason);
            }
        }

        let Some(record) = self.queue.pop_front() else {
            return Next::Done(TerminationReason::Exhausted);
        };

        if let Some(parent) = &record.parent {
            self.edges.push(NavigationEdge {
                src: parent.to_string(),
                dst: record.url.to_string(),
                depth: record.depth,
            });
        }
        self.visited.push(record.clone());

        Next::Url(record)
    }

    /// Buffers the links found on `parent`
    ///
    /// Links go through `filter` against the seen set; the accepted ones
    /// are marked seen and recorded as discovered. They are buffered at
    /// `parent.depth + 1` unless that depth lies beyond `max_depth`.
    ///
    /// # Returns
    ///
    /// The number of links buffered for a later visit
    pub fn discover(&mut self, parent: &UrlRecord, links: &[Url], filter: &UrlFilter) -> usize {
        let depth = parent.depth + 1;
        let admitted = filter.filter_batch(links, &self.seen);

        if admitted.is_empty() {
            return 0;
        }

        for url in &admitted {
            self.seen.insert(url.as_str().to_string());
            self.discovered.push(url.as_str().to_string());
        }

        if depth > self.limits.max_depth {
            self.depth_limited = true;
            return 0;
        }

        let count = admitted.len();
        let buffer = self.buffers.entry(depth).or_default();
        for url in admitted {
            buffer.push(UrlRecord {
                url,
                depth,
                parent: Some(parent.url.clone()),
            });
        }

        count
    }

    /// Moves the next buffered depth into the queue
    fn promote(&mut self) -> Result<(), TerminationReason> {
        let Some((depth, mut candidates)) = self.buffers.pop_first() else {
            return Err(if self.depth_limited {
                TerminationReason::MaxDepth
            } else {
                TerminationReason::Exhausted
            });
        };

        if depth > self.limits.max_depth {
            return Err(TerminationReason::MaxDepth);
        }

        let room = self.limits.max_urls.saturating_sub(self.enqueued);
        let take = self.limits.max_per_depth.min(room);

        if candidates.len() > take {
            let mut rng = StdRng::seed_from_u64(sampling_seed(self.site_id, depth));
            let mut picked = rand::seq::index::sample(&mut rng, candidates.len(), take).into_vec();
            picked.sort_unstable();

            let mut slots: Vec<Option<UrlRecord>> = candidates.into_iter().map(Some).collect();
            candidates = picked
                .into_iter()
                .filter_map(|i| slots.get_mut(i).and_then(Option::take))
                .collect();
        }

        tracing::debug!(
            site_id = self.site_id,
            depth,
            promoted = candidates.len(),
            "Promoted depth"
        );

        self.enqueued += candidates.len();
        self.queue.extend(candidates);

        if self.queue.is_empty() {
            return Err(TerminationReason::Exhausted);
        }
        Ok(())
    }

    /// URLs handed out so far, in visit order
    pub fn visited(&self) -> &[UrlRecord] {
        &self.visited
    }

    /// Every URL accepted by the filter, in discovery order
    ///
    /// Includes links that were sampled away or lay beyond `max_depth`.
    pub fn discovered(&self) -> &[String] {
        &self.discovered
    }

    /// Navigation graph, in discovery order
    pub fn edges(&self) -> &[NavigationEdge] {
        &self.edges
    }

    /// Number of URLs queued since the start (never above `max_urls`)
    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    /// Number of URLs waiting in the queue of the current depth
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

fn sampling_seed(site_id: u32, depth: u32) -> u64 {
    (u64::from(site_id) << 32) | u64::from(depth)
}
