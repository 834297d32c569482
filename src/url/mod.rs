//! URL handling module
//!
//! This module provides URL canonicalization, registrable-domain extraction
//! and the admission policy applied to every discovered link.

mod domain;
mod filter;
mod normalize;

// Re-export main functions
pub use domain::registrable_domain;
pub use filter::{Rejection, UrlFilter, BLOCKED_SUFFIXES};
pub use normalize::{canonicalize, canonicalize_url};
