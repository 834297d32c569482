//! Authentication module
//!
//! A site may declare labeled session states. Each state wraps a login
//! routine that drives a fresh browser until the session cookies exist.
//! Routines are registered per site in an [`AuthRegistry`], either from the
//! configuration file ([`FormLogin`]) or programmatically.
//!
//! Login failures are never fatal: the crawl continues unauthenticated.

mod form;
mod registry;

use crate::browser::{BrowserError, Driver};
use crate::config::is_valid_label;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use form::FormLogin;
pub use registry::AuthRegistry;

/// Label of a crawl run without any session state
pub const ANONYMOUS_LABEL: &str = "anonymous";

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid session label '{0}': only A-Z, a-z, 0-9 and '-' are allowed")]
    InvalidLabel(String),

    #[error("Site {site_id} has no session state labeled '{label}'")]
    UnknownState { site_id: u32, label: String },

    #[error("Login step failed: {0}")]
    Step(#[from] BrowserError),
}

/// A login routine
///
/// Invoked at most once per browser session, right after the browser is
/// built. It must leave the driver logged in and tolerate being replayed on
/// a browser whose cookies were cleared.
#[async_trait]
pub trait LoginRoutine: Send + Sync {
    async fn run(&self, driver: &mut dyn Driver) -> Result<(), AuthError>;
}

/// A named, reproducible authenticated browser configuration
#[derive(Clone)]
pub struct SessionState {
    label: String,
    routine: Arc<dyn LoginRoutine>,
}

impl SessionState {
    /// Creates a session state
    ///
    /// # Returns
    ///
    /// * `Ok(SessionState)` - The label matches `[A-Za-z0-9-]+`
    /// * `Err(AuthError::InvalidLabel)` - Underscores, spaces, empty, ...
    pub fn new(label: impl Into<String>, routine: Arc<dyn LoginRoutine>) -> Result<Self, AuthError> {
        let label = label.into();
        if !is_valid_label(&label) {
            return Err(AuthError::InvalidLabel(label));
        }
        Ok(Self { label, routine })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the login routine against `driver`
    pub async fn apply(&self, driver: &mut dyn Driver) -> Result<(), AuthError> {
        self.routine.run(driver).await
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
