use crate::auth::{AuthError, LoginRoutine};
use crate::browser::Driver;
use crate::config::{LoginStep, StateEntry};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Login routine made of ordered UI steps
///
/// Navigates to the login page, lets it settle, then performs each step in
/// order. Configured from `[[site.state]]` tables.
#[derive(Debug, Clone)]
pub struct FormLogin {
    login_url: String,
    settle: Duration,
    steps: Vec<LoginStep>,
}

impl FormLogin {
    pub fn new(login_url: impl Into<String>, settle: Duration, steps: Vec<LoginStep>) -> Self {
        Self {
            login_url: login_url.into(),
            settle,
            steps,
        }
    }

    pub fn from_entry(entry: &StateEntry) -> Self {
        Self::new(
            entry.login_url.clone(),
            Duration::from_secs(entry.settle),
            entry.steps.clone(),
        )
    }
}

#[async_trait]
impl LoginRoutine for FormLogin {
    async fn run(&self, driver: &mut dyn Driver) -> Result<(), AuthError> {
        driver.navigate(&self.login_url).await?;
        tokio::time::sleep(self.settle).await;

        for (i, step) in self.steps.iter().enumerate() {
            debug!(step = i, "Login step {:?}", step);
            match step {
                LoginStep::Fill { selector, value } => driver.fill(selector, value).await?,
                LoginStep::Click { selector } => driver.click(selector).await?,
                LoginStep::Wait { seconds } => {
                    tokio::time::sleep(Duration::from_secs(*seconds)).await
                }
                LoginStep::Navigate { url } => driver.navigate(url).await?,
            }
        }

        Ok(())
    }
}
