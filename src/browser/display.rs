use crate::browser::BrowserError;
use crate::config::BrowserConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Virtual framebuffer for non-headless browsers
///
/// `Xvfb` wraps an X server child process for the lifetime of the crawl.
/// The process environment is left alone: browsers reach the server through
/// the `DISPLAY` variable their factory sets on the child (see
/// [`VirtualDisplay::display_name`]). `Null` is used everywhere else and
/// does nothing on `start`/`stop`.
#[derive(Debug)]
pub enum VirtualDisplay {
    Xvfb { child: Child, name: String },
    Null,
}

impl VirtualDisplay {
    /// Returns true if this platform and configuration call for Xvfb
    pub fn wanted(config: &BrowserConfig) -> bool {
        cfg!(target_os = "linux") && !config.headless && config.virtual_display
    }

    /// The X display browsers must be launched on, if one is wanted
    pub fn display_name(config: &BrowserConfig) -> Option<String> {
        Self::wanted(config).then(|| format!(":{}", config.display_number))
    }

    /// Starts the display appropriate for `config`
    pub async fn start(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let Some(name) = Self::display_name(config) else {
            debug!("Virtual display not needed");
            return Ok(Self::Null);
        };
        let screen = format!("{}x{}x24", config.window_width, config.window_height);

        let mut child = Command::new("Xvfb")
            .args([name.as_str(), "-screen", "0", screen.as_str(), "-nolisten", "tcp"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::Display(format!("failed to spawn Xvfb: {}", e)))?;

        // give the server a moment to bind the display socket
        tokio::time::sleep(Duration::from_millis(500)).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(BrowserError::Display(format!(
                "Xvfb {} exited early with {}",
                name, status
            )));
        }

        info!(display_name = %name, screen = %screen, "Started virtual display");

        Ok(Self::Xvfb { child, name })
    }

    /// Stops the display
    pub async fn stop(self) {
        if let Self::Xvfb { mut child, name } = self {
            if let Err(e) = child.kill().await {
                warn!(display_name = %name, "Failed to stop Xvfb: {}", e);
            }
            info!(display_name = %name, "Stopped virtual display");
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}
