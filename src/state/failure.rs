use std::fmt;

/// Kind of a non-fatal failure, logged as the `kind` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Reachability probe could not complete
    ProbeFailure,

    /// Navigation failed or the browser crashed
    LoadFailure,

    /// Reading the DOM, markers or console failed
    HarvestFailure,

    /// A login routine raised or the session state was rejected
    AuthFailure,

    /// Writing an artifact failed
    PersistFailure,

    /// The crawl ran out of wall-clock budget
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProbeFailure => "probe_failure",
            Self::LoadFailure => "load_failure",
            Self::HarvestFailure => "harvest_failure",
            Self::AuthFailure => "auth_failure",
            Self::PersistFailure => "persist_failure",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
