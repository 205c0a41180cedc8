//! Normalised lifecycle state derived from raw compute statuses.

use std::fmt;

/// Status the compute API reports once a server is usable.
pub const READY_STATUS: &str = "ACTIVE";

/// Provider-agnostic view of an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    /// No server exists or none has been queried.
    None,
    /// The server is building or rebooting.
    Starting,
    /// The server is up.
    Running,
    /// The server is suspended or paused.
    Paused,
    /// The server is shut off or deleted.
    Stopped,
    /// The provider reports a fault.
    Error,
    /// The provider returned a status this crate does not recognise.
    Unknown(String),
}

impl LifecycleState {
    /// Maps a compute API status onto the normalised enumeration.
    ///
    /// Matching ignores ASCII case and surrounding whitespace. Unrecognised
    /// values become [`LifecycleState::Unknown`] rather than an error.
    #[must_use]
    pub fn from_provider_status(raw: &str) -> Self {
        let status = raw.trim().to_ascii_uppercase();
        match status.as_str() {
            "BUILD" | "REBUILD" | "REBOOT" | "HARD_REBOOT" => Self::Starting,
            "ACTIVE" => Self::Running,
            "SUSPENDED" | "PAUSED" => Self::Paused,
            "SHUTOFF" | "DELETED" => Self::Stopped,
            "ERROR" => Self::Error,
            _ => Self::Unknown(raw.trim().to_owned()),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Starting => f.write_str("Starting"),
            Self::Running => f.write_str("Running"),
            Self::Paused => f.write_str("Paused"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Error => f.write_str("Error"),
            Self::Unknown(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}
