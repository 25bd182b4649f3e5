//! Consumer group identity.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default prefix for time-derived consumer groups.
pub const DEFAULT_GROUP_PREFIX: &str = "orders-consumer-group";

/// How the consumer group id is chosen.
///
/// - `Fixed`: the same group across restarts; consumption resumes from the last
///   committed offset.
/// - `Ephemeral`: a fresh group per process start (`<prefix>-<unix seconds>`); with
///   `auto.offset.reset=earliest` every start reprocesses the retained topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupIdentity {
    /// Use this group id verbatim.
    Fixed(String),
    /// Derive a new group id from the start time.
    Ephemeral {
        /// Prefix before the timestamp
        prefix: String,
    },
}

impl GroupIdentity {
    /// `Fixed` when `configured` is set and non-blank, otherwise `Ephemeral` with the
    /// default prefix.
    #[must_use]
    pub fn from_config(configured: Option<&str>) -> Self {
        match configured.map(str::trim) {
            Some(group) if !group.is_empty() => Self::Fixed(group.to_string()),
            _ => Self::Ephemeral {
                prefix: DEFAULT_GROUP_PREFIX.to_string(),
            },
        }
    }

    /// Resolve to a concrete group id using the current time.
    #[must_use]
    pub fn resolve(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.resolve_at(now)
    }

    /// Resolve to a concrete group id as if the current time were `unix_secs`.
    #[must_use]
    pub fn resolve_at(&self, unix_secs: u64) -> String {
        match self {
            Self::Fixed(group) => group.clone(),
            Self::Ephemeral { prefix } => format!("{prefix}-{unix_secs}"),
        }
    }

    /// Whether committed offsets survive a restart.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

impl Default for GroupIdentity {
    fn default() -> Self {
        Self::from_config(None)
    }
}

impl fmt::Display for GroupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(group) => write!(f, "{group}"),
            Self::Ephemeral { prefix } => write!(f, "{prefix}-<start time>"),
        }
    }
}
