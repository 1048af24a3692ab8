use thiserror::Error;

/// Why a single lookup did not produce a report.
///
/// Every variant carries a message that is safe to show to the user. None of
/// them is fatal: the client stays usable after any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Rejected locally before any request was issued (e.g. empty search).
    #[error("{0}")]
    Validation(String),

    /// Network unreachable, timeout, or a body that could not be parsed.
    #[error("{0}")]
    Transport(String),

    /// The provider answered but refused the request (unknown city, bad key...).
    #[error("{0}")]
    Provider(String),

    /// Geolocation denied or unavailable. Never shown as a blocking error.
    #[error("{0}")]
    Capability(String),
}

impl LookupError {
    pub fn message(&self) -> &str {
        match self {
            LookupError::Validation(m)
            | LookupError::Transport(m)
            | LookupError::Provider(m)
            | LookupError::Capability(m) => m,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::Validation(_) => "validation",
            LookupError::Transport(_) => "transport",
            LookupError::Provider(_) => "provider",
            LookupError::Capability(_) => "capability",
        }
    }
}
