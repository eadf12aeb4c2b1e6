use std::fmt;

use crate::model::Quarter;

/// Fetch error taxonomy.
///
/// Only `Transport` is retried, and only within the session's fixed delay
/// schedule. Field-level extraction problems never become errors; they
/// degrade to `None` at the point of parsing.
#[derive(Debug)]
pub enum FetchError {
    /// Could not reach the automation backend (connection refused, timeout).
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The scripted login landed on the error page or stayed on the login
    /// page. Credentials are assumed invalid; never retried.
    Authentication { final_url: String },
    /// The verified student identity differs from the requested one.
    IdentityMismatch { requested: String, detected: String },
    /// The automation backend ran the script but reported a script-level
    /// error.
    Backend { message: String },
    /// A single quarter could not be fetched. Non-fatal to the whole fetch.
    PeriodUnavailable { quarter: Quarter, reason: String },
    /// Zero quarters could be retrieved.
    FetchFailed { message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport { source } => {
                write!(f, "automation backend unreachable: {}", source)
            }
            FetchError::Authentication { final_url } => {
                write!(f, "login failed (final url: {})", final_url)
            }
            FetchError::IdentityMismatch {
                requested,
                detected,
            } => {
                write!(
                    f,
                    "student id mismatch: requested {}, portal selected {}",
                    requested, detected
                )
            }
            FetchError::Backend { message } => {
                write!(f, "browser automation error: {}", message)
            }
            FetchError::PeriodUnavailable { quarter, reason } => {
                write!(f, "quarter {} unavailable: {}", quarter, reason)
            }
            FetchError::FetchFailed { message } => {
                write!(f, "fetch failed: {}", message)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl FetchError {
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        FetchError::Transport {
            source: Box::new(source),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        FetchError::Backend {
            message: message.into(),
        }
    }

    pub fn period_unavailable(quarter: Quarter, reason: impl Into<String>) -> Self {
        FetchError::PeriodUnavailable {
            quarter,
            reason: reason.into(),
        }
    }

    /// Whether the retry schedule applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Result alias for the fetch pipeline.
pub type Result<T> = std::result::Result<T, FetchError>;
