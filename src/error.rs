//! Error taxonomy
//!
//! Every failure in the crate is classified into one of five kinds so that
//! callers (typically a protocol-rendering layer) can map them to a response
//! without string matching. Local validation failures are raised before any
//! orchestrator call is made, which keeps local and remote causes apart.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An unregistered category, or a resource/orchestrator object that does
    /// not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An action that is not legal in the current state, or a tenant
    /// visibility violation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A malformed request: bad category construction, an undeclared or
    /// immutable attribute write, an illegal mixin combination.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An orchestrator-reported limit. Carries the retry hint from the
    /// `Retry-After` header when one was supplied.
    #[error("quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after: Option<u64>,
    },

    /// An orchestrator call failed for reasons opaque to this layer. The
    /// message is passed through, never swallowed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        Error::Forbidden(what.into())
    }

    pub fn bad_request(what: impl Into<String>) -> Self {
        Error::BadRequest(what.into())
    }

    pub fn upstream(what: impl Into<String>) -> Self {
        Error::Upstream(what.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
