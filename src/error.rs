//! Error types for the federated VM locator.

use thiserror::Error;

/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for federation search and listing operations.
///
/// A `find` call resolves with the precedence: found result, then the last
/// recorded failure, then [`Error::NotFound`].
#[derive(Error, Debug)]
pub enum Error {
    /// The search key was blank before normalization.
    ///
    /// Returned before any backend call is made.
    #[error("search key is empty")]
    EmptyKey,

    /// A tenant session could not be established after bounded retries.
    ///
    /// Surfaced only when nothing was found and no lookup failure was
    /// recorded after it.
    #[error("connection failed: {0}")]
    Connection(#[source] BackendError),

    /// A remote VM query failed for a reason other than absence.
    #[error("lookup failed: {0}")]
    Lookup(#[source] BackendError),

    /// The search drained every reachable (tenant, datacenter) pair without
    /// a match and without recording any other failure.
    #[error("no virtual machine matched the search key")]
    NotFound,

    /// The caller-supplied deadline elapsed before the search resolved.
    #[error("operation timed out")]
    Timeout,

    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for the distinguished exhaustive-search-miss outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Errors produced at the virtualization-backend boundary.
///
/// [`BackendError::NotFound`] is the distinguished absence value: a VM (or a
/// named datacenter) simply is not present at the queried scope. The search
/// engine never treats it as a failure.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Login to the VC endpoint failed.
    #[error("connect failed to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    /// The session is no longer accepted by the endpoint.
    #[error("session rejected by {endpoint}")]
    SessionRejected { endpoint: String },

    /// The credentials were rejected at login.
    #[error("invalid credentials for {endpoint}")]
    InvalidCredentials { endpoint: String },

    /// The queried object is not present at this scope.
    #[error("not found")]
    NotFound,

    /// The remote query failed.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl BackendError {
    /// True if this error means "absent here", not "something broke".
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguished() {
        assert!(BackendError::NotFound.is_not_found());
        assert!(!BackendError::QueryFailed("boom".into()).is_not_found());
        assert!(Error::NotFound.is_not_found());
        assert!(!Error::EmptyKey.is_not_found());
    }

    #[test]
    fn error_display() {
        let err = Error::Connection(BackendError::ConnectFailed {
            endpoint: "vc-1.example.com".into(),
            reason: "refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "connection failed: connect failed to vc-1.example.com: refused"
        );
    }
}
