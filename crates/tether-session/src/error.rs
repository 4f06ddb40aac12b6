//! Error types for the session layer.

/// Why an authentication check did not produce a signed-in user.
///
/// Only [`AuthRejected`](Self::AuthRejected) costs the user their stored
/// credential. Everything else leaves it in place so a later check can
/// succeed without logging in again.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No credential is stored. The expected state for a visitor who
    /// never logged in; the backend is not contacted.
    #[error("no stored credential")]
    NoCredential,

    /// The backend answered but reports no valid session
    /// (`success: false` or a missing profile). The credential is kept.
    #[error("backend reports no authenticated user")]
    NotAuthenticated,

    /// The backend rejected the credential as invalid or expired. The
    /// credential has been deleted.
    #[error("credential rejected by backend (HTTP {status})")]
    AuthRejected {
        /// The HTTP status the backend answered with.
        status: u16,
    },

    /// The backend could not be reached or answered with an unexpected
    /// status. The credential is kept.
    #[error("could not verify session: {0}")]
    TransientFailure(#[source] ApiError),

    /// Reading or writing the credential store failed.
    #[error("credential storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// A logout (or a new credential) landed while this check was in
    /// flight, so its result was discarded.
    #[error("auth check superseded by a newer session change")]
    Superseded,
}

/// Errors at the HTTP boundary with the backend's auth endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 401 or 403: the credential is invalid or expired.
    #[error("credential rejected (HTTP {status})")]
    Rejected {
        /// The HTTP status.
        status: u16,
    },

    /// Any other non-2xx status.
    #[error("unexpected HTTP status {status}")]
    Status {
        /// The HTTP status.
        status: u16,
    },

    /// The request could not be sent, timed out, or its body could not
    /// be decoded.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    /// `true` if the backend explicitly rejected the credential.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Maps a non-2xx status to the matching error.
    pub(crate) fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Rejected { status },
            _ => Self::Status { status },
        }
    }
}
