//! Error types for playmanity-session

use thiserror::Error;

/// Server error code meaning the backend holds no record of the session
pub const NO_ACTIVE_SESSION: &str = "NO_ACTIVE_SESSION";

/// Errors that can occur while talking to the Playmanity backend
#[derive(Debug, Error)]
pub enum SessionError {
    /// Missing auth token or invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure (connect, DNS, non-2xx status without an error body)
    #[error("Transport error on '{endpoint}': {reason}")]
    Transport {
        endpoint: String,
        reason: String,
    },

    /// Request exceeded its deadline
    #[error("Request to '{endpoint}' timed out after {secs}s")]
    Timeout {
        endpoint: String,
        secs: u64,
    },

    /// Well-formed error response from the server
    #[error("Server rejected request with {code}: {message}")]
    Rejected {
        code: String,
        message: String,
    },

    /// Malformed JSON body
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// JSON was valid but did not carry the expected fields
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The player refused the device authorization request
    #[error("Authorization denied")]
    AuthDenied,

    /// An advertisement is already being displayed
    #[error("An advertisement is already being displayed")]
    AdInProgress,

    /// Operation was cancelled before completing
    #[error("Operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Build a transport error for an endpoint
    pub fn transport(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error into the failure taxonomy used for retry decisions
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Transport { .. } | Self::Timeout { .. } => ErrorKind::Transport,
            Self::Rejected { .. } => ErrorKind::ServerRejection,
            Self::Parse(_) | Self::InvalidResponse(_) => ErrorKind::Parse,
            Self::AuthDenied | Self::AdInProgress | Self::Cancelled => ErrorKind::Other,
        }
    }

    /// Whether the server reported that it has no record of the session
    pub fn is_no_active_session(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == NO_ACTIVE_SESSION)
    }
}

/// Coarse failure classes
///
/// `Parse` failures are handled exactly like `Transport` failures by the
/// session manager; the distinction only matters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    ServerRejection,
    Parse,
    Other,
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(SessionError::Config("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(
            SessionError::Timeout { endpoint: "/a".into(), secs: 30 }.kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            SessionError::transport("/a", "connection refused").kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            SessionError::InvalidResponse("missing ad".into()).kind(),
            ErrorKind::Parse
        );
        assert_eq!(SessionError::Cancelled.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_no_active_session_detection() {
        let err = SessionError::Rejected {
            code: NO_ACTIVE_SESSION.into(),
            message: "Session expired".into(),
        };
        assert!(err.is_no_active_session());
        assert_eq!(err.kind(), ErrorKind::ServerRejection);

        let other = SessionError::Rejected {
            code: "INVALID_TOKEN".into(),
            message: "bad token".into(),
        };
        assert!(!other.is_no_active_session());
    }

    #[test]
    fn test_display_messages() {
        let err = SessionError::transport("/games/sessions/initiate", "HTTP 502");
        assert_eq!(
            err.to_string(),
            "Transport error on '/games/sessions/initiate': HTTP 502"
        );
        let err = SessionError::Timeout { endpoint: "/advertisements".into(), secs: 30 };
        assert_eq!(err.to_string(), "Request to '/advertisements' timed out after 30s");
    }
}
