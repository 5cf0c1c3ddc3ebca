use serde::Serialize;

/// Why a prediction request failed. Every variant is terminal for the
/// submission that produced it; there is no automatic retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    /// Network unreachable, DNS failure, connection refused.
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Non-2xx status. `body` is the raw response text.
    #[error("Server error: {status} {body}")]
    Server { status: u16, body: String },

    /// 2xx, but the body is not valid JSON or lacks required fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Which side the failure is attributed to in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ClientError,
    ServerError,
}

impl PredictionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Server { .. } => FailureKind::ServerError,
            Self::Transport(_) | Self::Timeout { .. } | Self::MalformedResponse(_) => {
                FailureKind::ClientError
            }
        }
    }

    /// Stable machine-readable code for the frontend.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Server { .. } => "server",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_message_carries_status_and_body() {
        let err = PredictionError::Server {
            status: 500,
            body: "internal error".into(),
        };
        assert_eq!(err.to_string(), "Server error: 500 internal error");
        assert_eq!(err.kind(), FailureKind::ServerError);
    }

    #[test]
    fn malformed_is_distinct_from_transport() {
        let malformed = PredictionError::MalformedResponse("expected value".into());
        let transport = PredictionError::Transport("connection refused".into());
        assert_eq!(malformed.kind(), FailureKind::ClientError);
        assert_eq!(transport.kind(), FailureKind::ClientError);
        assert_ne!(malformed.code(), transport.code());
        assert_ne!(malformed.to_string(), transport.to_string());
    }

    #[test]
    fn timeout_is_a_client_error() {
        let err = PredictionError::Timeout { secs: 30 };
        assert_eq!(err.kind(), FailureKind::ClientError);
        assert_eq!(err.to_string(), "Request timed out after 30s");
    }
}
