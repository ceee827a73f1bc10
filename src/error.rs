/// Boxed error returned by caller-supplied transforms and retry decisions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by the host request primitive for one attempt.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportFailure {
    /// Host error message, e.g. `request:fail abort`.
    pub message: String,
    /// Whether the attempt was cut off by the per-attempt timeout.
    pub timeout: bool,
}

impl TransportFailure {
    /// Non-timeout failure with the host's message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    pub(crate) fn timed_out(timeout_ms: u64) -> Self {
        Self {
            message: format!("request:fail timeout after {timeout_ms} ms"),
            timeout: true,
        }
    }

    pub(crate) fn aborted() -> Self {
        Self::new("request:fail abort")
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Invalid configuration, or a send/response transform failed. Never retried.
    #[error("configuration error: {0}")]
    Configuration(BoxError),
    /// The transport reported failure and the retry policy gave up.
    #[error("transport error: {0}")]
    Transport(TransportFailure),
    /// The request's cancel token was triggered.
    #[error("request cancelled: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Cancelled { reason: Option<String> },
    /// A retry decision function failed; no further attempts are made.
    #[error("retry decision error: {0}")]
    RetryDecision(BoxError),
}

impl RequestError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Configuration(message.into())
    }

    /// Whether the request settled because its cancel token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestError, TransportFailure};

    #[test]
    fn cancelled_display_includes_reason() {
        let err = RequestError::Cancelled {
            reason: Some("user left".to_owned()),
        };
        assert_eq!(err.to_string(), "request cancelled: user left");
        assert!(err.is_cancelled());
    }

    #[test]
    fn failure_displays_its_message_and_is_an_error() {
        let failure = TransportFailure::timed_out(250);
        assert_eq!(failure.to_string(), "request:fail timeout after 250 ms");
        let as_error: &dyn std::error::Error = &failure;
        assert!(as_error.source().is_none());
    }

    #[test]
    fn transport_display_uses_host_message() {
        let err = RequestError::Transport(TransportFailure::new("request:fail"));
        assert_eq!(err.to_string(), "transport error: request:fail");
    }
}
