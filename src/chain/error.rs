use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classified cause of a failed contract read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    NetworkError,
    ContractReverted,
    MalformedResponse,
}

impl FailureReason {
    /// Worth one more try against the same endpoint.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureReason::Timeout | FailureReason::NetworkError)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Timeout => "timed out",
            FailureReason::NetworkError => "network error",
            FailureReason::ContractReverted => "contract call reverted",
            FailureReason::MalformedResponse => "malformed response",
        };
        f.write_str(text)
    }
}

/// A failed chain call. `Display` shows only the classified reason; the
/// underlying error text is kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain call failed: {reason}")]
pub struct ChainCallError {
    reason: FailureReason,
    diagnostic: String,
}

impl ChainCallError {
    pub fn new(reason: FailureReason, diagnostic: impl Into<String>) -> Self {
        Self {
            reason,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn timeout(method: &str) -> Self {
        Self::new(FailureReason::Timeout, format!("{} exceeded call timeout", method))
    }

    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_diagnostic() {
        let err = ChainCallError::new(
            FailureReason::NetworkError,
            "error sending request for url (https://rpc.example/secret-key)",
        );
        assert_eq!(err.to_string(), "chain call failed: network error");
        assert!(err.diagnostic().contains("secret-key"));
    }

    #[test]
    fn test_transient_reasons() {
        assert!(FailureReason::Timeout.is_transient());
        assert!(FailureReason::NetworkError.is_transient());
        assert!(!FailureReason::ContractReverted.is_transient());
        assert!(!FailureReason::MalformedResponse.is_transient());
    }
}
