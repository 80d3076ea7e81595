pub mod metrics;
pub mod outcome;
pub mod retry;
pub mod store;

/// Error taxonomy for the storage backend. The transient class (timeouts,
/// dropped connections) is recovered locally by the retrying session layer;
/// everything else is fatal to the invoking workflow iteration.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write timed out")]
    WriteTimeout,

    #[error("read timed out")]
    ReadTimeout,

    #[error("operation timed out")]
    OperationTimeout,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("unexpected result shape: {0}")]
    MissingRow(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient errors are re-issued by the session's retry loop; the rest
    /// propagate immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::WriteTimeout
                | StoreError::ReadTimeout
                | StoreError::OperationTimeout
                | StoreError::ConnectionLost(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::WriteTimeout.is_transient());
        assert!(StoreError::ReadTimeout.is_transient());
        assert!(StoreError::OperationTimeout.is_transient());
        assert!(StoreError::ConnectionLost("reset by peer".into()).is_transient());

        assert!(!StoreError::Query("syntax error".into()).is_transient());
        assert!(!StoreError::MissingRow("no seat row".into()).is_transient());
        assert!(!StoreError::Backend("boom".into()).is_transient());
    }
}
