//! Error taxonomy for the fleet accessor and the reconciliation pass.

use thiserror::Error;

/// Errors surfaced by the fleet accessor and the components built on it.
#[derive(Debug, Error)]
pub enum FleetError {
    /// The queried unit does not exist in the cluster.
    #[error("unit not found: {0}")]
    NotFound(String),

    /// A stability-polling wait exceeded its ceiling.
    #[error("timed out waiting for unit to reach a stable state")]
    Timeout,

    /// Non-success response from the cluster API.
    #[error("fleet API error {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection-level failure talking to the cluster API.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured endpoint URL is unusable.
    #[error("invalid fleet endpoint: {0}")]
    InvalidEndpoint(String),
}

impl FleetError {
    /// Whether retrying the operation may succeed.
    ///
    /// Connection failures and server-side errors are considered transient;
    /// not-found, client errors and decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FleetError::Transport(_) => true,
            FleetError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FleetError::Timeout)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FleetError::NotFound(_))
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        FleetError::Transport(err.to_string())
    }
}

impl From<hyper::Error> for FleetError {
    fn from(err: hyper::Error) -> Self {
        FleetError::Transport(err.to_string())
    }
}

impl From<hyper::http::Error> for FleetError {
    fn from(err: hyper::http::Error) -> Self {
        FleetError::Transport(err.to_string())
    }
}

/// Container combining independent failures from concurrent tasks.
///
/// Never constructed empty; callers with nothing to report return `Ok(())`.
#[derive(Debug)]
pub struct AggregateError(pub Vec<FleetError>);

impl std::error::Error for AggregateError {}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s): ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl AggregateError {
    /// Wrap the collected errors, or `Ok(())` when there are none.
    pub fn into_result(errors: Vec<FleetError>) -> Result<(), AggregateError> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AggregateError(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FleetError::Transport("connection refused".into()).is_transient());
        assert!(FleetError::Http {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!FleetError::Http {
            status: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!FleetError::NotFound("a.service".into()).is_transient());
        assert!(!FleetError::Timeout.is_transient());
    }

    #[test]
    fn test_kind_predicates() {
        assert!(FleetError::Timeout.is_timeout());
        assert!(FleetError::NotFound("a.service".into()).is_not_found());
        assert!(!FleetError::Timeout.is_not_found());
    }

    #[test]
    fn test_aggregate_display() {
        let agg = AggregateError(vec![
            FleetError::Timeout,
            FleetError::NotFound("a.service".into()),
        ]);
        let text = agg.to_string();
        assert!(text.starts_with("2 error(s)"));
        assert!(text.contains("a.service"));
    }

    #[test]
    fn test_aggregate_into_result() {
        assert!(AggregateError::into_result(vec![]).is_ok());
        assert!(AggregateError::into_result(vec![FleetError::Timeout]).is_err());
    }
}
