//! Error types for the Workshop Kubernetes Operator

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during operator operations
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Kubernetes API error that has no more specific classification
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Create rejected because the key is already occupied
    #[error("{kind}/{name} already exists")]
    AlreadyExists { kind: String, name: String },

    /// Optimistic-concurrency collision: the stored version moved since it was read
    #[error("Conflict writing {kind}/{name}: resource version is stale")]
    Conflict { kind: String, name: String },

    /// A hard prerequisite is missing from the cluster
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A component plan violates the step ordering contract
    #[error("Invalid provisioning plan for {component}: {reason}")]
    InvalidPlan { component: String, reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperatorError::KubeError(_)
                | OperatorError::Conflict { .. }
                | OperatorError::NotFound { .. }
                | OperatorError::Timeout(_)
        )
    }

    /// Whether this error only means the target has already converged
    pub fn is_already_exists(&self) -> bool {
        matches!(self, OperatorError::AlreadyExists { .. })
    }

    /// Whether this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict { .. })
    }

    /// Get a suggested requeue delay for retryable errors
    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            // Conflicts clear as soon as the competing writer is done
            OperatorError::Conflict { .. } => Some(Duration::from_secs(5)),
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }
}
