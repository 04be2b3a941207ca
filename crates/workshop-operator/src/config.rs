//! Operator runtime configuration

use crate::error::{OperatorError, Result};
use crate::provisioner::DEFAULT_CONFLICT_RETRIES;
use crate::store::KubeStoreConfig;
use std::time::Duration;

/// Default timeout for a single cluster call
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Settings shared by every reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Wildcard application domain. When unset it is read from the
    /// cluster ingress configuration on every pass.
    pub apps_domain: Option<String>,
    /// Upper bound for a single cluster call
    pub operation_timeout: Duration,
    /// Re-merge attempts after a shared-policy version conflict
    pub conflict_retries: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            apps_domain: None,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl OperatorConfig {
    /// Set the application domain; an empty string means "discover"
    pub fn with_apps_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.apps_domain = (!domain.trim().is_empty()).then(|| domain.trim().to_string());
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout.is_zero() {
            return Err(OperatorError::InvalidConfig(
                "operation timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(domain) = &self.apps_domain {
            if domain.starts_with('.') || domain.contains(char::is_whitespace) {
                return Err(OperatorError::InvalidConfig(format!(
                    "'{}' is not a valid application domain",
                    domain
                )));
            }
        }
        Ok(())
    }

    /// Settings for the cluster-backed store
    pub fn store_config(&self) -> KubeStoreConfig {
        KubeStoreConfig {
            operation_timeout: self.operation_timeout,
        }
    }
}
