//! Component provisioning template
//!
//! Every component is installed by the same procedure: an ordered list of
//! [`Step`]s is executed front to back. An `Ensure` step creates an object
//! unless it already exists; a `Grant` step adds a principal to a shared
//! security policy. The first hard failure stops the plan. Whatever was
//! created before it stays, and the next reconcile pass runs the whole plan
//! again from the top.

use crate::error::{OperatorError, Result};
use crate::policy::{grant_if_absent, parse_service_account_principal, GrantOutcome};
use crate::store::{ObjectStore, ResourceDescription, ResourceKind};
use tracing::{debug, info, warn};

/// Default bound for in-pass policy conflict retries
pub const DEFAULT_CONFLICT_RETRIES: u32 = 5;

/// One provisioning step
#[derive(Debug, Clone)]
pub enum Step {
    /// Create the object if it does not exist
    Ensure(ResourceDescription),
    /// Add `principal` to the shared policy `policy`
    Grant { policy: String, principal: String },
}

impl Step {
    pub fn ensure(resource: ResourceDescription) -> Self {
        Step::Ensure(resource)
    }

    pub fn grant(policy: &str, principal: impl Into<String>) -> Self {
        Step::Grant {
            policy: policy.to_string(),
            principal: principal.into(),
        }
    }
}

/// The ordered steps that install one component
#[derive(Debug, Clone)]
pub struct ComponentPlan {
    component: String,
    steps: Vec<Step>,
}

impl ComponentPlan {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            steps: Vec::new(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn ensure(mut self, resource: ResourceDescription) -> Self {
        self.steps.push(Step::ensure(resource));
        self
    }

    pub fn grant(mut self, policy: &str, principal: impl Into<String>) -> Self {
        self.steps.push(Step::grant(policy, principal));
        self
    }

    /// Check the step ordering contract.
    ///
    /// A grant to a service account must come after the step that ensures
    /// that service account, so a pod can never be admitted under an
    /// identity the policy does not know yet.
    pub fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            let Step::Grant { principal, .. } = step else {
                continue;
            };
            let Some((namespace, name)) = parse_service_account_principal(principal) else {
                continue;
            };
            let ensured_before = self.steps[..index].iter().any(|earlier| {
                matches!(
                    earlier,
                    Step::Ensure(r) if r.kind == ResourceKind::ServiceAccount
                        && r.name() == name
                        && r.namespace() == Some(namespace)
                )
            });
            if !ensured_before {
                return Err(OperatorError::InvalidPlan {
                    component: self.component.clone(),
                    reason: format!(
                        "grant of {} at step {} precedes its service account",
                        principal, index
                    ),
                });
            }
        }
        Ok(())
    }
}

/// What a plan run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Objects newly created
    pub created: usize,
    /// Objects found already present
    pub existing: usize,
    /// Principals newly added to a policy
    pub granted: usize,
}

impl ProvisionReport {
    /// Whether the run changed anything in the cluster
    pub fn changed(&self) -> bool {
        self.created > 0 || self.granted > 0
    }
}

/// Executes component plans against an [`ObjectStore`]
#[derive(Debug, Clone, Copy)]
pub struct Provisioner {
    conflict_retries: u32,
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_RETRIES)
    }
}

impl Provisioner {
    pub fn new(conflict_retries: u32) -> Self {
        Self { conflict_retries }
    }

    /// Run `plan` to completion or to its first failing step
    pub async fn run<S>(&self, store: &S, plan: &ComponentPlan) -> Result<ProvisionReport>
    where
        S: ObjectStore + ?Sized,
    {
        plan.validate()?;

        let mut report = ProvisionReport::default();
        for (index, step) in plan.steps().iter().enumerate() {
            let outcome = match step {
                Step::Ensure(resource) => self.ensure(store, resource, &mut report).await,
                Step::Grant { policy, principal } => {
                    match grant_if_absent(store, policy, principal, self.conflict_retries).await {
                        Ok(GrantOutcome::Granted { .. }) => {
                            report.granted += 1;
                            Ok(())
                        }
                        Ok(GrantOutcome::AlreadyPresent) => Ok(()),
                        Err(e) => Err(e),
                    }
                }
            };

            if let Err(e) = outcome {
                warn!(
                    component = %plan.component(),
                    step = index,
                    error = %e,
                    "Provisioning step failed"
                );
                return Err(e);
            }
        }

        if report.changed() {
            info!(
                component = %plan.component(),
                created = report.created,
                existing = report.existing,
                granted = report.granted,
                "Component provisioned"
            );
        } else {
            debug!(component = %plan.component(), "Component already converged");
        }

        Ok(report)
    }

    async fn ensure<S>(
        &self,
        store: &S,
        resource: &ResourceDescription,
        report: &mut ProvisionReport,
    ) -> Result<()>
    where
        S: ObjectStore + ?Sized,
    {
        match store.create(resource).await {
            Ok(_) => {
                debug!(resource = %resource.key(), "Created");
                report.created += 1;
                Ok(())
            }
            // Existing objects are left as they are
            Err(e) if e.is_already_exists() => {
                report.existing += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
