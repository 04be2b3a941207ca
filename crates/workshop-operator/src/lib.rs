//! # Workshop Kubernetes Operator
//!
//! Kubernetes operator that provisions multi-component training workshop
//! environments on OpenShift from a single declarative `Workshop` resource.
//!
//! A `Workshop` lists which optional infrastructure components the workshop
//! needs (secrets manager, source control, CI pipelines, service mesh, IDE,
//! collaborative pad, artifact registry, lab guide, ...). The operator
//! installs every enabled component and records per-component status.
//!
//! ## Features
//!
//! - **Idempotent provisioning**: every pass may re-run any step; objects
//!   that already exist are left untouched
//! - **Ordered installation**: within a component, namespace, configuration,
//!   identity, policy grant, role binding, service and workload are created
//!   in that order
//! - **Failure isolation**: one failing component never blocks the others
//! - **Shared policy safety**: service accounts are added to cluster-wide
//!   SecurityContextConstraints with read-merge-write under optimistic
//!   concurrency, never removing other members
//! - **Monotonic status**: a component is marked `Installed` only after its
//!   whole plan succeeded, and never regresses
//! - **Observability**: Prometheus-compatible operator metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use workshop_operator::prelude::*;
//! use kube::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::try_default().await?;
//!     run_controller(client, OperatorConfig::default()).await
//! }
//! ```
//!
//! ## Architecture
//!
//! 1. **Watch**: the controller watches cluster-scoped `Workshop` resources
//! 2. **Plan**: each enabled [`components::Component`] builds a declarative
//!    [`provisioner::ComponentPlan`] from resource [`factory`] builders
//! 3. **Provision**: the [`provisioner::Provisioner`] runs the plan against
//!    an [`store::ObjectStore`]
//! 4. **Status**: [`status::mark_installed`] records the component
//!
//! ## Modules
//!
//! - [`crd`] - `Workshop` Custom Resource Definition with validation
//! - [`controller`] - Controller setup, error policy and metrics
//! - [`reconciler`] - The reconcile pass over all components
//! - [`components`] - Per-component provisioning plans
//! - [`provisioner`] - Plan execution
//! - [`policy`] - Shared security-policy membership
//! - [`status`] - Status tracking
//! - [`factory`] - Kubernetes resource builders
//! - [`store`] - Cluster object store abstraction
//! - [`config`] - Runtime configuration
//! - [`error`] - Error types for operator operations
//!
//! ## Custom Resource Definition
//!
//! ```yaml
//! apiVersion: workshop.openshift.io/v1alpha1
//! kind: Workshop
//! metadata:
//!   name: cloud-native
//! spec:
//!   user:
//!     number: 20
//!     password: openshift
//!   source:
//!     gitURL: https://github.com/example/cloud-native-workshop
//!     gitBranch: main
//!   infrastructure:
//!     project:
//!       enabled: true
//!       stagingName: staging
//!     gitea:
//!       enabled: true
//!     vault:
//!       enabled: true
//!     pipeline:
//!       enabled: true
//!       operatorHub:
//!         channel: stable
//! ```
//!
//! ## Metrics
//!
//! - `workshop_operator_reconciliations_total` - Total reconciliation attempts
//! - `workshop_operator_reconciliation_errors_total` - Reconciliation errors
//! - `workshop_operator_reconciliation_duration_seconds` - Reconciliation latency
//! - `workshop_operator_components_installed_total` - Components promoted to `Installed`

pub mod components;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod factory;
pub mod policy;
pub mod provisioner;
pub mod reconciler;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub mod prelude {
    //! Re-exports for convenient usage
    pub use crate::components::{Component, DerivedParameters};
    pub use crate::config::OperatorConfig;
    pub use crate::controller::{run_controller, ControllerContext, ControllerMetrics};
    pub use crate::crd::{InfrastructureSpec, Workshop, WorkshopSpec, WorkshopStatus};
    pub use crate::error::{OperatorError, Result};
    pub use crate::policy::{grant_if_absent, GrantOutcome};
    pub use crate::provisioner::{ComponentPlan, ProvisionReport, Provisioner, Step};
    pub use crate::reconciler::{PassReport, Reconciler};
    pub use crate::status::mark_installed;
    pub use crate::store::{KubeStore, ObjectStore, ResourceDescription, ResourceKind};
}
