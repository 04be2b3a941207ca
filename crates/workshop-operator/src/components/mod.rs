//! Workshop components
//!
//! Each optional piece of workshop infrastructure is a [`Component`]. A
//! component knows whether the workshop enables it, where its status lives
//! and how to build the [`ComponentPlan`] that installs it. Plans are pure
//! data; nothing in this module talks to the cluster.

mod apps;
mod operators;
mod project;
mod vault;

use crate::crd::{InfrastructureSpec, Workshop, WorkshopStatus, STATUS_INSTALLED};
use crate::factory::Owner;
use crate::provisioner::ComponentPlan;
use std::fmt;

pub use project::user_project;

/// Values computed once per reconcile pass and shared by every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedParameters {
    /// Number of attendee accounts
    pub users: i32,
    /// Password shared by attendee accounts
    pub password: String,
    /// Wildcard domain routes are exposed under
    pub apps_domain: String,
    /// Workshop content repository
    pub git_url: String,
    pub git_branch: String,
}

impl DerivedParameters {
    /// Attendee user names, `user1..userN`
    pub fn user_names(&self) -> impl Iterator<Item = String> {
        (1..=self.users.max(0)).map(|i| format!("user{}", i))
    }

    /// Public host of a route named `name` in `namespace`
    pub fn route_host(&self, name: &str, namespace: &str) -> String {
        format!("{}-{}.{}", name, namespace, self.apps_domain)
    }
}

/// An optional piece of workshop infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Project,
    CertManager,
    ServiceMesh,
    Serverless,
    Pipeline,
    ArgoCd,
    CodeReadyWorkspace,
    Gitea,
    Nexus,
    Etherpad,
    Vault,
    IstioWorkspace,
    Guide,
    Bookbag,
    UsernameDistribution,
}

impl Component {
    /// Reconcile order. Per-user projects come first so later components
    /// can refer to them; the rest are independent of each other.
    pub const ORDER: [Component; 15] = [
        Component::Project,
        Component::CertManager,
        Component::ServiceMesh,
        Component::Serverless,
        Component::Pipeline,
        Component::ArgoCd,
        Component::CodeReadyWorkspace,
        Component::Gitea,
        Component::Nexus,
        Component::Etherpad,
        Component::Vault,
        Component::IstioWorkspace,
        Component::Guide,
        Component::Bookbag,
        Component::UsernameDistribution,
    ];

    /// Field name under `spec.infrastructure` and `status`
    pub fn name(self) -> &'static str {
        match self {
            Component::Project => "project",
            Component::CertManager => "certManager",
            Component::ServiceMesh => "serviceMesh",
            Component::Serverless => "serverless",
            Component::Pipeline => "pipeline",
            Component::ArgoCd => "argocd",
            Component::CodeReadyWorkspace => "codeReadyWorkspace",
            Component::Gitea => "gitea",
            Component::Nexus => "nexus",
            Component::Etherpad => "etherpad",
            Component::Vault => "vault",
            Component::IstioWorkspace => "istioWorkspace",
            Component::Guide => "guide",
            Component::Bookbag => "bookbag",
            Component::UsernameDistribution => "usernameDistribution",
        }
    }

    pub fn is_enabled(self, infra: &InfrastructureSpec) -> bool {
        match self {
            Component::Project => infra.project.enabled,
            Component::CertManager => infra.cert_manager.enabled,
            Component::ServiceMesh => infra.service_mesh.enabled,
            Component::Serverless => infra.serverless.enabled,
            Component::Pipeline => infra.pipeline.enabled,
            Component::ArgoCd => infra.argocd.enabled,
            Component::CodeReadyWorkspace => infra.code_ready_workspace.enabled,
            Component::Gitea => infra.gitea.enabled,
            Component::Nexus => infra.nexus.enabled,
            Component::Etherpad => infra.etherpad.enabled,
            Component::Vault => infra.vault.enabled,
            Component::IstioWorkspace => infra.istio_workspace.enabled,
            Component::Guide => infra.guide.enabled,
            Component::Bookbag => infra.bookbag.enabled,
            Component::UsernameDistribution => infra.username_distribution.enabled,
        }
    }

    pub fn status(self, status: &WorkshopStatus) -> &str {
        match self {
            Component::Project => &status.project,
            Component::CertManager => &status.cert_manager,
            Component::ServiceMesh => &status.service_mesh,
            Component::Serverless => &status.serverless,
            Component::Pipeline => &status.pipeline,
            Component::ArgoCd => &status.argocd,
            Component::CodeReadyWorkspace => &status.code_ready_workspace,
            Component::Gitea => &status.gitea,
            Component::Nexus => &status.nexus,
            Component::Etherpad => &status.etherpad,
            Component::Vault => &status.vault,
            Component::IstioWorkspace => &status.istio_workspace,
            Component::Guide => &status.guide,
            Component::Bookbag => &status.bookbag,
            Component::UsernameDistribution => &status.username_distribution,
        }
    }

    pub fn status_mut(self, status: &mut WorkshopStatus) -> &mut String {
        match self {
            Component::Project => &mut status.project,
            Component::CertManager => &mut status.cert_manager,
            Component::ServiceMesh => &mut status.service_mesh,
            Component::Serverless => &mut status.serverless,
            Component::Pipeline => &mut status.pipeline,
            Component::ArgoCd => &mut status.argocd,
            Component::CodeReadyWorkspace => &mut status.code_ready_workspace,
            Component::Gitea => &mut status.gitea,
            Component::Nexus => &mut status.nexus,
            Component::Etherpad => &mut status.etherpad,
            Component::Vault => &mut status.vault,
            Component::IstioWorkspace => &mut status.istio_workspace,
            Component::Guide => &mut status.guide,
            Component::Bookbag => &mut status.bookbag,
            Component::UsernameDistribution => &mut status.username_distribution,
        }
    }

    /// Whether the workshop's status already records this component as installed
    pub fn is_installed(self, workshop: &Workshop) -> bool {
        workshop
            .status
            .as_ref()
            .is_some_and(|status| self.status(status) == STATUS_INSTALLED)
    }

    /// Build the provisioning plan of this component
    pub fn plan(self, workshop: &Workshop, params: &DerivedParameters) -> ComponentPlan {
        let owner = Owner::of(workshop);
        let infra = &workshop.spec.infrastructure;
        let plan = ComponentPlan::new(self.name());
        match self {
            Component::Project => project::plan(plan, &owner, &infra.project, params),
            Component::CertManager => operators::cert_manager(plan, &owner, &infra.cert_manager),
            Component::ServiceMesh => {
                operators::service_mesh(plan, &owner, &infra.service_mesh, &infra.project, params)
            }
            Component::Serverless => operators::serverless(plan, &owner, &infra.serverless),
            Component::Pipeline => operators::pipeline(plan, &owner, &infra.pipeline),
            Component::ArgoCd => operators::argocd(plan, &owner, &infra.argocd, params),
            Component::CodeReadyWorkspace => {
                operators::code_ready_workspace(plan, &owner, &infra.code_ready_workspace)
            }
            Component::Gitea => apps::gitea(plan, &owner, &infra.gitea, params),
            Component::Nexus => apps::nexus(plan, &owner, params),
            Component::Etherpad => apps::etherpad(plan, &owner, params),
            Component::Vault => vault::plan(plan, &owner, &infra.vault),
            Component::IstioWorkspace => {
                apps::istio_workspace(plan, &owner, &infra.istio_workspace)
            }
            Component::Guide => apps::guide(plan, &owner, &infra.guide, params),
            Component::Bookbag => apps::bookbag(plan, &owner, &infra.bookbag, params),
            Component::UsernameDistribution => {
                apps::username_distribution(plan, &owner, &infra.username_distribution, params)
            }
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
