//! Workshop reconcile pass
//!
//! A pass walks [`Component::ORDER`]. Disabled components are skipped
//! without touching the cluster. Each enabled component's plan is run by the
//! [`Provisioner`], and a clean run promotes the component's status to
//! `Installed`. A failing component only stops its own plan: the remaining
//! components are still attempted, and the first failure is returned at the
//! end so the controller requeues the workshop.

use crate::components::{Component, DerivedParameters};
use crate::config::OperatorConfig;
use crate::crd::Workshop;
use crate::error::{OperatorError, Result};
use crate::provisioner::Provisioner;
use crate::status::mark_installed;
use crate::store::{ObjectStore, ResourceKind};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Name of the cluster ingress configuration object
const INGRESS_CONFIG: &str = "cluster";

/// What happened to one component during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// Not enabled; nothing was read or written
    Skipped,
    /// Plan ran clean and the status records it as installed
    Installed,
    /// Plan or status write failed with the given message
    Failed(String),
}

/// Per-component results of one pass
#[derive(Debug)]
pub struct PassReport {
    pub outcomes: Vec<(Component, ComponentOutcome)>,
    /// Workshop as last stored during the pass
    pub workshop: Workshop,
    first_error: Option<OperatorError>,
}

impl PassReport {
    pub fn outcome(&self, component: Component) -> Option<&ComponentOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == component)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed(&self) -> impl Iterator<Item = Component> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ComponentOutcome::Failed(_)))
            .map(|(c, _)| *c)
    }

    pub fn first_error(&self) -> Option<&OperatorError> {
        self.first_error.as_ref()
    }

    /// Convert into the controller's result: the first failure, if any
    pub fn into_result(self) -> Result<Action> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(Action::await_change()),
        }
    }
}

/// Drives workshops toward their declared state
pub struct Reconciler<S: ObjectStore + ?Sized> {
    store: Arc<S>,
    config: OperatorConfig,
    provisioner: Provisioner,
}

impl<S: ObjectStore + ?Sized> Reconciler<S> {
    pub fn new(store: Arc<S>, config: OperatorConfig) -> Self {
        let provisioner = Provisioner::new(config.conflict_retries);
        Self {
            store,
            config,
            provisioner,
        }
    }

    /// Run one pass and map it onto a controller action
    pub async fn reconcile(&self, workshop: &Workshop) -> Result<Action> {
        self.run_pass(workshop).await?.into_result()
    }

    /// Run one pass over every component.
    ///
    /// Fails early, before any component, when the workshop spec is invalid or the
    /// application domain cannot be determined. Component failures are
    /// collected in the report instead.
    #[instrument(skip(self, workshop), fields(name = %workshop.name_any()))]
    pub async fn run_pass(&self, workshop: &Workshop) -> Result<PassReport> {
        validate_spec(workshop)?;
        let params = self.derive_parameters(workshop).await?;

        let mut current = workshop.clone();
        let mut outcomes = Vec::with_capacity(Component::ORDER.len());
        let mut first_error = None;

        for component in Component::ORDER {
            if !component.is_enabled(&workshop.spec.infrastructure) {
                outcomes.push((component, ComponentOutcome::Skipped));
                continue;
            }

            match self.install(&current, component, &params).await {
                Ok(stored) => {
                    current = stored;
                    outcomes.push((component, ComponentOutcome::Installed));
                }
                Err(e) => {
                    warn!(component = %component, error = %e, "Component not installed");
                    outcomes.push((component, ComponentOutcome::Failed(e.to_string())));
                    if e.is_conflict() {
                        match self.refresh(&current).await {
                            Ok(fresh) => current = fresh,
                            Err(refresh_err) => {
                                warn!(
                                    error = %refresh_err,
                                    "Keeping stale workshop after refresh failure"
                                );
                            }
                        }
                    }
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(
            failed = outcomes
                .iter()
                .filter(|(_, o)| matches!(o, ComponentOutcome::Failed(_)))
                .count(),
            "Reconcile pass finished"
        );

        Ok(PassReport {
            outcomes,
            workshop: current,
            first_error,
        })
    }

    async fn install(
        &self,
        workshop: &Workshop,
        component: Component,
        params: &DerivedParameters,
    ) -> Result<Workshop> {
        let plan = component.plan(workshop, params);
        self.provisioner.run(self.store.as_ref(), &plan).await?;

        if component.is_installed(workshop) {
            return Ok(workshop.clone());
        }
        let stored = mark_installed(self.store.as_ref(), workshop, component).await?;
        metrics::counter!(
            "workshop_operator_components_installed_total",
            "component" => component.name()
        )
        .increment(1);
        Ok(stored)
    }

    /// Re-read the workshop after a status conflict so later components
    /// write against the current version
    async fn refresh(&self, workshop: &Workshop) -> Result<Workshop> {
        let name = workshop.name_any();
        let object = self
            .store
            .get(ResourceKind::Workshop, None, &name)
            .await?
            .ok_or_else(|| OperatorError::NotFound {
                kind: ResourceKind::Workshop.to_string(),
                name: name.clone(),
                namespace: String::new(),
            })?;
        debug!(name = %name, "Refreshed workshop after conflict");
        Ok(serde_json::from_value(serde_json::to_value(object)?)?)
    }

    /// Compute the values every component plan shares
    pub async fn derive_parameters(&self, workshop: &Workshop) -> Result<DerivedParameters> {
        let apps_domain = match &self.config.apps_domain {
            Some(domain) => domain.clone(),
            None => self.discover_apps_domain().await?,
        };
        let spec = &workshop.spec;
        Ok(DerivedParameters {
            users: spec.user.number,
            password: spec.user.password.clone(),
            apps_domain,
            git_url: spec.source.git_url.clone(),
            git_branch: spec.source.git_branch.clone(),
        })
    }

    async fn discover_apps_domain(&self) -> Result<String> {
        let not_found = || OperatorError::NotFound {
            kind: ResourceKind::IngressConfig.to_string(),
            name: INGRESS_CONFIG.to_string(),
            namespace: String::new(),
        };
        let ingress = self
            .store
            .get(ResourceKind::IngressConfig, None, INGRESS_CONFIG)
            .await?
            .ok_or_else(not_found)?;
        ingress.data["spec"]["domain"]
            .as_str()
            .filter(|domain| !domain.is_empty())
            .map(str::to_string)
            .ok_or_else(not_found)
    }
}

/// Reject invalid specs before any component runs
fn validate_spec(workshop: &Workshop) -> Result<()> {
    if let Err(errors) = workshop.spec.validate() {
        let message = errors.to_string().replace('\n', "; ");
        warn!(name = %workshop.name_any(), errors = %message, "Workshop spec validation failed");
        return Err(OperatorError::InvalidConfig(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::STATUS_INSTALLED;
    use crate::policy::PRIVILEGED_POLICY;
    use crate::testing::{store_workshop, workshop, MemoryStore, Op};

    fn reconciler(store: &Arc<MemoryStore>) -> Reconciler<MemoryStore> {
        Reconciler::new(store.clone(), OperatorConfig::default())
    }

    fn enabled(ws: &mut Workshop, components: &[Component]) {
        let infra = &mut ws.spec.infrastructure;
        for component in components {
            match component {
                Component::Project => infra.project.enabled = true,
                Component::Vault => infra.vault.enabled = true,
                Component::Gitea => infra.gitea.enabled = true,
                Component::Nexus => infra.nexus.enabled = true,
                Component::Etherpad => infra.etherpad.enabled = true,
                Component::Pipeline => infra.pipeline.enabled = true,
                other => panic!("not used in these tests: {}", other),
            }
        }
    }

    fn setup(components: &[Component]) -> (Arc<MemoryStore>, Workshop) {
        let store = Arc::new(MemoryStore::with_cluster_defaults());
        let mut ws = workshop("demo");
        enabled(&mut ws, components);
        let ws = store_workshop(&store, &ws);
        (store, ws)
    }

    #[tokio::test]
    async fn test_nothing_enabled_touches_nothing_but_domain() {
        let (store, ws) = setup(&[]);

        let action = reconciler(&store).reconcile(&ws).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(store.writes(), 0);
        // The domain lookup is the only read
        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].key.kind, ResourceKind::IngressConfig);
    }

    #[tokio::test]
    async fn test_disabled_component_has_no_calls() {
        let (store, ws) = setup(&[Component::Gitea]);

        let report = reconciler(&store).run_pass(&ws).await.unwrap();

        assert_eq!(report.outcome(Component::Vault), Some(&ComponentOutcome::Skipped));
        assert!(store
            .calls()
            .iter()
            .all(|c| c.key.namespace.as_deref() != Some("vault") && c.key.name != "vault"));
        let status = report.workshop.status.unwrap();
        assert_eq!(status.gitea, STATUS_INSTALLED);
        assert_eq!(status.vault, "");
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_component() {
        let (store, ws) = setup(&[Component::Gitea, Component::Nexus, Component::Vault]);
        store.fail(Op::Create, ResourceKind::Service, Some("nexus"), "nexus", 1);

        let report = reconciler(&store).run_pass(&ws).await.unwrap();

        assert_eq!(report.failed().collect::<Vec<_>>(), vec![Component::Nexus]);
        assert!(report.first_error().unwrap().is_retryable());
        let status = report.workshop.status.clone().unwrap();
        assert_eq!(status.gitea, STATUS_INSTALLED);
        assert_eq!(status.nexus, "");
        assert_eq!(status.vault, STATUS_INSTALLED);
        assert!(store.contains(ResourceKind::StatefulSet, Some("vault"), "vault"));
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_namespace_failure_leaves_other_components_installed() {
        let (store, ws) = setup(&[Component::Gitea, Component::Nexus]);
        store.fail(Op::Create, ResourceKind::Namespace, None, "gitea", 1);

        let report = reconciler(&store).run_pass(&ws).await.unwrap();

        assert_eq!(report.failed().collect::<Vec<_>>(), vec![Component::Gitea]);
        // Nothing after the namespace step of the failed component was attempted
        assert!(!store.contains(ResourceKind::ServiceAccount, Some("gitea"), "gitea"));
        assert!(!store.contains(ResourceKind::Deployment, Some("gitea"), "gitea"));
        assert!(store.contains(ResourceKind::Deployment, Some("nexus"), "nexus"));
        let status = report.workshop.status.clone().unwrap();
        assert_eq!(status.gitea, "");
        assert_eq!(status.nexus, STATUS_INSTALLED);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_second_pass_completes_and_writes_only_missing() {
        let (store, ws) = setup(&[Component::Gitea, Component::Nexus]);
        store.fail(Op::Create, ResourceKind::Deployment, Some("nexus"), "nexus", 1);
        let reconciler = reconciler(&store);

        let first = reconciler.run_pass(&ws).await.unwrap();
        assert_eq!(first.failed().count(), 1);
        store.clear_calls();

        let second = reconciler.run_pass(&first.workshop).await.unwrap();
        assert_eq!(second.failed().count(), 0);
        // Nexus deployment plus its status write
        assert_eq!(store.writes(), 2);
        assert_eq!(second.workshop.status.unwrap().nexus, STATUS_INSTALLED);
    }

    #[tokio::test]
    async fn test_converged_pass_writes_nothing() {
        let (store, ws) = setup(&[Component::Project, Component::Vault, Component::Gitea]);
        let reconciler = reconciler(&store);

        let first = reconciler.run_pass(&ws).await.unwrap();
        assert_eq!(first.failed().count(), 0);
        let privileged = store.policy_users(PRIVILEGED_POLICY);
        store.clear_calls();

        let second = reconciler.run_pass(&first.workshop).await.unwrap();
        assert_eq!(second.failed().count(), 0);
        assert_eq!(store.writes(), 0);
        assert_eq!(store.policy_users(PRIVILEGED_POLICY), privileged);
        assert_eq!(privileged.len(), 2);
    }

    #[tokio::test]
    async fn test_installed_status_never_regresses() {
        let (store, ws) = setup(&[Component::Gitea]);
        let reconciler = reconciler(&store);
        let first = reconciler.run_pass(&ws).await.unwrap();

        // Gitea now fails on every step; its status stays installed
        store.fail(Op::Create, ResourceKind::Namespace, None, "gitea", 10);
        let second = reconciler.run_pass(&first.workshop).await.unwrap();
        assert_eq!(second.failed().collect::<Vec<_>>(), vec![Component::Gitea]);

        let stored = store.object(ResourceKind::Workshop, None, "demo").unwrap();
        assert_eq!(stored.data["status"]["gitea"], STATUS_INSTALLED);
    }

    #[tokio::test]
    async fn test_service_account_precedes_grant_and_workload() {
        let (store, ws) = setup(&[Component::Vault]);

        reconciler(&store).run_pass(&ws).await.unwrap();

        let sa = store.created_at(ResourceKind::ServiceAccount, Some("vault"), "vault").unwrap();
        let grant = store.first_call(Op::Update, ResourceKind::SecurityContextConstraints).unwrap();
        let sts = store.created_at(ResourceKind::StatefulSet, Some("vault"), "vault").unwrap();
        let status = store.first_call(Op::UpdateStatus, ResourceKind::Workshop).unwrap();
        assert!(sa < grant);
        assert!(grant < sts);
        assert!(sts < status);
        assert!(store
            .policy_users(PRIVILEGED_POLICY)
            .contains(&"system:serviceaccount:vault:vault-agent-injector".to_string()));
    }

    #[tokio::test]
    async fn test_missing_ingress_domain_fails_before_components() {
        let store = Arc::new(MemoryStore::new());
        store.seed_policy("privileged", &[]);
        let mut ws = workshop("demo");
        enabled(&mut ws, &[Component::Gitea]);
        let ws = store_workshop(&store, &ws);

        let err = reconciler(&store).reconcile(&ws).await.unwrap_err();

        assert!(matches!(err, OperatorError::NotFound { .. }));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_configured_domain_skips_discovery() {
        let store = Arc::new(MemoryStore::new());
        let ws = store_workshop(&store, &workshop("demo"));
        let reconciler = Reconciler::new(
            store.clone(),
            OperatorConfig::default().with_apps_domain("apps.lab.example.com"),
        );

        let params = reconciler.derive_parameters(&ws).await.unwrap();
        assert_eq!(params.apps_domain, "apps.lab.example.com");
        assert_eq!(params.users, 2);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_spec_is_not_retryable() {
        let (store, mut ws) = setup(&[Component::Gitea]);
        ws.spec.user.number = 10_000;

        let err = reconciler(&store).reconcile(&ws).await.unwrap_err();

        assert!(matches!(err, OperatorError::InvalidConfig(_)));
        assert!(!err.is_retryable());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_conflict_refreshes_for_later_components() {
        let (store, ws) = setup(&[Component::Gitea, Component::Nexus]);
        // Someone else writes the workshop status before this pass does
        let stale = ws.clone();
        crate::status::mark_installed(store.as_ref(), &ws, Component::Etherpad)
            .await
            .unwrap();

        let report = reconciler(&store).run_pass(&stale).await.unwrap();

        assert_eq!(report.failed().collect::<Vec<_>>(), vec![Component::Gitea]);
        assert!(report.first_error().unwrap().is_conflict());
        let stored = store.object(ResourceKind::Workshop, None, "demo").unwrap();
        assert_eq!(stored.data["status"]["nexus"], STATUS_INSTALLED);
        assert_eq!(stored.data["status"]["etherpad"], STATUS_INSTALLED);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_pass_going() {
        let (store, ws) = setup(&[Component::Gitea, Component::Nexus]);
        let stale = ws.clone();
        crate::status::mark_installed(store.as_ref(), &ws, Component::Etherpad)
            .await
            .unwrap();
        store.fail(Op::Get, ResourceKind::Workshop, None, "demo", 1);

        let report = reconciler(&store).run_pass(&stale).await.unwrap();

        // Without a fresh copy the later status write conflicts as well
        assert_eq!(
            report.failed().collect::<Vec<_>>(),
            vec![Component::Gitea, Component::Nexus]
        );
        assert!(report.first_error().unwrap().is_conflict());
        assert!(store.contains(ResourceKind::Deployment, Some("nexus"), "nexus"));
    }
}
