//! Components installed through the Operator Lifecycle Manager
//!
//! Each of these subscribes to a catalog operator and, where the workshop
//! needs a running instance, creates the operator's custom resource. The
//! instance step fails with `NotFound` until the operator has registered
//! its CRD; the pass is then retried and the component stays uninstalled
//! until it goes through.

use super::{user_project, DerivedParameters};
use crate::crd::{CodeReadyWorkspaceSpec, OperatorComponentSpec, ProjectSpec, ServiceMeshSpec};
use crate::factory::{self, Owner, SubscriptionSpec};
use crate::provisioner::ComponentPlan;
use crate::store::ResourceKind;
use serde_json::json;

/// Namespace with the cluster-wide operator group
const GLOBAL_OPERATORS: &str = "openshift-operators";

fn subscription_spec(
    source: &str,
    package: &str,
    default_channel: &str,
    spec: &OperatorComponentSpec,
) -> SubscriptionSpec {
    SubscriptionSpec::from_catalog(
        source,
        package,
        spec.operator_hub.channel_or(default_channel),
        &spec.operator_hub.cluster_service_version,
    )
}

pub(super) fn cert_manager(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &OperatorComponentSpec,
) -> ComponentPlan {
    let sub = subscription_spec("community-operators", "cert-manager", "stable", spec);
    plan.ensure(factory::subscription(owner, "cert-manager", GLOBAL_OPERATORS, &sub))
}

pub(super) fn pipeline(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &OperatorComponentSpec,
) -> ComponentPlan {
    let sub = subscription_spec(
        "redhat-operators",
        "openshift-pipelines-operator-rh",
        "stable",
        spec,
    );
    plan.ensure(factory::subscription(
        owner,
        "openshift-pipelines-operator",
        GLOBAL_OPERATORS,
        &sub,
    ))
}

pub(super) fn serverless(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &OperatorComponentSpec,
) -> ComponentPlan {
    let sub = subscription_spec("redhat-operators", "serverless-operator", "stable", spec);
    plan.ensure(factory::subscription(owner, "serverless-operator", GLOBAL_OPERATORS, &sub))
        .ensure(factory::namespace(owner, "knative-serving"))
        .ensure(factory::custom_resource(
            owner,
            ResourceKind::KnativeServing,
            "knative-serving",
            "knative-serving",
            &factory::Labels::new(),
            json!({}),
        ))
}

pub(super) fn argocd(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &OperatorComponentSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "argocd";
    let sub = SubscriptionSpec::from_catalog(
        "community-operators",
        "argocd-operator",
        spec.operator_hub.channel_or("alpha"),
        &spec.operator_hub.cluster_service_version,
    );

    // Attendees may only manage applications in their own projects
    let policy: String = params
        .user_names()
        .map(|user| {
            format!(
                "p, role:{0}, applications, *, {0}-*/*, allow\ng, {0}, role:{0}\n",
                user
            )
        })
        .collect();

    let instance = json!({
        "dex": { "openShiftOAuth": true },
        "rbac": {
            "defaultPolicy": "",
            "policy": policy,
            "scopes": "[groups]"
        },
        "server": { "route": { "enabled": true } }
    });

    plan.ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::operator_group(owner, "argocd-operator", NAMESPACE, &[NAMESPACE]))
        .ensure(factory::subscription(owner, "argocd-operator", NAMESPACE, &sub))
        .ensure(factory::custom_resource(
            owner,
            ResourceKind::ArgoCd,
            "argocd",
            NAMESPACE,
            &factory::labels("argocd", "argocd", "server"),
            instance,
        ))
}

pub(super) fn service_mesh(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ServiceMeshSpec,
    project: &ProjectSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "istio-system";

    let operators = [
        ("elasticsearch-operator", &spec.elastic_search_operator_hub, "stable"),
        ("jaeger-product", &spec.jaeger_operator_hub, "stable"),
        ("kiali-ossm", &spec.kiali_operator_hub, "stable"),
        ("servicemeshoperator", &spec.service_mesh_operator_hub, "stable"),
    ];

    let plan = operators.iter().fold(plan, |plan, (package, hub, channel)| {
        let sub = SubscriptionSpec::redhat(
            package,
            hub.channel_or(channel),
            &hub.cluster_service_version,
        );
        plan.ensure(factory::subscription(owner, package, GLOBAL_OPERATORS, &sub))
    });

    let members: Vec<String> = (1..=params.users.max(0))
        .map(|i| user_project(project, i))
        .collect();

    plan.ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::custom_resource(
            owner,
            ResourceKind::ServiceMeshControlPlane,
            "basic",
            NAMESPACE,
            &factory::Labels::new(),
            json!({
                "version": "v2.0",
                "tracing": { "type": "Jaeger", "sampling": 10000 },
                "addons": {
                    "jaeger": { "install": { "storage": { "type": "Memory" } } },
                    "kiali": { "enabled": true },
                    "grafana": { "enabled": true }
                }
            }),
        ))
        .ensure(factory::custom_resource(
            owner,
            ResourceKind::ServiceMeshMemberRoll,
            "default",
            NAMESPACE,
            &factory::Labels::new(),
            json!({ "members": members }),
        ))
}

pub(super) fn code_ready_workspace(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &CodeReadyWorkspaceSpec,
) -> ComponentPlan {
    const NAMESPACE: &str = "workspaces";
    let sub = SubscriptionSpec::redhat(
        "codeready-workspaces",
        spec.operator_hub.channel_or("latest"),
        &spec.operator_hub.cluster_service_version,
    );

    let mut server = json!({
        "cheImagePullPolicy": "IfNotPresent",
        "selfSignedCert": false,
        "tlsSupport": true
    });
    if !spec.plugin_registry_image.name.is_empty() {
        server["pluginRegistryImage"] = json!(spec.plugin_registry_image.reference_or(""));
    }

    let instance = json!({
        "server": server,
        "database": { "externalDb": false },
        "auth": {
            "openShiftoAuth": spec.openshift_oauth,
            "externalIdentityProvider": false
        },
        "storage": {
            "pvcStrategy": "per-workspace",
            "pvcClaimSize": "1Gi"
        }
    });

    plan.ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::operator_group(owner, "codeready-workspaces", NAMESPACE, &[NAMESPACE]))
        .ensure(factory::subscription(owner, "codeready-workspaces", NAMESPACE, &sub))
        .ensure(factory::custom_resource(
            owner,
            ResourceKind::CheCluster,
            "codereadyworkspaces",
            NAMESPACE,
            &factory::labels("codeready", "codereadyworkspaces", "server"),
            instance,
        ))
}
