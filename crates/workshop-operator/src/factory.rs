//! Kubernetes Resource Builders
//!
//! Pure functions turning (owner, name, namespace, labels, parameters) into
//! [`ResourceDescription`]s. Nothing here talks to the cluster or fails:
//! malformed input is a programming error in the caller, not a runtime
//! condition.

use crate::crd::Workshop;
use crate::store::{ResourceDescription, ResourceKind};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource,
    EnvFromSource, EnvVar, Namespace, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Secret, SecretEnvSource, Service,
    ServiceAccount, ServicePort, ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::json;
use std::collections::BTreeMap;

/// Value of the `app.kubernetes.io/managed-by` label
pub const MANAGED_BY: &str = "workshop-operator";

/// Owner reference stamped on every object a workshop creates
#[derive(Debug, Clone)]
pub struct Owner {
    reference: OwnerReference,
}

impl Owner {
    pub fn of(workshop: &Workshop) -> Self {
        Self {
            reference: OwnerReference {
                api_version: ResourceKind::Workshop.api_version(),
                kind: ResourceKind::Workshop.kind().to_string(),
                name: workshop.metadata.name.clone().unwrap_or_default(),
                uid: workshop.metadata.uid.clone().unwrap_or_default(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            },
        }
    }

    pub fn reference(&self) -> &OwnerReference {
        &self.reference
    }

    fn meta(&self, name: &str, namespace: Option<&str>, labels: &Labels) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            labels: if labels.is_empty() {
                None
            } else {
                Some(labels.clone())
            },
            owner_references: Some(vec![self.reference.clone()]),
            ..Default::default()
        }
    }
}

pub type Labels = BTreeMap<String, String>;

/// Standard labels for a component's objects
pub fn labels(app: &str, name: &str, component: &str) -> Labels {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), app.to_string());
    labels.insert("app.kubernetes.io/name".to_string(), name.to_string());
    labels.insert("app.kubernetes.io/part-of".to_string(), app.to_string());
    labels.insert("component".to_string(), component.to_string());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels
}

/// Build a Namespace
pub fn namespace(owner: &Owner, name: &str) -> ResourceDescription {
    let mut labels = BTreeMap::new();
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    let ns = Namespace {
        metadata: owner.meta(name, None, &labels),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::Namespace, &ns)
}

/// Build a ConfigMap
pub fn config_map(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    data: BTreeMap<String, String>,
) -> ResourceDescription {
    let cm = ConfigMap {
        metadata: owner.meta(name, Some(namespace), labels),
        data: Some(data),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::ConfigMap, &cm)
}

/// Build an Opaque Secret from string data
pub fn secret(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    string_data: BTreeMap<String, String>,
) -> ResourceDescription {
    let secret = Secret {
        metadata: owner.meta(name, Some(namespace), labels),
        string_data: Some(string_data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::Secret, &secret)
}

/// Build a ServiceAccount
pub fn service_account(owner: &Owner, name: &str, namespace: &str) -> ResourceDescription {
    let sa = ServiceAccount {
        metadata: owner.meta(name, Some(namespace), &Labels::new()),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::ServiceAccount, &sa)
}

/// Build a PersistentVolumeClaim
pub fn persistent_volume_claim(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    size: &str,
) -> ResourceDescription {
    let pvc = PersistentVolumeClaim {
        metadata: owner.meta(name, Some(namespace), labels),
        spec: Some(claim_spec(size)),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::PersistentVolumeClaim, &pvc)
}

fn claim_spec(size: &str) -> PersistentVolumeClaimSpec {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(size.to_string()));
    PersistentVolumeClaimSpec {
        access_modes: Some(vec!["ReadWriteOnce".to_string()]),
        resources: Some(VolumeResourceRequirements {
            requests: Some(requests),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Shorthand for a policy rule
pub fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    PolicyRule {
        api_groups: Some(owned(api_groups)),
        resources: Some(owned(resources)),
        verbs: owned(verbs),
        ..Default::default()
    }
}

/// Build a ClusterRole
pub fn cluster_role(owner: &Owner, name: &str, rules: Vec<PolicyRule>) -> ResourceDescription {
    let role = ClusterRole {
        metadata: owner.meta(name, None, &Labels::new()),
        rules: Some(rules),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::ClusterRole, &role)
}

/// Subject naming a service account
pub fn service_account_subject(namespace: &str, name: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Subject naming a cluster user
pub fn user_subject(name: &str) -> Subject {
    Subject {
        kind: "User".to_string(),
        name: name.to_string(),
        api_group: Some("rbac.authorization.k8s.io".to_string()),
        ..Default::default()
    }
}

fn role_ref(kind: &str, name: &str) -> RoleRef {
    RoleRef {
        api_group: "rbac.authorization.k8s.io".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Bind a ClusterRole to a service account cluster-wide
pub fn cluster_role_binding(
    owner: &Owner,
    name: &str,
    sa_namespace: &str,
    sa_name: &str,
    cluster_role: &str,
) -> ResourceDescription {
    let binding = ClusterRoleBinding {
        metadata: owner.meta(name, None, &Labels::new()),
        role_ref: role_ref("ClusterRole", cluster_role),
        subjects: Some(vec![service_account_subject(sa_namespace, sa_name)]),
    };
    ResourceDescription::from_resource(ResourceKind::ClusterRoleBinding, &binding)
}

/// Bind a Role or ClusterRole to subjects within one namespace
pub fn role_binding(
    owner: &Owner,
    name: &str,
    namespace: &str,
    subjects: Vec<Subject>,
    role_kind: &str,
    role_name: &str,
) -> ResourceDescription {
    let binding = RoleBinding {
        metadata: owner.meta(name, Some(namespace), &Labels::new()),
        role_ref: role_ref(role_kind, role_name),
        subjects: Some(subjects),
    };
    ResourceDescription::from_resource(ResourceKind::RoleBinding, &binding)
}

/// A named service port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub port: i32,
    pub target_port: i32,
}

impl PortSpec {
    pub fn new(name: &str, port: i32) -> Self {
        Self::with_target(name, port, port)
    }

    pub fn with_target(name: &str, port: i32, target_port: i32) -> Self {
        Self {
            name: name.to_string(),
            port,
            target_port,
        }
    }
}

/// Build a ClusterIP Service selecting pods by `labels`
pub fn service(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    ports: &[PortSpec],
) -> ResourceDescription {
    let svc = Service {
        metadata: owner.meta(name, Some(namespace), labels),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(labels.clone()),
            ports: Some(
                ports
                    .iter()
                    .map(|p| ServicePort {
                        name: Some(p.name.clone()),
                        port: p.port,
                        target_port: Some(IntOrString::Int(p.target_port)),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::Service, &svc)
}

/// Build an edge-terminated Route exposing `service` on `host`
pub fn route(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    service: &str,
    target_port: &str,
    host: &str,
) -> ResourceDescription {
    ResourceDescription::custom(
        ResourceKind::Route,
        owner.meta(name, Some(namespace), labels),
        json!({
            "spec": {
                "host": host,
                "to": { "kind": "Service", "name": service, "weight": 100 },
                "port": { "targetPort": target_port },
                "tls": {
                    "termination": "edge",
                    "insecureEdgeTerminationPolicy": "Redirect"
                }
            }
        }),
    )
}

/// Source of a mounted volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    ConfigMap(String),
    Claim(String),
    EmptyDir,
}

/// A volume mounted into the workload container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub name: String,
    pub path: String,
    pub source: MountSource,
}

impl Mount {
    pub fn new(name: &str, path: &str, source: MountSource) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            source,
        }
    }
}

/// Parameters of a single-container workload
#[derive(Debug, Clone, Default)]
pub struct WorkloadSpec {
    pub image: String,
    pub replicas: i32,
    pub service_account: Option<String>,
    pub ports: Vec<PortSpec>,
    pub env: Vec<(String, String)>,
    /// Secret whose keys are all exposed as environment variables
    pub env_secret: Option<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub mounts: Vec<Mount>,
}

impl WorkloadSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            replicas: 1,
            ..Default::default()
        }
    }

    pub fn service_account(mut self, name: &str) -> Self {
        self.service_account = Some(name.to_string());
        self
    }

    pub fn port(mut self, name: &str, port: i32) -> Self {
        self.ports.push(PortSpec::new(name, port));
        self
    }

    pub fn env(mut self, name: &str, value: impl Into<String>) -> Self {
        self.env.push((name.to_string(), value.into()));
        self
    }

    pub fn env_from_secret(mut self, secret: &str) -> Self {
        self.env_secret = Some(secret.to_string());
        self
    }

    pub fn command(mut self, command: &[&str]) -> Self {
        self.command = command.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }
}

fn pod_template(name: &str, labels: &Labels, workload: &WorkloadSpec) -> PodTemplateSpec {
    let container = Container {
        name: name.to_string(),
        image: Some(workload.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: (!workload.command.is_empty()).then(|| workload.command.clone()),
        args: (!workload.args.is_empty()).then(|| workload.args.clone()),
        ports: (!workload.ports.is_empty()).then(|| {
            workload
                .ports
                .iter()
                .map(|p| ContainerPort {
                    name: Some(p.name.clone()),
                    container_port: p.target_port,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                })
                .collect()
        }),
        env: (!workload.env.is_empty()).then(|| {
            workload
                .env
                .iter()
                .map(|(name, value)| EnvVar {
                    name: name.clone(),
                    value: Some(value.clone()),
                    ..Default::default()
                })
                .collect()
        }),
        env_from: workload.env_secret.as_ref().map(|secret| {
            vec![EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: secret.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }]
        }),
        volume_mounts: (!workload.mounts.is_empty()).then(|| {
            workload
                .mounts
                .iter()
                .map(|m| VolumeMount {
                    name: m.name.clone(),
                    mount_path: m.path.clone(),
                    ..Default::default()
                })
                .collect()
        }),
        ..Default::default()
    };

    let volumes: Vec<Volume> = workload
        .mounts
        .iter()
        .map(|m| match &m.source {
            MountSource::ConfigMap(cm) => Volume {
                name: m.name.clone(),
                config_map: Some(ConfigMapVolumeSource {
                    name: cm.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            MountSource::Claim(claim) => Volume {
                name: m.name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            MountSource::EmptyDir => Volume {
                name: m.name.clone(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        })
        .collect();

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            service_account_name: workload.service_account.clone(),
            volumes: (!volumes.is_empty()).then_some(volumes),
            ..Default::default()
        }),
    }
}

/// Build a Deployment
pub fn deployment(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    workload: &WorkloadSpec,
) -> ResourceDescription {
    let deployment = Deployment {
        metadata: owner.meta(name, Some(namespace), labels),
        spec: Some(DeploymentSpec {
            replicas: Some(workload.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: pod_template(name, labels, workload),
            ..Default::default()
        }),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::Deployment, &deployment)
}

/// Build a StatefulSet with one `data` volume claim template
pub fn stateful_set(
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    workload: &WorkloadSpec,
    data_path: &str,
    storage_size: &str,
) -> ResourceDescription {
    let mut template = pod_template(name, labels, workload);
    if let Some(container) = template
        .spec
        .as_mut()
        .and_then(|spec| spec.containers.first_mut())
    {
        container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .push(VolumeMount {
                name: "data".to_string(),
                mount_path: data_path.to_string(),
                ..Default::default()
            });
    }

    let sts = StatefulSet {
        metadata: owner.meta(name, Some(namespace), labels),
        spec: Some(StatefulSetSpec {
            service_name: format!("{}-internal", name),
            replicas: Some(workload.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template,
            volume_claim_templates: Some(vec![PersistentVolumeClaim {
                metadata: ObjectMeta {
                    name: Some("data".to_string()),
                    ..Default::default()
                },
                spec: Some(claim_spec(storage_size)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    ResourceDescription::from_resource(ResourceKind::StatefulSet, &sts)
}

/// Where an admission webhook is served
#[derive(Debug, Clone)]
pub struct WebhookSpec {
    pub name: String,
    pub service_namespace: String,
    pub service_name: String,
    pub path: String,
    pub resources: Vec<String>,
}

/// Build a MutatingWebhookConfiguration
pub fn mutating_webhook_configuration(
    owner: &Owner,
    name: &str,
    labels: &Labels,
    webhooks: &[WebhookSpec],
) -> ResourceDescription {
    let config = MutatingWebhookConfiguration {
        metadata: owner.meta(name, None, labels),
        webhooks: Some(
            webhooks
                .iter()
                .map(|w| MutatingWebhook {
                    name: w.name.clone(),
                    admission_review_versions: vec!["v1".to_string(), "v1beta1".to_string()],
                    side_effects: "None".to_string(),
                    client_config: WebhookClientConfig {
                        service: Some(ServiceReference {
                            name: w.service_name.clone(),
                            namespace: w.service_namespace.clone(),
                            path: Some(w.path.clone()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    rules: Some(vec![RuleWithOperations {
                        api_groups: Some(vec!["".to_string()]),
                        api_versions: Some(vec!["v1".to_string()]),
                        operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                        resources: Some(w.resources.clone()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                })
                .collect(),
        ),
    };
    ResourceDescription::from_resource(ResourceKind::MutatingWebhookConfiguration, &config)
}

/// Build an OperatorGroup; no target namespaces means all namespaces
pub fn operator_group(
    owner: &Owner,
    name: &str,
    namespace: &str,
    target_namespaces: &[&str],
) -> ResourceDescription {
    let spec = if target_namespaces.is_empty() {
        json!({})
    } else {
        json!({ "targetNamespaces": target_namespaces })
    };
    ResourceDescription::custom(
        ResourceKind::OperatorGroup,
        owner.meta(name, Some(namespace), &Labels::new()),
        json!({ "spec": spec }),
    )
}

/// Catalog entry an operator subscription points at
#[derive(Debug, Clone)]
pub struct SubscriptionSpec {
    pub package: String,
    pub channel: String,
    pub starting_csv: String,
    pub source: String,
    pub source_namespace: String,
}

impl SubscriptionSpec {
    /// Subscription to a package of the default `redhat-operators` catalog
    pub fn redhat(package: &str, channel: &str, starting_csv: &str) -> Self {
        Self::from_catalog("redhat-operators", package, channel, starting_csv)
    }

    pub fn from_catalog(source: &str, package: &str, channel: &str, starting_csv: &str) -> Self {
        Self {
            package: package.to_string(),
            channel: channel.to_string(),
            starting_csv: starting_csv.to_string(),
            source: source.to_string(),
            source_namespace: "openshift-marketplace".to_string(),
        }
    }
}

/// Build an OLM Subscription
pub fn subscription(
    owner: &Owner,
    name: &str,
    namespace: &str,
    sub: &SubscriptionSpec,
) -> ResourceDescription {
    let mut spec = json!({
        "channel": sub.channel,
        "installPlanApproval": "Automatic",
        "name": sub.package,
        "source": sub.source,
        "sourceNamespace": sub.source_namespace,
    });
    if !sub.starting_csv.is_empty() {
        spec["startingCSV"] = json!(sub.starting_csv);
    }
    ResourceDescription::custom(
        ResourceKind::Subscription,
        owner.meta(name, Some(namespace), &Labels::new()),
        json!({ "spec": spec }),
    )
}

/// Build an instance of an operator-provided kind
pub fn custom_resource(
    owner: &Owner,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
    labels: &Labels,
    spec: serde_json::Value,
) -> ResourceDescription {
    ResourceDescription::custom(
        kind,
        owner.meta(name, Some(namespace), labels),
        json!({ "spec": spec }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::workshop;

    fn owner() -> Owner {
        Owner::of(&workshop("demo"))
    }

    #[test]
    fn test_owner_reference() {
        let owner = owner();
        let reference = owner.reference();
        assert_eq!(reference.kind, "Workshop");
        assert_eq!(reference.api_version, "workshop.openshift.io/v1alpha1");
        assert_eq!(reference.name, "demo");
        assert_eq!(reference.uid, "demo-uid");
    }

    #[test]
    fn test_namespace_is_cluster_scoped() {
        let ns = namespace(&owner(), "vault");
        assert_eq!(ns.kind, ResourceKind::Namespace);
        assert_eq!(ns.name(), "vault");
        assert_eq!(ns.namespace(), None);
        assert_eq!(ns.object.metadata.owner_references.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_service_selects_labels() {
        let labels = labels("vault", "vault", "server");
        let svc = service(
            &owner(),
            "vault",
            "vault",
            &labels,
            &[PortSpec::new("http", 8200), PortSpec::new("internal", 8201)],
        );

        let spec = &svc.object.data["spec"];
        assert_eq!(spec["selector"]["component"], "server");
        assert_eq!(spec["ports"][0]["port"], 8200);
        assert_eq!(spec["ports"][1]["name"], "internal");
    }

    #[test]
    fn test_deployment_workload() {
        let labels = labels("gitea", "gitea", "server");
        let workload = WorkloadSpec::new("gitea/gitea:1.11")
            .service_account("gitea")
            .port("http", 3000)
            .env("USER_COUNT", "5")
            .mount(Mount::new("data", "/data", MountSource::Claim("gitea-data".into())));
        let deploy = deployment(&owner(), "gitea", "gitea", &labels, &workload);

        let pod = &deploy.object.data["spec"]["template"]["spec"];
        assert_eq!(pod["serviceAccountName"], "gitea");
        assert_eq!(pod["containers"][0]["image"], "gitea/gitea:1.11");
        assert_eq!(pod["containers"][0]["env"][0]["name"], "USER_COUNT");
        assert_eq!(
            pod["volumes"][0]["persistentVolumeClaim"]["claimName"],
            "gitea-data"
        );
    }

    #[test]
    fn test_stateful_set_mounts_data() {
        let labels = labels("vault", "vault", "server");
        let sts = stateful_set(
            &owner(),
            "vault",
            "vault",
            &labels,
            &WorkloadSpec::new("vault:1.4.0"),
            "/vault/data",
            "1Gi",
        );

        let spec = &sts.object.data["spec"];
        assert_eq!(spec["serviceName"], "vault-internal");
        assert_eq!(
            spec["template"]["spec"]["containers"][0]["volumeMounts"][0]["mountPath"],
            "/vault/data"
        );
        assert_eq!(
            spec["volumeClaimTemplates"][0]["spec"]["resources"]["requests"]["storage"],
            "1Gi"
        );
    }

    #[test]
    fn test_subscription_starting_csv_optional() {
        let sub = subscription(
            &owner(),
            "openshift-pipelines-operator",
            "openshift-operators",
            &SubscriptionSpec::redhat("openshift-pipelines-operator-rh", "stable", ""),
        );
        assert!(sub.object.data["spec"].get("startingCSV").is_none());
        assert_eq!(sub.object.data["spec"]["source"], "redhat-operators");

        let sub = subscription(
            &owner(),
            "argocd-operator",
            "argocd",
            &SubscriptionSpec::from_catalog(
                "community-operators",
                "argocd-operator",
                "alpha",
                "argocd-operator.v0.0.8",
            ),
        );
        assert_eq!(sub.object.data["spec"]["startingCSV"], "argocd-operator.v0.0.8");
    }

    #[test]
    fn test_cluster_role_binding_subject() {
        let crb = cluster_role_binding(
            &owner(),
            "vault-server-binding",
            "vault",
            "vault",
            "system:auth-delegator",
        );
        assert_eq!(crb.namespace(), None);
        assert_eq!(crb.object.data["subjects"][0]["namespace"], "vault");
        assert_eq!(crb.object.data["roleRef"]["name"], "system:auth-delegator");
    }
}
