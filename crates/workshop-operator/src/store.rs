//! Cluster object store
//!
//! The reconciliation core only needs four verbs against the cluster:
//! `get`, `create`, `update` and `update_status`. They are expressed by the
//! [`ObjectStore`] trait so the same provisioning code runs against the
//! Kubernetes API server ([`KubeStore`]) and against the in-memory store used
//! by the unit tests.
//!
//! Objects cross this boundary as [`DynamicObject`]s tagged with a
//! [`ResourceKind`], which covers both core Kubernetes kinds and the
//! OpenShift/OLM kinds the workshop components install.

use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DynamicObject, PostParams};
use kube::core::{ApiResource, GroupVersionKind, TypeMeta};
use kube::{Client, Resource};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "workshop-operator";

/// Default timeout for a single cluster call
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Every kind of object the operator reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Namespace,
    ConfigMap,
    Secret,
    ServiceAccount,
    PersistentVolumeClaim,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
    Service,
    Route,
    Deployment,
    StatefulSet,
    MutatingWebhookConfiguration,
    OperatorGroup,
    Subscription,
    SecurityContextConstraints,
    IngressConfig,
    ArgoCd,
    CheCluster,
    ServiceMeshControlPlane,
    ServiceMeshMemberRoll,
    KnativeServing,
    Workshop,
}

impl ResourceKind {
    /// (group, version, kind, plural, namespaced)
    fn descriptor(self) -> (&'static str, &'static str, &'static str, &'static str, bool) {
        match self {
            ResourceKind::Namespace => ("", "v1", "Namespace", "namespaces", false),
            ResourceKind::ConfigMap => ("", "v1", "ConfigMap", "configmaps", true),
            ResourceKind::Secret => ("", "v1", "Secret", "secrets", true),
            ResourceKind::ServiceAccount => ("", "v1", "ServiceAccount", "serviceaccounts", true),
            ResourceKind::PersistentVolumeClaim => (
                "",
                "v1",
                "PersistentVolumeClaim",
                "persistentvolumeclaims",
                true,
            ),
            ResourceKind::RoleBinding => (
                "rbac.authorization.k8s.io",
                "v1",
                "RoleBinding",
                "rolebindings",
                true,
            ),
            ResourceKind::ClusterRole => (
                "rbac.authorization.k8s.io",
                "v1",
                "ClusterRole",
                "clusterroles",
                false,
            ),
            ResourceKind::ClusterRoleBinding => (
                "rbac.authorization.k8s.io",
                "v1",
                "ClusterRoleBinding",
                "clusterrolebindings",
                false,
            ),
            ResourceKind::Service => ("", "v1", "Service", "services", true),
            ResourceKind::Route => ("route.openshift.io", "v1", "Route", "routes", true),
            ResourceKind::Deployment => ("apps", "v1", "Deployment", "deployments", true),
            ResourceKind::StatefulSet => ("apps", "v1", "StatefulSet", "statefulsets", true),
            ResourceKind::MutatingWebhookConfiguration => (
                "admissionregistration.k8s.io",
                "v1",
                "MutatingWebhookConfiguration",
                "mutatingwebhookconfigurations",
                false,
            ),
            ResourceKind::OperatorGroup => (
                "operators.coreos.com",
                "v1",
                "OperatorGroup",
                "operatorgroups",
                true,
            ),
            ResourceKind::Subscription => (
                "operators.coreos.com",
                "v1alpha1",
                "Subscription",
                "subscriptions",
                true,
            ),
            ResourceKind::SecurityContextConstraints => (
                "security.openshift.io",
                "v1",
                "SecurityContextConstraints",
                "securitycontextconstraints",
                false,
            ),
            ResourceKind::IngressConfig => {
                ("config.openshift.io", "v1", "Ingress", "ingresses", false)
            }
            ResourceKind::ArgoCd => ("argoproj.io", "v1alpha1", "ArgoCD", "argocds", true),
            ResourceKind::CheCluster => {
                ("org.eclipse.che", "v1", "CheCluster", "checlusters", true)
            }
            ResourceKind::ServiceMeshControlPlane => (
                "maistra.io",
                "v2",
                "ServiceMeshControlPlane",
                "servicemeshcontrolplanes",
                true,
            ),
            ResourceKind::ServiceMeshMemberRoll => (
                "maistra.io",
                "v1",
                "ServiceMeshMemberRoll",
                "servicemeshmemberrolls",
                true,
            ),
            ResourceKind::KnativeServing => (
                "operator.knative.dev",
                "v1beta1",
                "KnativeServing",
                "knativeservings",
                true,
            ),
            ResourceKind::Workshop => (
                "workshop.openshift.io",
                "v1alpha1",
                "Workshop",
                "workshops",
                false,
            ),
        }
    }

    /// Kind name as the API server spells it
    pub fn kind(self) -> &'static str {
        self.descriptor().2
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(self) -> String {
        let (group, version, ..) = self.descriptor();
        if group.is_empty() {
            version.to_string()
        } else {
            format!("{}/{}", group, version)
        }
    }

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(self) -> bool {
        self.descriptor().4
    }

    /// Dynamic API resource used to build `Api<DynamicObject>` handles
    pub fn api_resource(self) -> ApiResource {
        let (group, version, kind, plural, _) = self.descriptor();
        ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
    }

    /// `apiVersion`/`kind` header for objects of this kind
    pub fn type_meta(self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version(),
            kind: self.kind().to_string(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Store key of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            // Cluster-scoped kinds ignore any namespace a caller passes
            namespace: namespace
                .filter(|_| kind.is_namespaced())
                .map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key of a stored or to-be-stored object
    pub fn of(kind: ResourceKind, object: &DynamicObject) -> Self {
        Self::new(
            kind,
            object.metadata.namespace.as_deref(),
            object.metadata.name.as_deref().unwrap_or_default(),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// An object to be created, produced by the resource factory
#[derive(Debug, Clone)]
pub struct ResourceDescription {
    pub kind: ResourceKind,
    pub object: DynamicObject,
}

impl ResourceDescription {
    /// Describe a typed Kubernetes object
    pub fn from_resource<K>(kind: ResourceKind, resource: &K) -> Self
    where
        K: Resource + Serialize,
    {
        // Typed objects always serialize to a JSON map
        let mut data = serde_json::to_value(resource).unwrap_or_default();
        if let Some(map) = data.as_object_mut() {
            map.remove("apiVersion");
            map.remove("kind");
            map.remove("metadata");
        }

        Self {
            kind,
            object: DynamicObject {
                types: Some(kind.type_meta()),
                metadata: resource.meta().clone(),
                data,
            },
        }
    }

    /// Describe an object of a kind without generated Rust types
    pub fn custom(
        kind: ResourceKind,
        metadata: ObjectMeta,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            object: DynamicObject {
                types: Some(kind.type_meta()),
                metadata,
                data,
            },
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::of(self.kind, &self.object)
    }

    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }
}

/// The cluster verbs the reconciliation core depends on.
///
/// `create` fails with [`OperatorError::AlreadyExists`] when the key is
/// occupied. `update` and `update_status` fail with
/// [`OperatorError::Conflict`] when the object's resource version is no
/// longer current. Retrying conflicts is the caller's responsibility.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` when it does not exist
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    /// Create an object
    async fn create(&self, resource: &ResourceDescription) -> Result<DynamicObject>;

    /// Replace an object, guarded by its resource version
    async fn update(&self, kind: ResourceKind, object: &DynamicObject) -> Result<DynamicObject>;

    /// Replace the status sub-resource, guarded by the resource version
    async fn update_status(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject>;
}

/// Configuration for [`KubeStore`]
#[derive(Debug, Clone)]
pub struct KubeStoreConfig {
    /// Upper bound for a single API call
    pub operation_timeout: Duration,
}

impl Default for KubeStoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// [`ObjectStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    config: KubeStoreConfig,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self::with_config(client, KubeStoreConfig::default())
    }

    pub fn with_config(client: Client, config: KubeStoreConfig) -> Self {
        Self { client, config }
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        match namespace.filter(|_| kind.is_namespaced()) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }

    /// Run one API call under the operation timeout
    async fn bounded<T, F>(&self, op: &str, key: &ObjectKey, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match timeout(self.config.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(e, key)),
            Err(_) => Err(OperatorError::Timeout(format!("{} {}", op, key))),
        }
    }
}

/// Map API status codes onto the operator's error taxonomy
fn classify(error: kube::Error, key: &ObjectKey) -> OperatorError {
    match &error {
        kube::Error::Api(response) if response.code == 409 => {
            if response.reason == "AlreadyExists" {
                OperatorError::AlreadyExists {
                    kind: key.kind.to_string(),
                    name: key.name.clone(),
                }
            } else {
                OperatorError::Conflict {
                    kind: key.kind.to_string(),
                    name: key.name.clone(),
                }
            }
        }
        kube::Error::Api(response) if response.code == 404 => OperatorError::NotFound {
            kind: key.kind.to_string(),
            name: key.name.clone(),
            namespace: key.namespace.clone().unwrap_or_default(),
        },
        _ => OperatorError::KubeError(error),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let key = ObjectKey::new(kind, namespace, name);
        debug!(key = %key, "Getting object");
        let api = self.api(kind, namespace);
        self.bounded("get", &key, api.get_opt(name)).await
    }

    async fn create(&self, resource: &ResourceDescription) -> Result<DynamicObject> {
        let key = resource.key();
        debug!(key = %key, "Creating object");
        let api = self.api(resource.kind, resource.namespace());
        self.bounded(
            "create",
            &key,
            api.create(&Self::post_params(), &resource.object),
        )
        .await
    }

    async fn update(&self, kind: ResourceKind, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::of(kind, object);
        debug!(key = %key, version = ?object.metadata.resource_version, "Updating object");
        let api = self.api(kind, object.metadata.namespace.as_deref());
        self.bounded(
            "update",
            &key,
            api.replace(&key.name, &Self::post_params(), object),
        )
        .await
    }

    async fn update_status(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        let key = ObjectKey::of(kind, object);
        debug!(key = %key, version = ?object.metadata.resource_version, "Updating status");
        let api = self.api(kind, object.metadata.namespace.as_deref());
        let body = serde_json::to_vec(object)?;
        self.bounded(
            "update_status",
            &key,
            api.replace_status(&key.name, &Self::post_params(), body),
        )
        .await
    }
}
