//! In-memory [`ObjectStore`] and fixtures for unit tests

use crate::crd::{Workshop, WorkshopSpec};
use crate::error::{OperatorError, Result};
use crate::store::{ObjectKey, ObjectStore, ResourceDescription, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::core::ErrorResponse;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Store verb recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    UpdateStatus,
}

/// One store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub key: ObjectKey,
    /// Whether the call changed stored state
    pub wrote: bool,
}

type Hook = Box<dyn FnOnce(&mut DynamicObject) + Send>;

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    version: u64,
    calls: Vec<Call>,
    failures: HashMap<(Op, ObjectKey), u32>,
    before_update: HashMap<ObjectKey, Hook>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn record(&mut self, op: Op, key: &ObjectKey, wrote: bool) {
        self.calls.push(Call {
            op,
            key: key.clone(),
            wrote,
        });
    }

    fn injected_failure(&mut self, op: Op, key: &ObjectKey) -> Option<OperatorError> {
        let remaining = self.failures.get_mut(&(op, key.clone()))?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(OperatorError::KubeError(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("injected failure for {}", key),
            reason: "InternalError".to_string(),
            code: 500,
        })))
    }
}

/// Object store kept in memory with resource-version checks
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an object into the store without logging a call
    pub fn seed(&self, kind: ResourceKind, mut object: DynamicObject) {
        let mut state = self.state.lock();
        let key = ObjectKey::of(kind, &object);
        object.types = Some(kind.type_meta());
        object.metadata.resource_version = Some(state.next_version());
        state.objects.insert(key, object);
    }

    /// Seed an SCC-style policy object with the given users
    pub fn seed_policy(&self, name: &str, users: &[&str]) {
        self.seed(
            ResourceKind::SecurityContextConstraints,
            DynamicObject {
                types: None,
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
                data: serde_json::json!({
                    "allowPrivilegedContainer": true,
                    "users": users,
                }),
            },
        );
    }

    /// Seed the cluster ingress config holding the application domain
    pub fn seed_ingress_domain(&self, domain: &str) {
        self.seed(
            ResourceKind::IngressConfig,
            DynamicObject {
                types: None,
                metadata: ObjectMeta {
                    name: Some("cluster".to_string()),
                    ..Default::default()
                },
                data: serde_json::json!({ "spec": { "domain": domain } }),
            },
        );
    }

    /// Seed the usual prerequisites of a reconcile pass
    pub fn with_cluster_defaults() -> Self {
        let store = Self::new();
        store.seed_policy("privileged", &[]);
        store.seed_policy("anyuid", &[]);
        store.seed_ingress_domain("apps.example.com");
        store
    }

    /// Fail the next `times` calls of `op` on the object
    pub fn fail(
        &self,
        op: Op,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        times: u32,
    ) {
        self.state
            .lock()
            .failures
            .insert((op, ObjectKey::new(kind, namespace, name)), times);
    }

    /// Run `hook` against the stored object right before the next update of
    /// it, simulating a concurrent writer. The stored version is bumped.
    pub fn before_next_update<F>(&self, kind: ResourceKind, name: &str, hook: F)
    where
        F: FnOnce(&mut DynamicObject) + Send + 'static,
    {
        self.state
            .lock()
            .before_update
            .insert(ObjectKey::new(kind, None, name), Box::new(hook));
    }

    pub fn object(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<DynamicObject> {
        self.state
            .lock()
            .objects
            .get(&ObjectKey::new(kind, namespace, name))
            .cloned()
    }

    pub fn contains(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> bool {
        self.object(kind, namespace, name).is_some()
    }

    /// Users listed by a seeded policy object
    pub fn policy_users(&self, name: &str) -> Vec<String> {
        self.object(ResourceKind::SecurityContextConstraints, None, name)
            .and_then(|o| serde_json::from_value(o.data["users"].clone()).ok())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of calls that changed stored state
    pub fn writes(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.wrote).count()
    }

    /// Position of the first successful create of an object in the call log
    pub fn created_at(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<usize> {
        let key = ObjectKey::new(kind, namespace, name);
        self.state
            .lock()
            .calls
            .iter()
            .position(|c| c.op == Op::Create && c.wrote && c.key == key)
    }

    /// Position of the first call of `op` touching objects of `kind`
    pub fn first_call(&self, op: Op, kind: ResourceKind) -> Option<usize> {
        self.state
            .lock()
            .calls
            .iter()
            .position(|c| c.op == op && c.key.kind == kind)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        tokio::task::yield_now().await;
        let key = ObjectKey::new(kind, namespace, name);
        let mut state = self.state.lock();
        state.record(Op::Get, &key, false);
        if let Some(err) = state.injected_failure(Op::Get, &key) {
            return Err(err);
        }
        Ok(state.objects.get(&key).cloned())
    }

    async fn create(&self, resource: &ResourceDescription) -> Result<DynamicObject> {
        tokio::task::yield_now().await;
        let key = resource.key();
        let mut state = self.state.lock();
        if let Some(err) = state.injected_failure(Op::Create, &key) {
            state.record(Op::Create, &key, false);
            return Err(err);
        }
        if state.objects.contains_key(&key) {
            state.record(Op::Create, &key, false);
            return Err(OperatorError::AlreadyExists {
                kind: key.kind.to_string(),
                name: key.name.clone(),
            });
        }
        let mut object = resource.object.clone();
        object.metadata.resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), object.clone());
        state.record(Op::Create, &key, true);
        Ok(object)
    }

    async fn update(&self, kind: ResourceKind, object: &DynamicObject) -> Result<DynamicObject> {
        tokio::task::yield_now().await;
        let key = ObjectKey::of(kind, object);
        let mut state = self.state.lock();
        if let Some(err) = state.injected_failure(Op::Update, &key) {
            state.record(Op::Update, &key, false);
            return Err(err);
        }
        if let Some(hook) = state.before_update.remove(&key) {
            let version = state.next_version();
            if let Some(stored) = state.objects.get_mut(&key) {
                hook(stored);
                stored.metadata.resource_version = Some(version);
            }
        }
        let Some(stored) = state.objects.get(&key) else {
            state.record(Op::Update, &key, false);
            return Err(OperatorError::NotFound {
                kind: key.kind.to_string(),
                name: key.name.clone(),
                namespace: key.namespace.clone().unwrap_or_default(),
            });
        };
        if stored.metadata.resource_version != object.metadata.resource_version {
            state.record(Op::Update, &key, false);
            return Err(OperatorError::Conflict {
                kind: key.kind.to_string(),
                name: key.name.clone(),
            });
        }
        let mut updated = object.clone();
        updated.metadata.resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), updated.clone());
        state.record(Op::Update, &key, true);
        Ok(updated)
    }

    async fn update_status(
        &self,
        kind: ResourceKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject> {
        tokio::task::yield_now().await;
        let key = ObjectKey::of(kind, object);
        let mut state = self.state.lock();
        if let Some(err) = state.injected_failure(Op::UpdateStatus, &key) {
            state.record(Op::UpdateStatus, &key, false);
            return Err(err);
        }
        let version = state.next_version();
        let Some(stored) = state.objects.get_mut(&key) else {
            state.record(Op::UpdateStatus, &key, false);
            return Err(OperatorError::NotFound {
                kind: key.kind.to_string(),
                name: key.name.clone(),
                namespace: key.namespace.clone().unwrap_or_default(),
            });
        };
        if stored.metadata.resource_version != object.metadata.resource_version {
            state.record(Op::UpdateStatus, &key, false);
            return Err(OperatorError::Conflict {
                kind: key.kind.to_string(),
                name: key.name.clone(),
            });
        }
        // Only the status sub-resource changes
        if let (Some(map), Some(status)) =
            (stored.data.as_object_mut(), object.data.get("status"))
        {
            map.insert("status".to_string(), status.clone());
        }
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.record(Op::UpdateStatus, &key, true);
        Ok(updated)
    }
}

/// A workshop named `name` with no components enabled
pub fn workshop(name: &str) -> Workshop {
    let mut ws = Workshop::new(name, WorkshopSpec::default());
    ws.metadata.uid = Some(format!("{}-uid", name));
    ws.spec.user.number = 2;
    ws.spec.user.password = "openshift".to_string();
    ws.spec.source.git_url = "https://github.com/example/workshop".to_string();
    ws.spec.source.git_branch = "main".to_string();
    ws
}

/// Store `ws` in `store` and return the stored copy (with resource version)
pub fn store_workshop(store: &MemoryStore, ws: &Workshop) -> Workshop {
    let object = ResourceDescription::from_resource(ResourceKind::Workshop, ws).object;
    store.seed(ResourceKind::Workshop, object);
    let stored = store
        .object(ResourceKind::Workshop, None, &ws.metadata.name.clone().unwrap_or_default())
        .unwrap();
    serde_json::from_value(serde_json::to_value(stored).unwrap()).unwrap()
}
