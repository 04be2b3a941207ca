//! Shared security-policy membership
//!
//! Components whose workloads need elevated privilege add their service
//! account to a cluster-scoped SecurityContextConstraints object. That object
//! is shared with every other writer in the cluster, so membership is only
//! ever appended, and every append is a read-merge-write guarded by the
//! resource version that was read.

use crate::error::{OperatorError, Result};
use crate::store::{ObjectStore, ResourceKind};
use kube::api::DynamicObject;
use tracing::{debug, info};

/// Policy granting the privileged SCC
pub const PRIVILEGED_POLICY: &str = "privileged";

/// Policy allowing containers to run as any UID
pub const ANYUID_POLICY: &str = "anyuid";

/// Principal name of a service account as the policy lists it
pub fn service_account_principal(namespace: &str, service_account: &str) -> String {
    format!("system:serviceaccount:{}:{}", namespace, service_account)
}

/// Splits a service account principal into (namespace, name)
pub fn parse_service_account_principal(principal: &str) -> Option<(&str, &str)> {
    let rest = principal.strip_prefix("system:serviceaccount:")?;
    let (namespace, name) = rest.split_once(':')?;
    if namespace.is_empty() || name.is_empty() || name.contains(':') {
        return None;
    }
    Some((namespace, name))
}

/// A versioned snapshot of a shared policy object.
///
/// The snapshot keeps the full object so that writing it back only changes
/// the principal list; every other field and the resource version read are
/// carried through unchanged.
#[derive(Debug, Clone)]
pub struct SecurityPolicyGrant {
    object: DynamicObject,
    principals: Vec<String>,
}

impl SecurityPolicyGrant {
    /// Parse a stored policy object; a missing `users` list is empty
    pub fn from_object(object: DynamicObject) -> Result<Self> {
        let principals = match object.data.get("users") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(users) => serde_json::from_value(users.clone())?,
        };
        Ok(Self { object, principals })
    }

    pub fn contains(&self, principal: &str) -> bool {
        self.principals.iter().any(|p| p == principal)
    }

    /// Append `principal`; returns false when it was already a member
    pub fn insert(&mut self, principal: &str) -> bool {
        if self.contains(principal) {
            return false;
        }
        self.principals.push(principal.to_string());
        true
    }

    /// The object to write back, with the merged principal list
    pub fn into_object(self) -> DynamicObject {
        let mut object = self.object;
        match object.data.as_object_mut() {
            Some(map) => {
                map.insert("users".to_string(), serde_json::json!(self.principals));
            }
            None => object.data = serde_json::json!({ "users": self.principals }),
        }
        object
    }
}

/// Result of [`grant_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The principal was already a member; nothing was written
    AlreadyPresent,
    /// The principal was appended after `attempts` read-merge-write rounds
    Granted { attempts: u32 },
}

/// Ensure `principal` is a member of the shared policy `policy`.
///
/// Reads the policy, returns without writing when the principal is already
/// present, otherwise appends it and writes back with the version read. A
/// version conflict restarts the whole read-merge-write, at most
/// `conflict_retries` times; after that the conflict is returned so the
/// scheduler retries later. A missing policy object is returned as
/// [`OperatorError::NotFound`] and is never created here.
pub async fn grant_if_absent<S>(
    store: &S,
    policy: &str,
    principal: &str,
    conflict_retries: u32,
) -> Result<GrantOutcome>
where
    S: ObjectStore + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let object = store
            .get(ResourceKind::SecurityContextConstraints, None, policy)
            .await?
            .ok_or_else(|| OperatorError::NotFound {
                kind: ResourceKind::SecurityContextConstraints.to_string(),
                name: policy.to_string(),
                namespace: String::new(),
            })?;

        let mut grant = SecurityPolicyGrant::from_object(object)?;
        if !grant.insert(principal) {
            debug!(policy = %policy, principal = %principal, "Principal already granted");
            return Ok(GrantOutcome::AlreadyPresent);
        }

        match store
            .update(ResourceKind::SecurityContextConstraints, &grant.into_object())
            .await
        {
            Ok(_) => {
                info!(
                    policy = %policy,
                    principal = %principal,
                    attempts = attempt,
                    "Granted policy"
                );
                return Ok(GrantOutcome::Granted { attempts: attempt });
            }
            Err(e) if e.is_conflict() && attempt <= conflict_retries => {
                debug!(
                    policy = %policy,
                    principal = %principal,
                    attempt = attempt,
                    "Policy changed since read, re-merging"
                );
            }
            Err(e) => return Err(e),
        }
    }
}
