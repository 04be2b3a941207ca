//! Per-component status tracking

use crate::components::Component;
use crate::crd::{Workshop, STATUS_INSTALLED};
use crate::error::Result;
use crate::store::{ObjectStore, ResourceDescription, ResourceKind};
use kube::ResourceExt;
use tracing::info;

/// Record `component` as installed on the workshop's status.
///
/// Performs a single status write guarded by the workshop's resource
/// version and returns the stored workshop, whose fresh version must be used
/// for any further write in the same pass. A component that is already
/// marked installed is returned unchanged without a write, so the status
/// never regresses and repeated passes do not churn the object. A version
/// conflict is returned as is; it is retryable.
pub async fn mark_installed<S>(
    store: &S,
    workshop: &Workshop,
    component: Component,
) -> Result<Workshop>
where
    S: ObjectStore + ?Sized,
{
    if component.is_installed(workshop) {
        return Ok(workshop.clone());
    }

    let mut updated = workshop.clone();
    let status = updated.status.get_or_insert_with(Default::default);
    *component.status_mut(status) = STATUS_INSTALLED.to_string();

    let object = ResourceDescription::from_resource(ResourceKind::Workshop, &updated).object;
    let stored = store.update_status(ResourceKind::Workshop, &object).await?;

    info!(name = %workshop.name_any(), component = %component, "Component installed");

    Ok(serde_json::from_value(serde_json::to_value(stored)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{store_workshop, workshop, MemoryStore, Op};

    #[tokio::test]
    async fn test_mark_installed_writes_status_once() {
        let store = MemoryStore::new();
        let ws = store_workshop(&store, &workshop("demo"));

        let fresh = mark_installed(&store, &ws, Component::Vault).await.unwrap();
        assert_eq!(fresh.status.as_ref().unwrap().vault, STATUS_INSTALLED);
        assert_ne!(fresh.metadata.resource_version, ws.metadata.resource_version);

        let again = mark_installed(&store, &fresh, Component::Vault).await.unwrap();
        assert_eq!(again.metadata.resource_version, fresh.metadata.resource_version);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_fresh_copy_allows_next_write() {
        let store = MemoryStore::new();
        let ws = store_workshop(&store, &workshop("demo"));

        let ws = mark_installed(&store, &ws, Component::Gitea).await.unwrap();
        let ws = mark_installed(&store, &ws, Component::Nexus).await.unwrap();

        let status = ws.status.unwrap();
        assert_eq!(status.gitea, STATUS_INSTALLED);
        assert_eq!(status.nexus, STATUS_INSTALLED);
        assert_eq!(status.vault, "");
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let store = MemoryStore::new();
        let stale = store_workshop(&store, &workshop("demo"));
        mark_installed(&store, &stale, Component::Gitea).await.unwrap();

        let err = mark_installed(&store, &stale, Component::Nexus).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.is_retryable());

        // The earlier installed entry survives
        let stored = store.object(ResourceKind::Workshop, None, "demo").unwrap();
        assert_eq!(stored.data["status"]["gitea"], STATUS_INSTALLED);
    }

    #[tokio::test]
    async fn test_status_write_leaves_spec_alone() {
        let store = MemoryStore::new();
        let ws = store_workshop(&store, &workshop("demo"));
        let mut edited = ws.clone();
        edited.spec.user.number = 99;

        mark_installed(&store, &edited, Component::Etherpad).await.unwrap();

        let stored = store.object(ResourceKind::Workshop, None, "demo").unwrap();
        assert_eq!(stored.data["spec"]["user"]["number"], 2);
        assert_eq!(store.first_call(Op::UpdateStatus, ResourceKind::Workshop), Some(0));
    }
}
