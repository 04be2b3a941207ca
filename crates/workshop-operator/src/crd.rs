//! Custom Resource Definitions for the Workshop Kubernetes Operator
//!
//! This module defines the `Workshop` CRD: a single declarative object that
//! enumerates which optional infrastructure components a training workshop
//! needs, plus the attendee and source-repository settings shared by all of
//! them.

use kube::CustomResource;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

/// Status value of a component whose provisioning sequence completed
pub const STATUS_INSTALLED: &str = "Installed";

/// Maximum number of attendees a single workshop may provision for
pub const MAX_USERS: i32 = 500;

/// Longest staging name whose `user<MAX_USERS>-<stagingName>` project is still a valid label
pub const MAX_STAGING_NAME_LEN: usize = 63 - "user-".len() - (MAX_USERS.ilog10() as usize + 1);

/// Regex for validating Kubernetes names (RFC 1123 label)
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

/// Regex for OLM channel names (e.g. "stable", "preview", "1.0")
static CHANNEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9._]*[A-Za-z0-9])?$").unwrap());

/// Validate a Kubernetes name (RFC 1123 label)
fn validate_k8s_name(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(()); // Empty is allowed for optional fields
    }
    if value.len() > 63 {
        return Err(
            ValidationError::new("name_too_long").with_message("name exceeds 63 characters".into())
        );
    }
    if !NAME_REGEX.is_match(value) {
        return Err(ValidationError::new("invalid_name").with_message(
            format!("'{}' is not a valid Kubernetes name (RFC 1123)", value).into(),
        ));
    }
    Ok(())
}

/// Validate a staging name as the suffix of every attendee project name
fn validate_staging_name(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_STAGING_NAME_LEN {
        return Err(ValidationError::new("staging_name_too_long").with_message(
            format!("staging name exceeds {} characters", MAX_STAGING_NAME_LEN).into(),
        ));
    }
    validate_k8s_name(value)
}

/// Validate a container image repository
fn validate_image_name(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(()); // Empty is allowed (uses default)
    }
    if value.len() > 255 {
        return Err(ValidationError::new("image_too_long")
            .with_message("image reference exceeds 255 characters".into()));
    }
    if value.contains("..") || value.starts_with('/') || value.starts_with('-') {
        return Err(ValidationError::new("invalid_image")
            .with_message(format!("'{}' is not a valid container image", value).into()));
    }
    if value.contains(char::is_whitespace) {
        return Err(ValidationError::new("invalid_image")
            .with_message("image reference must not contain whitespace".into()));
    }
    Ok(())
}

fn validate_channel(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    if !CHANNEL_REGEX.is_match(value) {
        return Err(ValidationError::new("invalid_channel")
            .with_message(format!("'{}' is not a valid operator channel", value).into()));
    }
    Ok(())
}

/// Workshop custom resource definition
///
/// Cluster-scoped: the components it provisions live in their own
/// namespaces and cluster-scoped objects (role bindings, webhooks) carry an
/// owner reference back to it.
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[kube(
    group = "workshop.openshift.io",
    version = "v1alpha1",
    kind = "Workshop",
    plural = "workshops",
    shortname = "ws",
    status = "WorkshopStatus",
    printcolumn = r#"{"name":"Users", "type":"integer", "jsonPath":".spec.user.number"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopSpec {
    /// Attendee provisioning
    #[serde(default)]
    #[validate(nested)]
    pub user: UserSpec,

    /// Git repository holding the workshop content
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceSpec,

    /// Optional infrastructure components
    #[serde(default)]
    #[validate(nested)]
    pub infrastructure: InfrastructureSpec,
}

/// Attendee accounts shared by every component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    /// Number of attendee accounts (user1..userN)
    #[serde(default)]
    #[validate(range(min = 0, max = 500, message = "user number must be between 0 and 500"))]
    pub number: i32,

    /// Password shared by all attendee accounts
    #[serde(default)]
    #[validate(length(max = 128, message = "password must be at most 128 characters"))]
    pub password: String,
}

/// Git repository holding the workshop content
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
pub struct SourceSpec {
    /// Clone URL
    #[serde(default, rename = "gitURL")]
    #[validate(length(max = 2048, message = "gitURL must be at most 2048 characters"))]
    pub git_url: String,

    /// Branch to check out
    #[serde(default, rename = "gitBranch")]
    #[validate(length(max = 255, message = "gitBranch must be at most 255 characters"))]
    pub git_branch: String,
}

/// One sub-specification per optional component
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    #[serde(default)]
    #[validate(nested)]
    pub argocd: OperatorComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub bookbag: ImageComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub cert_manager: OperatorComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub code_ready_workspace: CodeReadyWorkspaceSpec,

    #[serde(default)]
    pub etherpad: EnabledSpec,

    #[serde(default)]
    #[validate(nested)]
    pub gitea: ImageComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub guide: GuideSpec,

    #[serde(default)]
    #[validate(nested)]
    pub istio_workspace: ImageComponentSpec,

    #[serde(default)]
    pub nexus: EnabledSpec,

    #[serde(default)]
    #[validate(nested)]
    pub pipeline: OperatorComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub project: ProjectSpec,

    #[serde(default)]
    #[validate(nested)]
    pub service_mesh: ServiceMeshSpec,

    #[serde(default)]
    #[validate(nested)]
    pub serverless: OperatorComponentSpec,

    #[serde(default)]
    #[validate(nested)]
    pub vault: VaultSpec,

    #[serde(default)]
    #[validate(nested)]
    pub username_distribution: ImageComponentSpec,
}

/// Component with nothing to configure beyond its switch
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct EnabledSpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Component installed through an operator subscription
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OperatorComponentSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub operator_hub: OperatorHubSpec,
}

/// Component deployed from a single container image
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
pub struct ImageComponentSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub image: ImageSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CodeReadyWorkspaceSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub operator_hub: OperatorHubSpec,

    /// Let attendees log in with their cluster credentials
    #[serde(default, rename = "openshiftOAuth")]
    pub openshift_oauth: bool,

    #[serde(default)]
    #[validate(nested)]
    pub plugin_registry_image: ImageSpec,
}

/// Lab guide served from the workshop repository
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuideSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub git_repository_lab_path: String,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub git_repository_lab_reference: String,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub git_repository_guide_path: String,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub git_repository_guide_reference: String,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub git_repository_guide_context: String,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub git_repository_guide_file: String,
}

/// Per-attendee projects
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Suffix of each attendee's staging project (`userN-<stagingName>`)
    #[serde(default)]
    #[validate(custom(function = "validate_staging_name"))]
    pub staging_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMeshSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub service_mesh_operator_hub: OperatorHubSpec,

    #[serde(default)]
    #[validate(nested)]
    pub elastic_search_operator_hub: OperatorHubSpec,

    #[serde(default)]
    #[validate(nested)]
    pub jaeger_operator_hub: OperatorHubSpec,

    #[serde(default)]
    #[validate(nested)]
    pub kiali_operator_hub: OperatorHubSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VaultSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    #[validate(nested)]
    pub image: ImageSpec,

    #[serde(default)]
    #[validate(nested)]
    pub agent_injector_image: ImageSpec,
}

/// Managed-operator release to subscribe to
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorHubSpec {
    /// Subscription channel (e.g. "stable")
    #[serde(default)]
    #[validate(custom(function = "validate_channel"))]
    pub channel: String,

    /// Starting ClusterServiceVersion; empty lets the catalog pick
    #[serde(default)]
    #[validate(length(max = 253))]
    pub cluster_service_version: String,
}

impl OperatorHubSpec {
    /// Channel to subscribe to, falling back to the catalog default
    pub fn channel_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.channel.is_empty() {
            default
        } else {
            &self.channel
        }
    }
}

/// Container image reference
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, Validate, PartialEq, Eq)]
pub struct ImageSpec {
    /// Repository, e.g. "quay.io/org/app"
    #[serde(default)]
    #[validate(custom(function = "validate_image_name"))]
    pub name: String,

    /// Tag, e.g. "1.4.0"
    #[serde(default)]
    #[validate(length(max = 128, message = "image tag must be at most 128 characters"))]
    pub tag: String,
}

impl ImageSpec {
    /// Full `name:tag` reference, or `default` when no repository is set
    pub fn reference_or(&self, default: &str) -> String {
        match (self.name.is_empty(), self.tag.is_empty()) {
            (true, _) => default.to_string(),
            (false, true) => format!("{}:latest", self.name),
            (false, false) => format!("{}:{}", self.name, self.tag),
        }
    }
}

/// Observed state of a Workshop: one entry per component, `""` or `"Installed"`
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopStatus {
    #[serde(default)]
    pub argocd: String,
    #[serde(default)]
    pub bookbag: String,
    #[serde(default)]
    pub cert_manager: String,
    #[serde(default)]
    pub code_ready_workspace: String,
    #[serde(default)]
    pub etherpad: String,
    #[serde(default)]
    pub gitea: String,
    #[serde(default)]
    pub guide: String,
    #[serde(default)]
    pub istio_workspace: String,
    #[serde(default)]
    pub nexus: String,
    #[serde(default)]
    pub pipeline: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub service_mesh: String,
    #[serde(default)]
    pub serverless: String,
    #[serde(default)]
    pub username_distribution: String,
    #[serde(default)]
    pub vault: String,
}
