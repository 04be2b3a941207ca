//! Components deployed directly as workloads

use super::DerivedParameters;
use crate::crd::{GuideSpec, ImageComponentSpec};
use crate::factory::{self, Labels, Mount, MountSource, Owner, PortSpec, WorkloadSpec};
use crate::policy::{service_account_principal, ANYUID_POLICY};
use crate::provisioner::ComponentPlan;
use std::collections::BTreeMap;

/// Service, route and deployment of a single-port web application
#[allow(clippy::too_many_arguments)]
fn expose(
    plan: ComponentPlan,
    owner: &Owner,
    name: &str,
    namespace: &str,
    labels: &Labels,
    workload: WorkloadSpec,
    port: i32,
    params: &DerivedParameters,
) -> ComponentPlan {
    let workload = workload.port("http", port);
    plan.ensure(factory::service(
        owner,
        name,
        namespace,
        labels,
        &[PortSpec::new("http", port)],
    ))
    .ensure(factory::route(
        owner,
        name,
        namespace,
        labels,
        name,
        "http",
        &params.route_host(name, namespace),
    ))
    .ensure(factory::deployment(owner, name, namespace, labels, &workload))
}

pub(super) fn gitea(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ImageComponentSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "gitea";
    let labels = factory::labels("gitea", "gitea", "server");
    let workload = WorkloadSpec::new(spec.image.reference_or("gitea/gitea:1.11.4"))
        .service_account("gitea")
        .env("ROOT_URL", format!("https://{}", params.route_host("gitea", NAMESPACE)))
        .env("INSTALL_LOCK", "true")
        .env("DISABLE_REGISTRATION", "false")
        .mount(Mount::new("data", "/data", MountSource::Claim("gitea-data".to_string())));

    // Gitea's image runs its ssh daemon as root
    let plan = plan
        .ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::service_account(owner, "gitea", NAMESPACE))
        .grant(ANYUID_POLICY, service_account_principal(NAMESPACE, "gitea"))
        .ensure(factory::persistent_volume_claim(owner, "gitea-data", NAMESPACE, &labels, "1Gi"));
    expose(plan, owner, "gitea", NAMESPACE, &labels, workload, 3000, params)
}

pub(super) fn nexus(
    plan: ComponentPlan,
    owner: &Owner,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "nexus";
    let labels = factory::labels("nexus", "nexus", "server");
    let workload = WorkloadSpec::new("sonatype/nexus3:3.21.2")
        .env("INSTALL4J_ADD_VM_PARAMS", "-Xms1200m -Xmx1200m -XX:MaxDirectMemorySize=2g")
        .mount(Mount::new(
            "data",
            "/nexus-data",
            MountSource::Claim("nexus-data".to_string()),
        ));

    let plan = plan
        .ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::persistent_volume_claim(owner, "nexus-data", NAMESPACE, &labels, "10Gi"));
    expose(plan, owner, "nexus", NAMESPACE, &labels, workload, 8081, params)
}

pub(super) fn etherpad(
    plan: ComponentPlan,
    owner: &Owner,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "etherpad";
    let labels = factory::labels("etherpad", "etherpad", "server");

    let mut settings = BTreeMap::new();
    settings.insert("TITLE".to_string(), "Workshop Etherpad".to_string());
    settings.insert(
        "DEFAULT_PAD_TEXT".to_string(),
        format!("Workshop for {} attendees", params.users),
    );

    let workload = WorkloadSpec::new("etherpad/etherpad:1.8.4")
        .env("TITLE", "Workshop Etherpad")
        .mount(Mount::new(
            "settings",
            "/opt/etherpad-lite/settings",
            MountSource::ConfigMap("etherpad-settings".to_string()),
        ))
        .mount(Mount::new("var", "/opt/etherpad-lite/var", MountSource::EmptyDir));

    let plan = plan
        .ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::config_map(owner, "etherpad-settings", NAMESPACE, &labels, settings));
    expose(plan, owner, "etherpad", NAMESPACE, &labels, workload, 9001, params)
}

pub(super) fn istio_workspace(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ImageComponentSpec,
) -> ComponentPlan {
    const NAMESPACE: &str = "istio-workspace-operator";
    const NAME: &str = "istio-workspace";
    let labels = factory::labels("istio-workspace", NAME, "operator");

    let rules = vec![
        factory::rule(&["maistra.io"], &["*"], &["*"]),
        factory::rule(&["networking.istio.io"], &["*"], &["*"]),
        factory::rule(
            &["apps", "apps.openshift.io"],
            &["deployments", "deploymentconfigs"],
            &["*"],
        ),
        factory::rule(&[""], &["pods", "services", "endpoints", "events", "configmaps"], &["*"]),
    ];

    let workload =
        WorkloadSpec::new(spec.image.reference_or("quay.io/maistra/istio-workspace:latest"))
            .service_account(NAME)
            .command(&["ike"])
            .args(&["serve"])
            .env("WATCH_NAMESPACE", "")
            .env("OPERATOR_NAME", NAME);

    plan.ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::service_account(owner, NAME, NAMESPACE))
        .ensure(factory::cluster_role(owner, NAME, rules))
        .ensure(factory::cluster_role_binding(owner, NAME, NAMESPACE, NAME, NAME))
        .ensure(factory::deployment(owner, NAME, NAMESPACE, &labels, &workload))
}

/// Raw-content URL of a path in a git repository at a reference
fn content_url(repository: &str, reference: &str, path: &str) -> String {
    let mut url = repository.trim_end_matches('/').to_string();
    for part in [reference, path] {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            url.push('/');
            url.push_str(part);
        }
    }
    url
}

pub(super) fn guide(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &GuideSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "guide";
    let labels = factory::labels("guide", "guide", "web");

    let prefix = content_url(
        &spec.git_repository_guide_path,
        &spec.git_repository_guide_reference,
        &spec.git_repository_guide_context,
    );
    let workshops = content_url(&prefix, "", &spec.git_repository_guide_file);
    let labs = content_url(&spec.git_repository_lab_path, &spec.git_repository_lab_reference, "");

    let workload = WorkloadSpec::new("quay.io/osevg/workshopper")
        .env("CONTENT_URL_PREFIX", prefix)
        .env("WORKSHOPS_URLS", workshops)
        .env("LAB_REPOSITORY", labs)
        .env("LOG_TO_STDOUT", "true")
        .env("OPENSHIFT_USER_COUNT", params.users.to_string())
        .env("OPENSHIFT_PASSWORD", params.password.clone())
        .env("APPS_HOSTNAME_SUFFIX", params.apps_domain.clone());

    let plan = plan.ensure(factory::namespace(owner, NAMESPACE));
    expose(plan, owner, "guide", NAMESPACE, &labels, workload, 8080, params)
}

pub(super) fn bookbag(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ImageComponentSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "bookbag";
    let labels = factory::labels("bookbag", "bookbag", "web");
    let workload = WorkloadSpec::new(
        spec.image
            .reference_or("quay.io/openshiftlabs/workshop-dashboard:5.0.0"),
    )
    .service_account("bookbag")
    .env("WORKSHOP_GIT_URL", params.git_url.clone())
    .env("WORKSHOP_GIT_BRANCH", params.git_branch.clone())
    .env("CLUSTER_SUBDOMAIN", params.apps_domain.clone())
    .env("OPENSHIFT_PROJECT", NAMESPACE);

    let plan = plan
        .ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::service_account(owner, "bookbag", NAMESPACE))
        .ensure(factory::role_binding(
            owner,
            "bookbag-view",
            NAMESPACE,
            vec![factory::service_account_subject(NAMESPACE, "bookbag")],
            "ClusterRole",
            "view",
        ));
    expose(plan, owner, "bookbag", NAMESPACE, &labels, workload, 10080, params)
}

pub(super) fn username_distribution(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ImageComponentSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    const NAMESPACE: &str = "username-distribution";
    let labels = factory::labels("username-distribution", "username-distribution", "web");

    let mut credentials = BTreeMap::new();
    credentials.insert("LAB_USER_PASS".to_string(), params.password.clone());
    credentials.insert("LAB_ADMIN_PASS".to_string(), params.password.clone());

    let workload = WorkloadSpec::new(
        spec.image
            .reference_or("quay.io/openshiftlabs/username-distribution:1.3"),
    )
    .env_from_secret("username-distribution")
    .env("LAB_USER_COUNT", params.users.to_string())
    .env("LAB_USER_PREFIX", "user")
    .env("LAB_TITLE", "Workshop")
    .env(
        "LAB_MODULE_URLS",
        format!("https://{}", params.route_host("guide", "guide")),
    );

    let plan = plan
        .ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::secret(owner, "username-distribution", NAMESPACE, &labels, credentials));
    expose(
        plan,
        owner,
        "username-distribution",
        NAMESPACE,
        &labels,
        workload,
        8080,
        params,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::Step;
    use crate::store::ResourceKind;
    use crate::testing::workshop;

    fn params() -> DerivedParameters {
        DerivedParameters {
            users: 4,
            password: "openshift".to_string(),
            apps_domain: "apps.example.com".to_string(),
            git_url: "https://github.com/example/workshop".to_string(),
            git_branch: "main".to_string(),
        }
    }

    fn find(plan: &ComponentPlan, kind: ResourceKind) -> serde_json::Value {
        plan.steps()
            .iter()
            .find_map(|s| match s {
                Step::Ensure(r) if r.kind == kind => Some(r.object.data.clone()),
                _ => None,
            })
            .unwrap()
    }

    fn env(deployment: &serde_json::Value, name: &str) -> String {
        deployment["spec"]["template"]["spec"]["containers"][0]["env"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["name"] == name)
            .and_then(|e| e["value"].as_str())
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_content_url() {
        assert_eq!(
            content_url("https://raw.example.com/org/guide/", "master", "/labs/"),
            "https://raw.example.com/org/guide/master/labs"
        );
        assert_eq!(content_url("https://x", "", ""), "https://x");
    }

    #[test]
    fn test_gitea_route_host() {
        let ws = workshop("demo");
        let plan = gitea(
            ComponentPlan::new("gitea"),
            &Owner::of(&ws),
            &ImageComponentSpec::default(),
            &params(),
        );
        plan.validate().unwrap();
        assert_eq!(
            find(&plan, ResourceKind::Route)["spec"]["host"],
            "gitea-gitea.apps.example.com"
        );
        assert_eq!(
            env(&find(&plan, ResourceKind::Deployment), "ROOT_URL"),
            "https://gitea-gitea.apps.example.com"
        );
    }

    #[test]
    fn test_guide_urls() {
        let mut ws = workshop("demo");
        let guide_spec = &mut ws.spec.infrastructure.guide;
        guide_spec.git_repository_guide_path = "https://raw.example.com/org/guide".to_string();
        guide_spec.git_repository_guide_reference = "v1".to_string();
        guide_spec.git_repository_guide_context = "ocp".to_string();
        guide_spec.git_repository_guide_file = "_workshop.yml".to_string();

        let plan = guide(
            ComponentPlan::new("guide"),
            &Owner::of(&ws),
            &ws.spec.infrastructure.guide,
            &params(),
        );
        let deployment = find(&plan, ResourceKind::Deployment);
        assert_eq!(
            env(&deployment, "CONTENT_URL_PREFIX"),
            "https://raw.example.com/org/guide/v1/ocp"
        );
        assert_eq!(
            env(&deployment, "WORKSHOPS_URLS"),
            "https://raw.example.com/org/guide/v1/ocp/_workshop.yml"
        );
        assert_eq!(env(&deployment, "OPENSHIFT_USER_COUNT"), "4");
    }

    #[test]
    fn test_username_distribution_keeps_password_in_secret() {
        let ws = workshop("demo");
        let plan = username_distribution(
            ComponentPlan::new("usernameDistribution"),
            &Owner::of(&ws),
            &ImageComponentSpec::default(),
            &params(),
        );
        let secret = find(&plan, ResourceKind::Secret);
        assert_eq!(secret["stringData"]["LAB_USER_PASS"], "openshift");
        let deployment = find(&plan, ResourceKind::Deployment);
        assert_eq!(env(&deployment, "LAB_USER_COUNT"), "4");
        assert_eq!(
            env(&deployment, "LAB_MODULE_URLS"),
            "https://guide-guide.apps.example.com"
        );
        let container = &deployment["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["envFrom"][0]["secretRef"]["name"], "username-distribution");
        assert!(container["env"]
            .as_array()
            .unwrap()
            .iter()
            .all(|e| e["name"] != "LAB_USER_PASS"));
    }
}
