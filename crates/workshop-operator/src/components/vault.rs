//! Vault server and agent injector

use crate::crd::VaultSpec;
use crate::factory::{self, Mount, MountSource, Owner, PortSpec, WebhookSpec, WorkloadSpec};
use crate::policy::{service_account_principal, PRIVILEGED_POLICY};
use crate::provisioner::ComponentPlan;
use std::collections::BTreeMap;

const NAMESPACE: &str = "vault";
const SERVER: &str = "vault";
const INJECTOR: &str = "vault-agent-injector";
const DEFAULT_IMAGE: &str = "vault:1.4.0";
const DEFAULT_INJECTOR_IMAGE: &str = "hashicorp/vault-k8s:0.3.0";

const SERVER_CONFIG: &str = r#"disable_mlock = true
ui = true

listener "tcp" {
	tls_disable = 1
	address = "[::]:8200"
	cluster_address = "[::]:8201"
}
storage "file" {
	path = "/vault/data"
}
"#;

pub(super) fn plan(plan: ComponentPlan, owner: &Owner, spec: &VaultSpec) -> ComponentPlan {
    let image = spec.image.reference_or(DEFAULT_IMAGE);
    let plan = server(plan, owner, &image);
    let injector_image = spec.agent_injector_image.reference_or(DEFAULT_INJECTOR_IMAGE);
    agent_injector(plan, owner, &image, &injector_image)
}

fn server(plan: ComponentPlan, owner: &Owner, image: &str) -> ComponentPlan {
    let labels = factory::labels("vault", SERVER, "server");
    let ports = [PortSpec::new("http", 8200), PortSpec::new("internal", 8201)];

    let mut config = BTreeMap::new();
    config.insert("extraconfig-from-values.hcl".to_string(), SERVER_CONFIG.to_string());

    let workload = WorkloadSpec::new(image)
        .service_account(SERVER)
        .port("http", 8200)
        .port("internal", 8201)
        .command(&["/bin/sh", "-ec"])
        .args(&["cp /vault/config/extraconfig-from-values.hcl /tmp/storageconfig.hcl && \
                 exec vault server -config=/tmp/storageconfig.hcl"])
        .env("VAULT_ADDR", "http://127.0.0.1:8200")
        .env("SKIP_CHOWN", "true")
        .env("SKIP_SETCAP", "true")
        .mount(Mount::new(
            "config",
            "/vault/config",
            MountSource::ConfigMap("vault-config".to_string()),
        ));

    plan.ensure(factory::namespace(owner, NAMESPACE))
        .ensure(factory::config_map(owner, "vault-config", NAMESPACE, &labels, config))
        .ensure(factory::service_account(owner, SERVER, NAMESPACE))
        .grant(PRIVILEGED_POLICY, service_account_principal(NAMESPACE, SERVER))
        .ensure(factory::cluster_role_binding(
            owner,
            "vault-server-binding",
            NAMESPACE,
            SERVER,
            "system:auth-delegator",
        ))
        .ensure(factory::service(owner, "vault-internal", NAMESPACE, &labels, &ports))
        .ensure(factory::service(owner, SERVER, NAMESPACE, &labels, &ports))
        .ensure(factory::stateful_set(
            owner,
            SERVER,
            NAMESPACE,
            &labels,
            &workload,
            "/vault/data",
            "1Gi",
        ))
}

fn agent_injector(
    plan: ComponentPlan,
    owner: &Owner,
    vault_image: &str,
    injector_image: &str,
) -> ComponentPlan {
    let labels = factory::labels("vault", INJECTOR, "webhook");
    let hosts = format!("{0},{0}.{1},{0}.{1}.svc", INJECTOR, NAMESPACE);

    let workload = WorkloadSpec::new(injector_image)
        .service_account(INJECTOR)
        .port("https", 8080)
        .args(&["agent-inject", "2>&1"])
        .env("AGENT_INJECT_LISTEN", ":8080")
        .env("AGENT_INJECT_LOG_LEVEL", "info")
        .env("AGENT_INJECT_VAULT_ADDR", format!("http://{}.{}.svc:8200", SERVER, NAMESPACE))
        .env("AGENT_INJECT_VAULT_IMAGE", vault_image)
        .env("AGENT_INJECT_TLS_AUTO", "vault-agent-injector-cfg")
        .env("AGENT_INJECT_TLS_AUTO_HOSTS", hosts);

    let rules = vec![factory::rule(
        &["admissionregistration.k8s.io"],
        &["mutatingwebhookconfigurations"],
        &["get", "list", "watch", "patch"],
    )];

    let webhook = WebhookSpec {
        name: "vault.hashicorp.com".to_string(),
        service_namespace: NAMESPACE.to_string(),
        service_name: INJECTOR.to_string(),
        path: "/mutate".to_string(),
        resources: vec!["pods".to_string()],
    };

    plan.ensure(factory::service_account(owner, INJECTOR, NAMESPACE))
        .grant(PRIVILEGED_POLICY, service_account_principal(NAMESPACE, INJECTOR))
        .ensure(factory::cluster_role(owner, INJECTOR, rules))
        .ensure(factory::cluster_role_binding(owner, INJECTOR, NAMESPACE, INJECTOR, INJECTOR))
        .ensure(factory::service(
            owner,
            INJECTOR,
            NAMESPACE,
            &labels,
            &[PortSpec::with_target("https", 443, 8080)],
        ))
        .ensure(factory::deployment(owner, INJECTOR, NAMESPACE, &labels, &workload))
        .ensure(factory::mutating_webhook_configuration(
            owner,
            "vault-agent-injector-cfg",
            &labels,
            &[webhook],
        ))
}
