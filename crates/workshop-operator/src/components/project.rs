//! Per-attendee projects

use super::DerivedParameters;
use crate::crd::ProjectSpec;
use crate::factory::{self, Owner};
use crate::provisioner::ComponentPlan;

const DEFAULT_STAGING_NAME: &str = "project";

/// Name of attendee `index`'s project, `user<index>-<stagingName>`
pub fn user_project(spec: &ProjectSpec, index: i32) -> String {
    let suffix = if spec.staging_name.is_empty() {
        DEFAULT_STAGING_NAME
    } else {
        &spec.staging_name
    };
    format!("user{}-{}", index, suffix)
}

pub(super) fn plan(
    plan: ComponentPlan,
    owner: &Owner,
    spec: &ProjectSpec,
    params: &DerivedParameters,
) -> ComponentPlan {
    (1..=params.users.max(0)).fold(plan, |plan, index| {
        let namespace = user_project(spec, index);
        let user = format!("user{}", index);
        plan.ensure(factory::namespace(owner, &namespace))
            .ensure(factory::role_binding(
                owner,
                &format!("{}-admin", user),
                &namespace,
                vec![factory::user_subject(&user)],
                "ClusterRole",
                "admin",
            ))
    })
}
