//! Workshop Controller
//!
//! This module wires the [`Reconciler`] into the Kubernetes controller
//! runtime. It watches `Workshop` resources, runs a reconcile pass for every
//! change and requeues failed passes with exponential backoff.

use crate::config::OperatorConfig;
use crate::crd::Workshop;
use crate::error::{OperatorError, Result};
use crate::reconciler::Reconciler;
use crate::store::{KubeStore, ObjectStore};
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Requeue interval for error cases (base for exponential backoff)
const ERROR_REQUEUE_SECONDS: u64 = 30;

/// Maximum requeue delay for error backoff
const MAX_ERROR_REQUEUE_SECONDS: u64 = 600;

/// Context passed to the controller
pub struct ControllerContext<S: ObjectStore + ?Sized = KubeStore> {
    /// Reconcile pass runner
    pub reconciler: Reconciler<S>,
    /// Metrics recorder (optional)
    pub metrics: Option<ControllerMetrics>,
    /// Per-workshop error retry counts for exponential backoff
    pub error_counts: dashmap::DashMap<String, u32>,
}

impl<S: ObjectStore + ?Sized> ControllerContext<S> {
    pub fn new(reconciler: Reconciler<S>, metrics: Option<ControllerMetrics>) -> Self {
        Self {
            reconciler,
            metrics,
            error_counts: dashmap::DashMap::new(),
        }
    }
}

/// Metrics for the controller
#[derive(Clone)]
pub struct ControllerMetrics {
    /// Counter for reconciliation attempts
    pub reconciliations: metrics::Counter,
    /// Counter for reconciliation errors
    pub errors: metrics::Counter,
    /// Histogram for reconciliation duration
    pub duration: metrics::Histogram,
}

impl ControllerMetrics {
    /// Create new controller metrics
    pub fn new() -> Self {
        Self {
            reconciliations: metrics::counter!("workshop_operator_reconciliations_total"),
            errors: metrics::counter!("workshop_operator_reconciliation_errors_total"),
            duration: metrics::histogram!("workshop_operator_reconciliation_duration_seconds"),
        }
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the Workshop controller
pub async fn run_controller(client: Client, config: OperatorConfig) -> Result<()> {
    config.validate()?;

    let workshops: Api<Workshop> = Api::all(client.clone());
    let store = Arc::new(KubeStore::with_config(client, config.store_config()));
    let ctx = Arc::new(ControllerContext::new(
        Reconciler::new(store, config.clone()),
        Some(ControllerMetrics::new()),
    ));

    info!(
        apps_domain = config.apps_domain.as_deref().unwrap_or("discovered"),
        conflict_retries = config.conflict_retries,
        "Starting Workshop controller"
    );

    Controller::new(workshops, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(name = obj.name, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed");
                }
            }
        })
        .await;

    Ok(())
}

/// Main reconciliation function
#[instrument(skip(workshop, ctx), fields(name = %workshop.name_any()))]
async fn reconcile<S>(workshop: Arc<Workshop>, ctx: Arc<ControllerContext<S>>) -> Result<Action>
where
    S: ObjectStore + ?Sized,
{
    let start = std::time::Instant::now();

    if let Some(ref metrics) = ctx.metrics {
        metrics.reconciliations.increment(1);
    }

    let result = ctx.reconciler.reconcile(&workshop).await;

    if let Some(ref metrics) = ctx.metrics {
        metrics.duration.record(start.elapsed().as_secs_f64());
    }

    match &result {
        // Reset error backoff counter on success
        Ok(_) => {
            ctx.error_counts.remove(&workshop.name_any());
        }
        Err(_) => {
            if let Some(ref metrics) = ctx.metrics {
                metrics.errors.increment(1);
            }
        }
    }

    result
}

/// Requeue delay after `retries` consecutive failures
fn backoff_delay(error: &OperatorError, retries: u32) -> Duration {
    // Use the error's suggested delay OR exponential backoff:
    // 30s → 60s → 120s → 240s → 480s → 600s (capped)
    error.requeue_delay().unwrap_or_else(|| {
        let base = Duration::from_secs(ERROR_REQUEUE_SECONDS);
        let backoff = base * 2u32.saturating_pow(retries.saturating_sub(1).min(5));
        backoff.min(Duration::from_secs(MAX_ERROR_REQUEUE_SECONDS))
    })
}

/// Error policy for the controller
fn error_policy<S>(
    workshop: Arc<Workshop>,
    error: &OperatorError,
    ctx: Arc<ControllerContext<S>>,
) -> Action
where
    S: ObjectStore + ?Sized,
{
    let key = workshop.name_any();
    let retries = {
        let mut entry = ctx.error_counts.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    };

    let delay = backoff_delay(error, retries);

    warn!(
        error = %error,
        retry = retries,
        delay_secs = delay.as_secs(),
        "Reconciliation error for '{}', will retry",
        key
    );

    Action::requeue(delay)
}
