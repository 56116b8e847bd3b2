//! The execution plan compiler.
//!
//! Turns a declarative view specification into concrete, registry-validated
//! execution plans, short-circuiting to the metric execution cache where a
//! fresh result exists. Failures never cross view boundaries: a view that
//! cannot compile becomes a per-view failure while its siblings proceed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::capabilities::registry::CapabilityRegistry;
use crate::clock::Clock;
use crate::errors::{CoreError, PlanError};
use crate::metrics::store::{MetricExecutionStore, MetricStore};
use crate::planner::spec::{ExecutionPlan, ViewSource, ViewSpec, ViewSpecification};
use crate::planner::validator::validate_plan;
use crate::types::{ExecutionContext, ExecutionResult, ResultSource, ViewId};

/// Advisory, human-readable note about one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewIssue {
    pub view_id: ViewId,
    pub message: String,
}

/// Compilation output: plans to run live, results served from the metric
/// cache, per-view failures, and advisory warnings (dropped parameters,
/// convention-synthesized capability ids, normalization problems).
#[derive(Debug, Default)]
pub struct CompiledSpec {
    pub plans: Vec<ExecutionPlan>,
    pub cached: Vec<ExecutionResult>,
    pub failures: Vec<(ViewId, CoreError)>,
    pub warnings: Vec<ViewIssue>,
}

enum ViewOutcome {
    Plan(ExecutionPlan),
    Cached(ExecutionResult),
}

pub struct PlanCompiler {
    registry: Arc<CapabilityRegistry>,
    metrics: Arc<dyn MetricStore>,
    executions: Arc<dyn MetricExecutionStore>,
    clock: Arc<dyn Clock>,
}

impl PlanCompiler {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        metrics: Arc<dyn MetricStore>,
        executions: Arc<dyn MetricExecutionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            metrics,
            executions,
            clock,
        }
    }

    /// The `{integration}_{resource}_list` convention for views that do not
    /// name a capability explicitly. Existence is only guaranteed at
    /// validation; the compiler flags unregistered synthesized ids as an
    /// advisory warning before the validation failure surfaces.
    pub fn synthesize_capability_id(integration_id: &str, resource: &str) -> String {
        format!("{integration_id}_{resource}_list")
    }

    /// Compile every view. Never fails as a whole.
    pub async fn compile(&self, spec: &ViewSpecification) -> CompiledSpec {
        let mut compiled = CompiledSpec::default();
        for view in &spec.views {
            match self.compile_view(view, &mut compiled.warnings).await {
                Ok(ViewOutcome::Plan(plan)) => compiled.plans.push(plan),
                Ok(ViewOutcome::Cached(result)) => compiled.cached.push(result),
                Err(err) => {
                    debug!(view = %view.id, error = %err, "view failed to compile");
                    compiled.failures.push((view.id.clone(), err));
                }
            }
        }
        compiled
    }

    /// Compile and execute a specification, assembling results keyed by
    /// view id. Each plan executes independently: an execution error becomes
    /// that view's error result and the remaining plans still run.
    pub async fn execute(
        &self,
        spec: &ViewSpecification,
        context: Arc<ExecutionContext>,
    ) -> Vec<ExecutionResult> {
        let compiled = self.compile(spec).await;
        let mut results = compiled.cached;

        for (view_id, err) in compiled.failures {
            results.push(ExecutionResult::failure(
                view_id,
                err.to_string(),
                self.clock.now(),
            ));
        }

        for plan in compiled.plans {
            let params = plan.params_value();
            match self
                .registry
                .execute(&plan.capability_id, params, Arc::clone(&context))
                .await
            {
                Ok(data) => results.push(ExecutionResult::success(
                    plan.view_id,
                    data,
                    ResultSource::Live,
                    self.clock.now(),
                )),
                Err(err) => results.push(ExecutionResult::failure(
                    plan.view_id,
                    err.to_string(),
                    self.clock.now(),
                )),
            }
        }

        results
    }

    async fn compile_view(
        &self,
        view: &ViewSpec,
        warnings: &mut Vec<ViewIssue>,
    ) -> Result<ViewOutcome, CoreError> {
        let (integration_id, resource, capability_id, mut params, synthesized) = match &view.source
        {
            ViewSource::Metric { metric_id } => {
                let metric = self
                    .metrics
                    .get(metric_id)
                    .await?
                    .ok_or_else(|| PlanError::MetricNotFound(metric_id.clone()))?;

                if !view.force_refresh {
                    if let Some(cached) = self.executions.latest_completed(metric_id).await? {
                        let completed_at = cached.completed_at.unwrap_or(cached.started_at);
                        if !metric
                            .definition
                            .policy
                            .is_stale(completed_at, self.clock.now())
                        {
                            debug!(view = %view.id, metric = %metric_id, "serving cached metric execution");
                            return Ok(ViewOutcome::Cached(ExecutionResult::success(
                                view.id.clone(),
                                cached.result.unwrap_or(Value::Null),
                                ResultSource::Cache,
                                completed_at,
                            )));
                        }
                    }
                }

                let mut params = metric.definition.query.flatten();
                // view-level query entries refine the metric's own
                if let Some(query) = &view.query {
                    for (key, value) in query.flatten() {
                        params.insert(key, value);
                    }
                }
                let (capability_id, synthesized) = match &metric.definition.capability_id {
                    Some(id) => (id.clone(), false),
                    None => (
                        Self::synthesize_capability_id(&metric.integration_id, &metric.resource),
                        true,
                    ),
                };
                (
                    metric.integration_id.clone(),
                    metric.resource.clone(),
                    capability_id,
                    params,
                    synthesized,
                )
            }
            ViewSource::Resource {
                integration_id,
                resource,
                capability_id,
            } => {
                let params = view
                    .query
                    .as_ref()
                    .map(|q| q.flatten())
                    .unwrap_or_default();
                let (capability_id, synthesized) = match capability_id {
                    Some(id) => (id.clone(), false),
                    None => (
                        Self::synthesize_capability_id(integration_id, resource),
                        true,
                    ),
                };
                (
                    integration_id.clone(),
                    resource.clone(),
                    capability_id,
                    params,
                    synthesized,
                )
            }
            ViewSource::Capability {
                capability_id,
                resource,
                params,
            } => {
                let mut flat = indexmap::IndexMap::new();
                if let Value::Object(map) = params {
                    for (key, value) in map {
                        flat.insert(key.clone(), value.clone());
                    }
                }
                if let Some(query) = &view.query {
                    for (key, value) in query.flatten() {
                        flat.insert(key, value);
                    }
                }
                // a direct capability query knows its integration only
                // through the registry; resolve it here so validation can
                // still catch a mismatch from an explicit override
                let integration_id = self
                    .registry
                    .get(capability_id)
                    .map(|def| def.integration_id.clone())
                    .unwrap_or_default();
                (
                    integration_id,
                    resource.clone().unwrap_or_default(),
                    capability_id.clone(),
                    flat,
                    false,
                )
            }
        };

        if synthesized && self.registry.get(&capability_id).is_none() {
            warnings.push(ViewIssue {
                view_id: view.id.clone(),
                message: format!(
                    "capability id '{capability_id}' was synthesized by convention and is not registered"
                ),
            });
        }

        // capability-specific normalization; failures surface at execution
        // time, not here
        if let Some(definition) = self.registry.get(&capability_id) {
            if let Some(normalizer) = &definition.normalizer {
                if let Err(reason) = normalizer.normalize(&mut params) {
                    warn!(view = %view.id, capability = %capability_id, "parameter normalization failed: {reason}");
                    warnings.push(ViewIssue {
                        view_id: view.id.clone(),
                        message: format!("parameter normalization failed: {reason}"),
                    });
                }
            }
        }

        let mut plan = ExecutionPlan {
            view_id: view.id.clone(),
            integration_id,
            capability_id,
            resource,
            params,
        };

        let dropped = validate_plan(&self.registry, &mut plan).map_err(CoreError::from)?;
        for message in dropped {
            warnings.push(ViewIssue {
                view_id: view.id.clone(),
                message,
            });
        }

        Ok(ViewOutcome::Plan(plan))
    }
}
