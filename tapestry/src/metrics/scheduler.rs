//! TTL-driven metric scheduling and the execution lifecycle around one run.
//!
//! A metric run owns exactly one execution row through
//! pending -> running -> (completed | failed). Execution failures are
//! captured on the row and never thrown to the scheduler's caller, so a
//! failed scheduled run cannot crash a scheduling loop. Alert evaluation is
//! fire-and-forget: its failures are logged and swallowed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::alerts::AlertEvaluator;
use crate::clock::Clock;
use crate::errors::{CoreResult, MetricError};
use crate::metrics::store::{MetricExecutionStore, MetricStore};
use crate::metrics::types::{ExecutionPolicy, MetricExecution};
use crate::planner::compiler::PlanCompiler;
use crate::planner::spec::{ViewSource, ViewSpec, ViewSpecification};
use crate::types::{ExecutionContext, ExecutionStatus, MetricId, OrgId};

pub struct MetricScheduler {
    metrics: Arc<dyn MetricStore>,
    executions: Arc<dyn MetricExecutionStore>,
    compiler: Arc<PlanCompiler>,
    alerts: Option<Arc<dyn AlertEvaluator>>,
    clock: Arc<dyn Clock>,
}

impl MetricScheduler {
    pub fn new(
        metrics: Arc<dyn MetricStore>,
        executions: Arc<dyn MetricExecutionStore>,
        compiler: Arc<PlanCompiler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            metrics,
            executions,
            compiler,
            alerts: None,
            clock,
        }
    }

    pub fn with_alerts(mut self, alerts: Arc<dyn AlertEvaluator>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Run a metric now, bypassing its execution cache, and record the full
    /// lifecycle on a fresh execution row. The returned row is `completed`
    /// or `failed`; only a missing metric or a storage fault is an `Err`.
    pub async fn run_metric_execution(
        &self,
        metric_id: &MetricId,
        triggered_by: &str,
        context: Arc<ExecutionContext>,
    ) -> CoreResult<MetricExecution> {
        self.metrics
            .get(metric_id)
            .await?
            .ok_or_else(|| MetricError::NotFound(metric_id.clone()))?;

        let mut execution = MetricExecution::pending(metric_id.clone(), triggered_by, self.clock.now());
        self.executions.insert(execution.clone()).await?;
        execution.start()?;
        self.executions.update(execution.clone()).await?;

        let view_id = format!("metric:{metric_id}");
        let spec = ViewSpecification::single(
            ViewSpec::new(
                view_id.clone(),
                ViewSource::Metric {
                    metric_id: metric_id.clone(),
                },
            )
            .force_refresh(),
        );

        let results = self.compiler.execute(&spec, context).await;
        let outcome = results.into_iter().find(|r| r.view_id == view_id);

        match outcome {
            Some(result) if result.status == ExecutionStatus::Success => {
                let payload = result.data.unwrap_or(Value::Null);
                execution.complete(payload.clone(), self.clock.now())?;
                self.executions.update(execution.clone()).await?;
                self.trigger_alerts(metric_id, payload, execution.id.clone());
            }
            Some(result) => {
                let message = result.error.unwrap_or_else(|| "execution failed".to_string());
                execution.fail(message, self.clock.now())?;
                self.executions.update(execution.clone()).await?;
            }
            None => {
                execution.fail("metric produced no result", self.clock.now())?;
                self.executions.update(execution.clone()).await?;
            }
        }

        Ok(execution)
    }

    /// Decide whether a metric is due and run it if so. On-demand metrics
    /// are never scheduled; scheduled metrics run when no completed
    /// execution exists or the TTL has elapsed. Returns whether a run was
    /// triggered.
    pub async fn schedule_metric_execution(
        &self,
        metric_id: &MetricId,
        context: Arc<ExecutionContext>,
    ) -> CoreResult<bool> {
        let metric = self
            .metrics
            .get(metric_id)
            .await?
            .ok_or_else(|| MetricError::NotFound(metric_id.clone()))?;

        match metric.definition.policy {
            ExecutionPolicy::OnDemand => Ok(false),
            ExecutionPolicy::Scheduled { .. } => {
                let due = match self.executions.latest_completed(metric_id).await? {
                    None => true,
                    Some(last) => {
                        let completed_at = last.completed_at.unwrap_or(last.started_at);
                        metric
                            .definition
                            .policy
                            .is_stale(completed_at, self.clock.now())
                    }
                };
                if due {
                    info!(metric = %metric_id, "metric is stale; triggering execution");
                    self.run_metric_execution(metric_id, "schedule", context)
                        .await?;
                }
                Ok(due)
            }
        }
    }

    /// One sweep over an organization's metrics, applying
    /// [`Self::schedule_metric_execution`] to each. A per-metric fault is
    /// logged and skipped so the sweep always finishes; driving this on a
    /// timer is the caller's concern.
    pub async fn run_due_metrics(
        &self,
        org_id: &OrgId,
        context: Arc<ExecutionContext>,
    ) -> CoreResult<Vec<MetricId>> {
        let mut triggered = Vec::new();
        for metric in self.metrics.list_for_org(org_id).await? {
            match self
                .schedule_metric_execution(&metric.id, Arc::clone(&context))
                .await
            {
                Ok(true) => triggered.push(metric.id),
                Ok(false) => {}
                Err(e) => warn!(metric = %metric.id, error = %e, "skipping metric in sweep"),
            }
        }
        Ok(triggered)
    }

    fn trigger_alerts(&self, metric_id: &MetricId, result: Value, execution_id: String) {
        let Some(alerts) = self.alerts.clone() else {
            return;
        };
        let metric_id = metric_id.clone();
        tokio::spawn(async move {
            if let Err(e) = alerts
                .evaluate_alerts(&metric_id, &result, &execution_id)
                .await
            {
                error!(metric = %metric_id, execution = %execution_id, error = %e, "alert evaluation failed");
            }
        });
    }
}
