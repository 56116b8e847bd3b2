//! Alert evaluation collaborator. The metric scheduler fires it after every
//! completed execution; evaluation is best-effort and its failures are
//! logged, never rethrown into the metric run.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CoreResult;
use crate::types::MetricId;

#[async_trait]
pub trait AlertEvaluator: Send + Sync {
    async fn evaluate_alerts(
        &self,
        metric_id: &MetricId,
        result: &Value,
        execution_id: &str,
    ) -> CoreResult<()>;
}

/// Evaluator that does nothing, for deployments without alerting.
#[derive(Debug, Default)]
pub struct NoopAlertEvaluator;

#[async_trait]
impl AlertEvaluator for NoopAlertEvaluator {
    async fn evaluate_alerts(
        &self,
        _metric_id: &MetricId,
        _result: &Value,
        _execution_id: &str,
    ) -> CoreResult<()> {
        Ok(())
    }
}
