//! Metric and metric-execution persistence seams, with in-memory
//! implementations mirroring the `metrics` / `metric_executions` tables.
//! Both traits assume transactional single-row upsert semantics from the
//! backing store; nothing here locks across calls.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{CoreResult, MetricError};
use crate::metrics::types::{Metric, MetricExecution, MetricExecutionStatus};
use crate::types::{MetricId, OrgId};

#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn upsert(&self, metric: Metric) -> CoreResult<()>;
    async fn get(&self, id: &MetricId) -> CoreResult<Option<Metric>>;
    async fn list_for_org(&self, org_id: &OrgId) -> CoreResult<Vec<Metric>>;
}

#[async_trait]
pub trait MetricExecutionStore: Send + Sync {
    async fn insert(&self, execution: MetricExecution) -> CoreResult<()>;

    /// Replace the row with the same id; errors if it was never inserted.
    async fn update(&self, execution: MetricExecution) -> CoreResult<()>;

    async fn get(&self, id: &str) -> CoreResult<Option<MetricExecution>>;

    /// The most recently completed execution for a metric, the row both the
    /// TTL gate and the compiler's cache short-circuit read.
    async fn latest_completed(&self, metric_id: &MetricId) -> CoreResult<Option<MetricExecution>>;

    async fn list_for_metric(&self, metric_id: &MetricId) -> CoreResult<Vec<MetricExecution>>;
}

#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    metrics: RwLock<HashMap<MetricId, Metric>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn upsert(&self, metric: Metric) -> CoreResult<()> {
        self.metrics.write().await.insert(metric.id.clone(), metric);
        Ok(())
    }

    async fn get(&self, id: &MetricId) -> CoreResult<Option<Metric>> {
        Ok(self.metrics.read().await.get(id).cloned())
    }

    async fn list_for_org(&self, org_id: &OrgId) -> CoreResult<Vec<Metric>> {
        let metrics = self.metrics.read().await;
        let mut out: Vec<Metric> = metrics
            .values()
            .filter(|m| &m.org_id == org_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMetricExecutionStore {
    executions: RwLock<Vec<MetricExecution>>,
}

impl InMemoryMetricExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricExecutionStore for InMemoryMetricExecutionStore {
    async fn insert(&self, execution: MetricExecution) -> CoreResult<()> {
        self.executions.write().await.push(execution);
        Ok(())
    }

    async fn update(&self, execution: MetricExecution) -> CoreResult<()> {
        let mut executions = self.executions.write().await;
        match executions.iter_mut().find(|row| row.id == execution.id) {
            Some(row) => {
                *row = execution;
                Ok(())
            }
            None => Err(MetricError::ExecutionNotFound(execution.id).into()),
        }
    }

    async fn get(&self, id: &str) -> CoreResult<Option<MetricExecution>> {
        Ok(self
            .executions
            .read()
            .await
            .iter()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn latest_completed(&self, metric_id: &MetricId) -> CoreResult<Option<MetricExecution>> {
        let executions = self.executions.read().await;
        Ok(executions
            .iter()
            .filter(|row| {
                &row.metric_id == metric_id && row.status == MetricExecutionStatus::Completed
            })
            .max_by_key(|row| row.completed_at)
            .cloned())
    }

    async fn list_for_metric(&self, metric_id: &MetricId) -> CoreResult<Vec<MetricExecution>> {
        let executions = self.executions.read().await;
        Ok(executions
            .iter()
            .filter(|row| &row.metric_id == metric_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn latest_completed_picks_newest_row() {
        let store = InMemoryMetricExecutionStore::new();
        let t0 = Utc::now();

        let mut old = MetricExecution::pending("m1", "schedule", t0);
        old.start().unwrap();
        old.complete(json!(1), t0).unwrap();

        let mut newer = MetricExecution::pending("m1", "schedule", t0);
        newer.start().unwrap();
        newer.complete(json!(2), t0 + Duration::seconds(60)).unwrap();

        let mut failed = MetricExecution::pending("m1", "schedule", t0);
        failed.start().unwrap();
        failed
            .fail("boom", t0 + Duration::seconds(120))
            .unwrap();

        store.insert(old).await.unwrap();
        store.insert(newer.clone()).await.unwrap();
        store.insert(failed).await.unwrap();

        let latest = store
            .latest_completed(&"m1".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.result, Some(json!(2)));
    }

    #[tokio::test]
    async fn update_of_unknown_row_errors() {
        let store = InMemoryMetricExecutionStore::new();
        let exec = MetricExecution::pending("m1", "manual", Utc::now());
        assert!(store.update(exec).await.is_err());
    }
}
