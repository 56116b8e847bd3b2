//! Metric data model and the execution lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::MetricError;
use crate::planner::spec::StructuredQuery;
use crate::types::{CapabilityId, IntegrationId, MetricId, OrgId};

/// When a persisted metric is allowed to go stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Only runs when explicitly requested; the scheduler never touches it.
    OnDemand,
    /// Re-run once the last completed execution is older than the TTL.
    Scheduled { ttl_seconds: u64 },
}

impl ExecutionPolicy {
    /// Whether a result completed at `completed_at` is stale at `now`.
    /// On-demand metrics never go stale on their own; a forced refresh is
    /// the only way to bypass their cache.
    pub fn is_stale(&self, completed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            ExecutionPolicy::OnDemand => false,
            ExecutionPolicy::Scheduled { ttl_seconds } => {
                (now - completed_at).num_seconds() > *ttl_seconds as i64
            }
        }
    }
}

/// The query half of a metric: what to ask the integration, through which
/// capability (explicit or synthesized by convention at compile time), and
/// how long the answer stays fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub query: StructuredQuery,
    pub policy: ExecutionPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_id: Option<CapabilityId>,
}

/// A named, versioned, persisted query definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub org_id: OrgId,
    pub integration_id: IntegrationId,
    pub resource: String,
    pub definition: MetricDefinition,
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl MetricExecutionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            MetricExecutionStatus::Pending => "pending",
            MetricExecutionStatus::Running => "running",
            MetricExecutionStatus::Completed => "completed",
            MetricExecutionStatus::Failed => "failed",
        }
    }
}

/// One run of a metric. Exactly one row transitions
/// pending -> running -> (completed | failed); every other transition is
/// rejected, and the transition methods are the only way to move status, so
/// a completed row always carries a result and a failed row always carries
/// an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricExecution {
    pub id: String,
    pub metric_id: MetricId,
    pub status: MetricExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub triggered_by: String,
}

impl MetricExecution {
    pub fn pending(
        metric_id: impl Into<MetricId>,
        triggered_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            metric_id: metric_id.into(),
            status: MetricExecutionStatus::Pending,
            started_at: now,
            completed_at: None,
            result: None,
            error: None,
            triggered_by: triggered_by.into(),
        }
    }

    pub fn start(&mut self) -> Result<(), MetricError> {
        self.transition(MetricExecutionStatus::Pending, MetricExecutionStatus::Running)
    }

    pub fn complete(&mut self, result: Value, now: DateTime<Utc>) -> Result<(), MetricError> {
        self.transition(
            MetricExecutionStatus::Running,
            MetricExecutionStatus::Completed,
        )?;
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), MetricError> {
        self.transition(MetricExecutionStatus::Running, MetricExecutionStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    fn transition(
        &mut self,
        expected: MetricExecutionStatus,
        next: MetricExecutionStatus,
    ) -> Result<(), MetricError> {
        if self.status != expected {
            return Err(MetricError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn scheduled_policy_goes_stale_after_ttl() {
        let policy = ExecutionPolicy::Scheduled { ttl_seconds: 3600 };
        let completed = Utc::now();
        assert!(!policy.is_stale(completed, completed + Duration::seconds(1800)));
        assert!(!policy.is_stale(completed, completed + Duration::seconds(3600)));
        assert!(policy.is_stale(completed, completed + Duration::seconds(3601)));
    }

    #[test]
    fn on_demand_policy_never_goes_stale() {
        let policy = ExecutionPolicy::OnDemand;
        let completed = Utc::now();
        assert!(!policy.is_stale(completed, completed + Duration::days(365)));
    }

    #[test]
    fn lifecycle_happy_path() {
        let now = Utc::now();
        let mut exec = MetricExecution::pending("m1", "schedule", now);
        exec.start().unwrap();
        exec.complete(json!({"count": 5}), now).unwrap();
        assert_eq!(exec.status, MetricExecutionStatus::Completed);
        assert!(exec.result.is_some());
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn failed_row_carries_error() {
        let now = Utc::now();
        let mut exec = MetricExecution::pending("m1", "manual", now);
        exec.start().unwrap();
        exec.fail("integration timed out", now).unwrap();
        assert_eq!(exec.status, MetricExecutionStatus::Failed);
        assert_eq!(exec.error.as_deref(), Some("integration timed out"));
        assert!(exec.result.is_none());
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let now = Utc::now();
        let mut exec = MetricExecution::pending("m1", "manual", now);
        // cannot complete from pending
        assert!(exec.complete(json!(1), now).is_err());
        exec.start().unwrap();
        exec.complete(json!(1), now).unwrap();
        // cannot fail or restart once completed
        assert!(exec.fail("late", now).is_err());
        assert!(exec.start().is_err());
    }
}
