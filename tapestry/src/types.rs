//! Shared data model for the execution core: identifiers, the execution
//! context threaded through every capability call, and execution results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::governance::permissions::Permission;
use crate::governance::policy::OrgPolicy;

pub type IntegrationId = String;
pub type CapabilityId = String;
pub type ViewId = String;
pub type MetricId = String;
pub type TraceId = String;
pub type OrgId = String;

/// Record/replay behavior for a capability call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayMode {
    /// Passthrough, no recording.
    Off,
    /// Execute normally and append each step to the trace store.
    Record,
    /// Serve recorded outputs without executing anything downstream.
    Replay,
}

impl Default for ReplayMode {
    fn default() -> Self {
        ReplayMode::Off
    }
}

/// Explicit replay position for one call chain.
///
/// Replay is strictly sequential: each replayed capability call consumes the
/// record at the current position and advances the cursor by one. The cursor
/// lives on the shared [`ExecutionContext`] so an entire replayed chain reads
/// through the trace in recorded order; callers must not share one context
/// between concurrent calls while replaying.
#[derive(Debug, Default)]
pub struct ReplayCursor(AtomicUsize);

impl ReplayCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Advance past the current step, returning the position that was consumed.
    pub fn advance(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Everything a capability call chain needs to be governed and replayed:
/// the caller's identity, granted permissions, organization policies and the
/// replay state for this chain. Built once per chain and shared by `Arc`;
/// the only state that moves during a chain is the [`ReplayCursor`].
#[derive(Debug)]
pub struct ExecutionContext {
    pub org_id: OrgId,
    pub user_id: Option<String>,
    pub permissions: Vec<Permission>,
    pub policies: Vec<OrgPolicy>,
    pub replay: ReplayMode,
    pub trace_id: Option<TraceId>,
    pub cursor: ReplayCursor,
}

impl ExecutionContext {
    pub fn new(org_id: impl Into<OrgId>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: None,
            permissions: Vec::new(),
            policies: Vec::new(),
            replay: ReplayMode::Off,
            trace_id: None,
            cursor: ReplayCursor::new(),
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<Permission>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_policies(mut self, policies: Vec<OrgPolicy>) -> Self {
        self.policies = policies;
        self
    }

    /// Record every capability call in this chain under `trace_id`.
    pub fn recording(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.replay = ReplayMode::Record;
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Replay previously recorded outputs for `trace_id`, starting at step 0.
    pub fn replaying(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.replay = ReplayMode::Replay;
        self.trace_id = Some(trace_id.into());
        self.cursor.reset();
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Where a view result came from: a live integration call or the execution
/// cache of a persisted metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Live,
    Cache,
}

/// Outcome of executing one view's plan. Results are keyed by `view_id`, so
/// assembly order across views never matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub view_id: ViewId,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source: ResultSource,
}

impl ExecutionResult {
    pub fn success(
        view_id: impl Into<ViewId>,
        data: Value,
        source: ResultSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            view_id: view_id.into(),
            status: ExecutionStatus::Success,
            data: Some(data),
            error: None,
            timestamp,
            source,
        }
    }

    pub fn failure(
        view_id: impl Into<ViewId>,
        error: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            view_id: view_id.into(),
            status: ExecutionStatus::Error,
            data: None,
            error: Some(error.into()),
            timestamp,
            source: ResultSource::Live,
        }
    }
}
