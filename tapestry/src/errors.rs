//! Error taxonomy for the capability execution core.
//!
//! Subsystems define their own error enums (`PlanError`, `GraphError`,
//! `MetricError`) which compose into the crate-level [`CoreError`] via
//! `#[from]`. Permission and policy violations always abort the whole
//! capability call; plan failures are scoped to a single view; graph
//! rejections are terminal for the whole graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Crate-level error for capability execution and governance.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("capability '{0}' is declared but has no executor attached")]
    LegacyCapability(String),

    #[error("permission denied for capability '{capability_id}' on integration '{integration_id}'")]
    PermissionDenied {
        integration_id: String,
        capability_id: String,
    },

    #[error("policy '{policy}' denied the call: {reason}")]
    PolicyViolation { policy: String, reason: String },

    #[error("no trace recorded for '{0}'")]
    TraceNotFound(String),

    #[error("replay diverged at step {step}: {details}")]
    ReplayDivergence { step: usize, details: String },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("capability execution failed: {0}")]
    Execution(String),
}

/// Per-view failures raised while compiling or validating an execution plan.
/// One failed view never prevents other views from compiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("metric not found: {0}")]
    MetricNotFound(String),

    #[error("view '{view_id}' references unknown capability '{capability_id}'")]
    UnknownCapabilityId {
        view_id: String,
        capability_id: String,
    },

    #[error("view '{view_id}' targets integration '{plan_integration}' but capability '{capability_id}' belongs to '{capability_integration}'")]
    IntegrationMismatch {
        view_id: String,
        capability_id: String,
        plan_integration: String,
        capability_integration: String,
    },

    #[error("missing required parameter '{key}' for capability '{capability_id}'")]
    MissingRequiredParameter { capability_id: String, key: String },
}

/// Reasons an intent graph can be rejected by the sandbox validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphViolation {
    UnreachableNode,
    DanglingEdge,
    CycleDetected,
    InvalidActionType,
    MissingCapability,
    SandboxExecutionFailed,
}

/// Terminal rejection of an intent graph. Carries enough structure for the
/// caller to patch and resubmit: the violated rule, the offending node and
/// an optional auto-fix hint. There is no partial acceptance of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("invalid intent graph ({reason:?}): {details}")]
pub struct GraphError {
    pub reason: GraphViolation,
    pub node_id: Option<String>,
    pub details: String,
    pub auto_fix: Option<String>,
}

impl GraphError {
    pub fn new(reason: GraphViolation, details: impl Into<String>) -> Self {
        Self {
            reason,
            node_id: None,
            details: details.into(),
            auto_fix: None,
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_auto_fix(mut self, hint: impl Into<String>) -> Self {
        self.auto_fix = Some(hint.into());
        self
    }
}

/// Failures of the metric execution lifecycle and its stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("metric not found: {0}")]
    NotFound(String),

    #[error("metric execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("invalid metric execution transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
