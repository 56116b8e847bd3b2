//! Common surface of the crate in one import.

pub use crate::alerts::{AlertEvaluator, NoopAlertEvaluator};
pub use crate::capabilities::{
    CapabilityDefinition, CapabilityHandler, CapabilityMode, CapabilityRegistry, FnHandler,
    ParameterContract,
};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::CoreConfig;
pub use crate::connections::{ConnectionStore, InMemoryConnectionStore};
pub use crate::discovery::{DiscoveredSchema, SchemaDiscovery, StaticSchemaDiscovery};
pub use crate::errors::{CoreError, CoreResult, GraphError, GraphViolation, MetricError, PlanError};
pub use crate::governance::permissions::{AccessLevel, Permission, Scope};
pub use crate::governance::policy::{OrgPolicy, PolicyDecision, PolicyInput, PolicyRule};
pub use crate::metrics::{
    ExecutionPolicy, InMemoryMetricExecutionStore, InMemoryMetricStore, Metric, MetricDefinition,
    MetricExecution, MetricExecutionStatus, MetricExecutionStore, MetricScheduler, MetricStore,
};
pub use crate::pipeline::{compose, executor_terminal, standard_pipeline, Handler, Middleware};
pub use crate::planner::{
    CompiledSpec, ExecutionPlan, FilterOp, PlanCompiler, SortDirection, StructuredQuery, ViewSource,
    ViewSpec, ViewSpecification,
};
pub use crate::replay::{
    FileTraceStore, InMemoryTraceStore, ReplayConfig, ReplayRecorder, StepRecord, TraceStore,
};
pub use crate::sandbox::{
    EntryKind, ExecutionNode, GraphEdge, GraphValidation, IntentGraph, IntentGraphValidator,
    NodeType, SandboxEvent, SandboxLogEntry, UiContract, UiView,
};
pub use crate::secrets::{CredentialProvider, StaticCredentialProvider};
pub use crate::types::{
    ExecutionContext, ExecutionResult, ExecutionStatus, ReplayCursor, ReplayMode, ResultSource,
};
