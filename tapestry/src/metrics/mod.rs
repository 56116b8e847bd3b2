//! Persisted metrics and their execution lifecycle: named, versioned query
//! definitions, the execution rows that cache their results, and the
//! TTL-driven scheduler that decides when a metric needs to run again.

pub mod scheduler;
pub mod store;
pub mod types;

pub use scheduler::MetricScheduler;
pub use store::{
    InMemoryMetricExecutionStore, InMemoryMetricStore, MetricExecutionStore, MetricStore,
};
pub use types::{ExecutionPolicy, Metric, MetricDefinition, MetricExecution, MetricExecutionStatus};
