//! Tapestry — the capability execution core behind operator-described
//! internal tools.
//!
//! An operator describes a tool in natural language; upstream layers turn
//! that into capability selections, view specifications and intent graphs.
//! This crate is the layer that makes those safe to run:
//!
//! - a typed, permissioned [`capabilities::CapabilityRegistry`],
//! - a [`pipeline`] that puts determinism/replay, permission enforcement
//!   and organization policy in front of every executor,
//! - a [`planner`] that compiles declarative view/metric specifications
//!   into validated execution plans with per-view failure isolation,
//! - a [`sandbox`] validator that statically checks AI-produced intent
//!   graphs before anything may execute them,
//! - and a [`metrics`] scheduler that re-runs persisted metrics on TTL and
//!   caches their results.
//!
//! External collaborators (schema discovery, credential provider,
//! connection store, alert evaluator) are trait seams; storage is abstract
//! with in-memory implementations for tests and single-process runs.

pub mod alerts;
pub mod capabilities;
pub mod clock;
pub mod config;
pub mod connections;
pub mod discovery;
pub mod errors;
pub mod governance;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod prelude;
pub mod replay;
pub mod sandbox;
pub mod secrets;
pub mod types;
