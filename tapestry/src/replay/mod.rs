//! Determinism and replay for capability execution.
//!
//! In record mode every successful capability call is appended to an
//! append-only trace keyed by the chain's trace id. In replay mode recorded
//! outputs are served back in the exact order they were recorded, without
//! executing anything downstream — zero outbound side effects.

pub mod hash;
pub mod recorder;
pub mod trace_store;

pub use hash::step_hash;
pub use recorder::{ReplayConfig, ReplayRecorder};
pub use trace_store::{FileTraceStore, InMemoryTraceStore, StepRecord, TraceStore};
