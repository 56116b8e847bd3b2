//! Pre-execution static validation of externally-produced intent graphs.
//! Nothing in here ever performs a real integration call; acceptance
//! produces a simulated execution log, rejection is terminal.

pub mod graph;
pub mod validator;

pub use graph::{EntryKind, ExecutionNode, GraphEdge, IntentGraph, NodeType, UiContract, UiView};
pub use validator::{GraphValidation, IntentGraphValidator, SandboxEvent, SandboxLogEntry};
