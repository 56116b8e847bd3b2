//! Wire format of the action graph the upstream planning layer produces.
//! Unknown node types and trigger kinds survive deserialization so the
//! validator can reject them with structure instead of a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CapabilityId, ViewId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    IntegrationCall,
    Transform,
    Condition,
    EmitEvent,
    /// Anything the validator does not execute; carries the raw tag.
    Unknown(String),
}

impl From<String> for NodeType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "integration_call" => NodeType::IntegrationCall,
            "transform" => NodeType::Transform,
            "condition" => NodeType::Condition,
            "emit_event" => NodeType::EmitEvent,
            _ => NodeType::Unknown(raw),
        }
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::IntegrationCall => "integration_call".to_string(),
            NodeType::Transform => "transform".to_string(),
            NodeType::Condition => "condition".to_string(),
            NodeType::EmitEvent => "emit_event".to_string(),
            NodeType::Unknown(raw) => raw,
        }
    }
}

/// Trigger kinds a root node may be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    Lifecycle,
    Ui,
    Synthetic,
    Unrecognized(String),
}

impl From<String> for EntryKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "lifecycle" => EntryKind::Lifecycle,
            "ui" => EntryKind::Ui,
            "synthetic" => EntryKind::Synthetic,
            _ => EntryKind::Unrecognized(raw),
        }
    }
}

impl From<EntryKind> for String {
    fn from(entry_kind: EntryKind) -> Self {
        match entry_kind {
            EntryKind::Lifecycle => "lifecycle".to_string(),
            EntryKind::Ui => "ui".to_string(),
            EntryKind::Synthetic => "synthetic".to_string(),
            EntryKind::Unrecognized(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_id: Option<CapabilityId>,
    /// Only meaningful on root nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_kind: Option<EntryKind>,
    #[serde(default)]
    pub params: Value,
}

impl ExecutionNode {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            capability_id: None,
            entry_kind: None,
            params: Value::Null,
        }
    }

    pub fn with_capability(mut self, capability_id: impl Into<CapabilityId>) -> Self {
        self.capability_id = Some(capability_id.into());
        self
    }

    pub fn with_entry_kind(mut self, entry_kind: EntryKind) -> Self {
        self.entry_kind = Some(entry_kind);
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentGraph {
    pub nodes: Vec<ExecutionNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// A view declared by the UI layer, bound to the node whose output feeds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiView {
    pub view_id: ViewId,
    pub data_source_node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiContract {
    pub views: Vec<UiView>,
}
