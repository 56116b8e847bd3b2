//! Capability definition types: modes, parameter contracts, executor and
//! normalizer seams.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreResult;
use crate::governance::permissions::AccessLevel;
use crate::types::{CapabilityId, ExecutionContext, IntegrationId};

/// Whether a capability reads, writes, or performs a one-shot action against
/// its integration. Anything that is not a plain read requires `write`
/// access from the caller's permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    Read,
    Write,
    Action,
}

impl CapabilityMode {
    pub fn required_access(&self) -> AccessLevel {
        match self {
            CapabilityMode::Read => AccessLevel::Read,
            CapabilityMode::Write | CapabilityMode::Action => AccessLevel::Write,
        }
    }

    /// The action type string policies rule on.
    pub fn action_type(&self) -> &'static str {
        match self {
            CapabilityMode::Read => "read",
            CapabilityMode::Write => "write",
            CapabilityMode::Action => "action",
        }
    }
}

/// Declared parameters of a capability. `required` doubles as the required
/// filter set consulted by plan validation; parameters outside both lists
/// are unrecognized and get dropped (with a warning) rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterContract {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl ParameterContract {
    pub fn new(required: &[&str], optional: &[&str]) -> Self {
        Self {
            required: required.iter().map(|s| s.to_string()).collect(),
            optional: optional.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn recognizes(&self, name: &str) -> bool {
        self.required.iter().any(|k| k == name) || self.optional.iter().any(|k| k == name)
    }
}

/// Executor attached to a capability definition.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn execute(&self, params: &Value, context: &ExecutionContext) -> CoreResult<Value>;
}

/// Adapter for synchronous closures, the common case for local capabilities
/// and test doubles.
pub struct FnHandler {
    f: Box<dyn Fn(&Value) -> CoreResult<Value> + Send + Sync>,
}

impl FnHandler {
    pub fn new(f: impl Fn(&Value) -> CoreResult<Value> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }
}

#[async_trait]
impl CapabilityHandler for FnHandler {
    async fn execute(&self, params: &Value, _context: &ExecutionContext) -> CoreResult<Value> {
        (self.f)(params)
    }
}

/// Capability-specific parameter normalization hook, run at plan compile
/// time. Failures are not fatal there; unresolved fields surface at
/// execution instead.
pub trait ParamNormalizer: Send + Sync {
    fn normalize(&self, params: &mut IndexMap<String, Value>) -> Result<(), String>;
}

/// Splits a combined `owner/repo` value into separate `owner` and `repo`
/// fields, the shape repository-backed integrations expect.
#[derive(Debug, Clone)]
pub struct RepoSlugNormalizer {
    pub source_key: String,
    pub owner_key: String,
    pub repo_key: String,
}

impl Default for RepoSlugNormalizer {
    fn default() -> Self {
        Self {
            source_key: "repository".to_string(),
            owner_key: "owner".to_string(),
            repo_key: "repo".to_string(),
        }
    }
}

impl ParamNormalizer for RepoSlugNormalizer {
    fn normalize(&self, params: &mut IndexMap<String, Value>) -> Result<(), String> {
        let combined = match params.get(&self.source_key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(format!(
                    "expected a string for '{}', got {other}",
                    self.source_key
                ))
            }
            None => return Ok(()),
        };
        let (owner, repo) = combined
            .split_once('/')
            .ok_or_else(|| format!("'{combined}' is not an owner/repo pair"))?;
        if owner.is_empty() || repo.is_empty() {
            return Err(format!("'{combined}' is not an owner/repo pair"));
        }
        params.shift_remove(&self.source_key);
        params.insert(self.owner_key.clone(), Value::String(owner.to_string()));
        params.insert(self.repo_key.clone(), Value::String(repo.to_string()));
        Ok(())
    }
}

/// A registered unit of integration work. Immutable once registered;
/// re-registration under the same id overwrites the whole definition.
#[derive(Clone)]
pub struct CapabilityDefinition {
    pub id: CapabilityId,
    pub integration_id: IntegrationId,
    pub mode: CapabilityMode,
    pub contract: ParameterContract,
    pub description: String,
    pub version: String,
    /// Absent for legacy/declared-only capabilities; executing one fails
    /// with `LegacyCapability`.
    pub handler: Option<Arc<dyn CapabilityHandler>>,
    pub normalizer: Option<Arc<dyn ParamNormalizer>>,
}

impl CapabilityDefinition {
    pub fn new(
        id: impl Into<CapabilityId>,
        integration_id: impl Into<IntegrationId>,
        mode: CapabilityMode,
    ) -> Self {
        Self {
            id: id.into(),
            integration_id: integration_id.into(),
            mode,
            contract: ParameterContract::default(),
            description: String::new(),
            version: "0.1.0".to_string(),
            handler: None,
            normalizer: None,
        }
    }

    pub fn with_contract(mut self, contract: ParameterContract) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn ParamNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }
}

impl fmt::Debug for CapabilityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDefinition")
            .field("id", &self.id)
            .field("integration_id", &self.integration_id)
            .field("mode", &self.mode)
            .field("contract", &self.contract)
            .field("version", &self.version)
            .field("has_handler", &self.handler.is_some())
            .field("has_normalizer", &self.normalizer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_maps_to_required_access() {
        assert_eq!(CapabilityMode::Read.required_access(), AccessLevel::Read);
        assert_eq!(CapabilityMode::Write.required_access(), AccessLevel::Write);
        assert_eq!(CapabilityMode::Action.required_access(), AccessLevel::Write);
    }

    #[test]
    fn contract_recognizes_declared_params() {
        let contract = ParameterContract::new(&["owner", "repo"], &["state"]);
        assert!(contract.recognizes("owner"));
        assert!(contract.recognizes("state"));
        assert!(!contract.recognizes("labels"));
    }

    #[test]
    fn repo_slug_normalizer_splits_combined_field() {
        let normalizer = RepoSlugNormalizer::default();
        let mut params = IndexMap::new();
        params.insert("repository".to_string(), json!("acme/widgets"));
        normalizer.normalize(&mut params).unwrap();
        assert_eq!(params.get("owner"), Some(&json!("acme")));
        assert_eq!(params.get("repo"), Some(&json!("widgets")));
        assert!(params.get("repository").is_none());
    }

    #[test]
    fn repo_slug_normalizer_rejects_malformed_value() {
        let normalizer = RepoSlugNormalizer::default();
        let mut params = IndexMap::new();
        params.insert("repository".to_string(), json!("no-slash-here"));
        assert!(normalizer.normalize(&mut params).is_err());
    }

    #[test]
    fn repo_slug_normalizer_ignores_absent_field() {
        let normalizer = RepoSlugNormalizer::default();
        let mut params = IndexMap::new();
        params.insert("state".to_string(), json!("open"));
        normalizer.normalize(&mut params).unwrap();
        assert_eq!(params.len(), 1);
    }
}
