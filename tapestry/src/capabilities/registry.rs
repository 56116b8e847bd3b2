//! The capability registry: an explicit keyed store of capability
//! definitions plus the entry point that runs one through the standard
//! governance/replay pipeline.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::capabilities::types::CapabilityDefinition;
use crate::errors::{CoreError, CoreResult};
use crate::pipeline::{compose, executor_terminal, standard_pipeline};
use crate::replay::recorder::ReplayConfig;
use crate::replay::trace_store::{InMemoryTraceStore, TraceStore};
use crate::types::{CapabilityId, ExecutionContext, IntegrationId};

/// Process-scoped capability store. Constructed once at startup and injected
/// by `Arc` wherever capabilities are registered or executed; definitions
/// are immutable once registered and re-registration overwrites whole.
pub struct CapabilityRegistry {
    definitions: DashMap<CapabilityId, Arc<CapabilityDefinition>>,
    trace_store: Arc<dyn TraceStore>,
    replay: ReplayConfig,
}

impl CapabilityRegistry {
    pub fn new(trace_store: Arc<dyn TraceStore>, replay: ReplayConfig) -> Self {
        Self {
            definitions: DashMap::new(),
            trace_store,
            replay,
        }
    }

    /// Registry with an in-memory trace store and lenient replay, the usual
    /// arrangement for tests and single-process runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTraceStore::new()), ReplayConfig::default())
    }

    /// Store a definition by id. A collision overwrites the existing
    /// definition entirely (never merges) and is logged.
    pub fn register(&self, definition: CapabilityDefinition) -> bool {
        let id = definition.id.clone();
        let previous = self.definitions.insert(id.clone(), Arc::new(definition));
        match previous {
            Some(old) => {
                warn!(
                    capability = %id,
                    previous_version = %old.version,
                    "capability re-registered; previous definition overwritten"
                );
                true
            }
            None => {
                debug!(capability = %id, "capability registered");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<CapabilityDefinition>> {
        self.definitions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// All definitions, sorted by id for deterministic listings.
    pub fn list(&self) -> Vec<Arc<CapabilityDefinition>> {
        let mut defs: Vec<Arc<CapabilityDefinition>> = self
            .definitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }

    pub fn list_for_integration(&self, integration_id: &IntegrationId) -> Vec<Arc<CapabilityDefinition>> {
        self.list()
            .into_iter()
            .filter(|def| &def.integration_id == integration_id)
            .collect()
    }

    /// Execute a capability through the standard pipeline: replay recorder,
    /// permission enforcement, policy enforcement, then the executor. Fails
    /// with `UnknownCapability` before any middleware runs when the id is
    /// not registered, and with `LegacyCapability` when no executor is
    /// attached. The registry never retries.
    pub async fn execute(
        &self,
        id: &str,
        params: Value,
        context: Arc<ExecutionContext>,
    ) -> CoreResult<Value> {
        let definition = self
            .get(id)
            .ok_or_else(|| CoreError::UnknownCapability(id.to_string()))?;
        if definition.handler.is_none() {
            return Err(CoreError::LegacyCapability(id.to_string()));
        }
        let chain = compose(
            standard_pipeline(Arc::clone(&self.trace_store), self.replay.clone()),
            executor_terminal(),
        );
        chain(definition, params, context).await
    }
}
