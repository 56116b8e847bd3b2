//! The record/replay middleware.
//!
//! Sits outermost in the standard pipeline. In `Record` mode it lets the
//! chain run and appends the result to the trace; in `Replay` mode it serves
//! the next recorded output and never calls downstream, so permission and
//! policy checks are not re-run for replayed steps and no side effects
//! occur. Replay is strictly sequential within one context.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::capabilities::types::CapabilityDefinition;
use crate::errors::{CoreError, CoreResult};
use crate::pipeline::{Handler, Middleware};
use crate::replay::hash::step_hash;
use crate::replay::trace_store::{StepRecord, TraceStore};
use crate::types::{ExecutionContext, ReplayMode};

/// Replay behavior knobs. `strict` turns hash divergence during replay into
/// a hard [`CoreError::ReplayDivergence`] instead of a warning.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    pub strict: bool,
}

impl ReplayConfig {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

pub struct ReplayRecorder {
    store: Arc<dyn TraceStore>,
    config: ReplayConfig,
}

impl ReplayRecorder {
    pub fn new(store: Arc<dyn TraceStore>, config: ReplayConfig) -> Self {
        Self { store, config }
    }

    async fn record(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
        next: Handler,
    ) -> CoreResult<Value> {
        let hash = step_hash(&capability.id, &params);
        let input = params.clone();
        let output = next(capability, params, Arc::clone(&context)).await?;
        match &context.trace_id {
            Some(trace_id) => {
                self.store
                    .append(
                        trace_id,
                        StepRecord {
                            step_hash: hash,
                            input,
                            output: output.clone(),
                            recorded_at: Utc::now(),
                        },
                    )
                    .await?;
            }
            None => {
                warn!("record mode without a trace id; step not recorded");
            }
        }
        Ok(output)
    }

    async fn replay(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
    ) -> CoreResult<Value> {
        let trace_id = context
            .trace_id
            .as_deref()
            .ok_or_else(|| CoreError::TraceNotFound("<no trace id on context>".to_string()))?;
        let steps = self
            .store
            .get(trace_id)
            .await?
            .ok_or_else(|| CoreError::TraceNotFound(trace_id.to_string()))?;

        let index = context.cursor.position();
        let record = steps.get(index).ok_or_else(|| CoreError::ReplayDivergence {
            step: index,
            details: format!(
                "trace '{trace_id}' has {} recorded step(s), nothing to serve for '{}'",
                steps.len(),
                capability.id
            ),
        })?;

        let fresh = step_hash(&capability.id, &params);
        if fresh != record.step_hash {
            if self.config.strict {
                return Err(CoreError::ReplayDivergence {
                    step: index,
                    details: format!(
                        "inputs for '{}' differ from the recorded step",
                        capability.id
                    ),
                });
            }
            warn!(
                trace_id,
                step = index,
                capability = %capability.id,
                "replay inputs differ from recorded step; serving recorded output"
            );
        }

        // consume this step so the next call in the chain reads the next record
        context.cursor.advance();
        Ok(record.output.clone())
    }
}

#[async_trait]
impl Middleware for ReplayRecorder {
    async fn handle(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
        next: Handler,
    ) -> CoreResult<Value> {
        match context.replay {
            ReplayMode::Off => next(capability, params, context).await,
            ReplayMode::Record => self.record(capability, params, context, next).await,
            ReplayMode::Replay => self.replay(capability, params, context).await,
        }
    }
}
