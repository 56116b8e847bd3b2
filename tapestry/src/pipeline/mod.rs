//! Middleware pipeline for capability execution.
//!
//! A middleware wraps a capability call and decides whether and how to
//! invoke the rest of the chain. Chains are built by [`compose`], a pure
//! right-fold over an ordered middleware list: the first-listed middleware
//! is outermost. The standard order is a security property — the replay
//! recorder sits outside the permission and policy checks so that replayed
//! steps never re-execute anything downstream, and capability code can never
//! bypass enforcement.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::capabilities::types::CapabilityDefinition;
use crate::errors::{CoreError, CoreResult};
use crate::governance::{PermissionEnforcement, PolicyEnforcement};
use crate::replay::recorder::{ReplayConfig, ReplayRecorder};
use crate::replay::trace_store::TraceStore;
use crate::types::ExecutionContext;

/// A fully composed call chain. Invoking it runs every remaining middleware
/// and, ultimately, the capability's own executor.
pub type Handler = Arc<
    dyn Fn(
            Arc<CapabilityDefinition>,
            Value,
            Arc<ExecutionContext>,
        ) -> BoxFuture<'static, CoreResult<Value>>
        + Send
        + Sync,
>;

/// One layer of the pipeline. Implementations either call `next` (possibly
/// with adjusted inputs) or short-circuit with a result or an error.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
        next: Handler,
    ) -> CoreResult<Value>;
}

/// Fold an ordered middleware list into a single callable, right to left,
/// so the first-listed middleware ends up outermost. The combinator is
/// independent of any particular pipeline instance and is associative:
/// composing `[a, b]` around a chain equals composing `[a]` around the
/// composition of `[b]`.
pub fn compose(middlewares: Vec<Arc<dyn Middleware>>, terminal: Handler) -> Handler {
    middlewares.into_iter().rev().fold(terminal, |next, mw| {
        Arc::new(move |capability, params, context| {
            let mw = Arc::clone(&mw);
            let next = Arc::clone(&next);
            Box::pin(async move { mw.handle(capability, params, context, next).await })
                as BoxFuture<'static, CoreResult<Value>>
        }) as Handler
    })
}

/// Terminal handler: invoke the capability's own executor, or fail with
/// `LegacyCapability` when none is attached.
pub fn executor_terminal() -> Handler {
    Arc::new(|capability: Arc<CapabilityDefinition>, params, context| {
        Box::pin(async move {
            match &capability.handler {
                Some(handler) => handler.execute(&params, &context).await,
                None => Err(CoreError::LegacyCapability(capability.id.clone())),
            }
        }) as BoxFuture<'static, CoreResult<Value>>
    })
}

/// The standard chain, outermost first: determinism/replay, permission
/// enforcement, policy enforcement. The registry composes this around
/// [`executor_terminal`] for every call.
pub fn standard_pipeline(
    trace_store: Arc<dyn TraceStore>,
    replay: ReplayConfig,
) -> Vec<Arc<dyn Middleware>> {
    vec![
        Arc::new(ReplayRecorder::new(trace_store, replay)),
        Arc::new(PermissionEnforcement),
        Arc::new(PolicyEnforcement),
    ]
}
