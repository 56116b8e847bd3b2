//! Enforcement ordering through the standard pipeline: denials must
//! short-circuit before the capability executor ever runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use tapestry::prelude::*;

/// Counts invocations so tests can assert the executor was never reached.
struct CountingHandler {
    calls: Arc<AtomicUsize>,
    result: Value,
}

#[async_trait]
impl CapabilityHandler for CountingHandler {
    async fn execute(&self, _params: &Value, _context: &ExecutionContext) -> CoreResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

fn counted_capability(
    id: &str,
    integration: &str,
    mode: CapabilityMode,
) -> (CapabilityDefinition, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let definition = CapabilityDefinition::new(id, integration, mode).with_handler(Arc::new(
        CountingHandler {
            calls: Arc::clone(&calls),
            result: json!({"ok": true}),
        },
    ));
    (definition, calls)
}

#[tokio::test]
async fn unknown_capability_fails_without_touching_the_executor() {
    let registry = CapabilityRegistry::in_memory();
    let (definition, calls) = counted_capability("known", "github", CapabilityMode::Read);
    registry.register(definition);

    // an empty context would be denied by the permission middleware, so
    // getting UnknownCapability proves the lookup failed before the chain
    let ctx = ExecutionContext::new("org-1").shared();
    let err = registry.execute("missing", json!({}), ctx).await.unwrap_err();
    assert!(matches!(err, CoreError::UnknownCapability(id) if id == "missing"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn permission_denial_short_circuits_executor_and_policy() {
    let registry = CapabilityRegistry::in_memory();
    let (definition, calls) = counted_capability("github_issues_list", "github", CapabilityMode::Read);
    registry.register(definition);

    // a policy that would also deny; permission middleware must win
    let policy_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&policy_hits);
    let ctx = ExecutionContext::new("org-1")
        .with_policies(vec![OrgPolicy::new(
            "spy",
            PolicyRule::Custom(Arc::new(move |_input| {
                hits.fetch_add(1, Ordering::SeqCst);
                PolicyDecision::deny("should never be consulted")
            })),
        )])
        .shared();

    let err = registry
        .execute("github_issues_list", json!({}), ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(policy_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn policy_denial_short_circuits_the_executor() {
    let registry = CapabilityRegistry::in_memory();
    let (definition, calls) =
        counted_capability("slack_message_send", "slack", CapabilityMode::Write);
    registry.register(definition);

    let ctx = ExecutionContext::new("org-1")
        .with_permissions(vec![Permission::any(AccessLevel::Write)])
        .with_policies(vec![OrgPolicy::new(
            "quiet-hours",
            PolicyRule::DenyActionType {
                action_type: "write".to_string(),
                reason: Some("writes are frozen during the incident".to_string()),
            },
        )])
        .shared();

    let err = registry
        .execute("slack_message_send", json!({"text": "hi"}), ctx)
        .await
        .unwrap_err();
    match err {
        CoreError::PolicyViolation { policy, reason } => {
            assert_eq!(policy, "quiet-hours");
            assert_eq!(reason, "writes are frozen during the incident");
        }
        other => panic!("expected PolicyViolation, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn write_permission_does_not_cover_read_capabilities() {
    let registry = CapabilityRegistry::in_memory();
    let (definition, calls) = counted_capability("github_issues_list", "github", CapabilityMode::Read);
    registry.register(definition);

    let ctx = ExecutionContext::new("org-1")
        .with_permissions(vec![Permission::any(AccessLevel::Write)])
        .shared();
    let err = registry
        .execute("github_issues_list", json!({}), ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PermissionDenied { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Handler that needs a bearer token before it can call its integration.
struct OauthHandler {
    credentials: Arc<StaticCredentialProvider>,
    integration_id: String,
}

#[async_trait]
impl CapabilityHandler for OauthHandler {
    async fn execute(&self, _params: &Value, context: &ExecutionContext) -> CoreResult<Value> {
        let token = self
            .credentials
            .get_valid_access_token(&context.org_id, &self.integration_id)
            .await?;
        Ok(json!({"authorized_as": token}))
    }
}

#[tokio::test]
async fn missing_credential_surfaces_as_an_execution_time_error() {
    let registry = CapabilityRegistry::in_memory();
    let credentials = Arc::new(StaticCredentialProvider::new().with_token("org-1", "github", "tok-1"));
    registry.register(
        CapabilityDefinition::new("github_issues_list", "github", CapabilityMode::Read)
            .with_handler(Arc::new(OauthHandler {
                credentials: Arc::clone(&credentials),
                integration_id: "github".to_string(),
            })),
    );
    registry.register(
        CapabilityDefinition::new("linear_issues_list", "linear", CapabilityMode::Read)
            .with_handler(Arc::new(OauthHandler {
                credentials,
                integration_id: "linear".to_string(),
            })),
    );

    let ctx = ExecutionContext::new("org-1")
        .with_permissions(vec![Permission::any(AccessLevel::Read)])
        .shared();
    let out = registry
        .execute("github_issues_list", json!({}), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(out, json!({"authorized_as": "tok-1"}));

    // linear was never connected for this org; the permission and policy
    // layers pass and the failure comes from the executor itself
    let err = registry
        .execute("linear_issues_list", json!({}), ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Credential(_)));
}

#[tokio::test]
async fn granted_call_reaches_the_executor_once() {
    let registry = CapabilityRegistry::in_memory();
    let (definition, calls) =
        counted_capability("jira_issue_create", "jira", CapabilityMode::Action);
    registry.register(definition);

    let ctx = ExecutionContext::new("org-1")
        .with_permissions(vec![Permission::integration("jira", AccessLevel::Write)])
        .with_policies(vec![OrgPolicy::new("default", PolicyRule::AllowAll)])
        .shared();
    let out = registry
        .execute("jira_issue_create", json!({"summary": "s"}), ctx)
        .await
        .unwrap();
    assert_eq!(out, json!({"ok": true}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
