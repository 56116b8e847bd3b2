//! Organization-level policy evaluation.
//!
//! Policies are independent of user-level permissions: a caller may hold a
//! matching permission and still be denied by an organization rule. Each
//! policy evaluates an attempted capability call described by
//! [`PolicyInput`] and yields an allow/deny decision with an optional reason.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::capabilities::types::CapabilityDefinition;
use crate::errors::{CoreError, CoreResult};
use crate::pipeline::{Handler, Middleware};
use crate::types::ExecutionContext;

/// The attempted call a policy rules on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInput {
    pub integration_id: String,
    pub capability_id: String,
    pub action_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Rule forms an organization can attach. `Custom` lets callers bring their
/// own predicate for anything the declarative forms cannot express.
#[derive(Clone)]
pub enum PolicyRule {
    AllowAll,
    DenyIntegration {
        integration_id: String,
        reason: Option<String>,
    },
    DenyCapability {
        capability_id: String,
        reason: Option<String>,
    },
    DenyActionType {
        action_type: String,
        reason: Option<String>,
    },
    Custom(Arc<dyn Fn(&PolicyInput) -> PolicyDecision + Send + Sync>),
}

impl fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyRule::AllowAll => write!(f, "AllowAll"),
            PolicyRule::DenyIntegration { integration_id, .. } => {
                write!(f, "DenyIntegration({integration_id})")
            }
            PolicyRule::DenyCapability { capability_id, .. } => {
                write!(f, "DenyCapability({capability_id})")
            }
            PolicyRule::DenyActionType { action_type, .. } => {
                write!(f, "DenyActionType({action_type})")
            }
            PolicyRule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A named organization rule.
#[derive(Debug, Clone)]
pub struct OrgPolicy {
    pub name: String,
    pub rule: PolicyRule,
}

impl OrgPolicy {
    pub fn new(name: impl Into<String>, rule: PolicyRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    pub fn evaluate(&self, input: &PolicyInput) -> PolicyDecision {
        match &self.rule {
            PolicyRule::AllowAll => PolicyDecision::allow(),
            PolicyRule::DenyIntegration {
                integration_id,
                reason,
            } => {
                if integration_id == &input.integration_id {
                    deny_with(reason, || {
                        format!("integration '{}' is blocked by policy", input.integration_id)
                    })
                } else {
                    PolicyDecision::allow()
                }
            }
            PolicyRule::DenyCapability {
                capability_id,
                reason,
            } => {
                if capability_id == &input.capability_id {
                    deny_with(reason, || {
                        format!("capability '{}' is blocked by policy", input.capability_id)
                    })
                } else {
                    PolicyDecision::allow()
                }
            }
            PolicyRule::DenyActionType {
                action_type,
                reason,
            } => {
                if action_type == &input.action_type {
                    deny_with(reason, || {
                        format!("action type '{}' is blocked by policy", input.action_type)
                    })
                } else {
                    PolicyDecision::allow()
                }
            }
            PolicyRule::Custom(predicate) => predicate(input),
        }
    }
}

fn deny_with(reason: &Option<String>, default: impl FnOnce() -> String) -> PolicyDecision {
    PolicyDecision::deny(reason.clone().unwrap_or_else(default))
}

/// Evaluate every policy in order; the first deny wins and becomes a
/// [`CoreError::PolicyViolation`] carrying the policy's reason.
pub fn evaluate_policies(policies: &[OrgPolicy], input: &PolicyInput) -> CoreResult<()> {
    for policy in policies {
        let decision = policy.evaluate(input);
        if !decision.allowed {
            return Err(CoreError::PolicyViolation {
                policy: policy.name.clone(),
                reason: decision
                    .reason
                    .unwrap_or_else(|| "denied by policy".to_string()),
            });
        }
    }
    Ok(())
}

/// Pipeline middleware enforcing organization policy after permissions have
/// passed. A deny short-circuits the chain before the capability executor.
pub struct PolicyEnforcement;

#[async_trait]
impl Middleware for PolicyEnforcement {
    async fn handle(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
        next: Handler,
    ) -> CoreResult<Value> {
        let input = PolicyInput {
            integration_id: capability.integration_id.clone(),
            capability_id: capability.id.clone(),
            action_type: capability.mode.action_type().to_string(),
        };
        evaluate_policies(&context.policies, &input)?;
        next(capability, params, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(integration: &str, capability: &str, action: &str) -> PolicyInput {
        PolicyInput {
            integration_id: integration.to_string(),
            capability_id: capability.to_string(),
            action_type: action.to_string(),
        }
    }

    #[test]
    fn allow_all_passes() {
        let policies = vec![OrgPolicy::new("default", PolicyRule::AllowAll)];
        assert!(evaluate_policies(&policies, &input("github", "cap", "read")).is_ok());
    }

    #[test]
    fn deny_integration_carries_reason() {
        let policies = vec![OrgPolicy::new(
            "no-slack",
            PolicyRule::DenyIntegration {
                integration_id: "slack".to_string(),
                reason: Some("slack is disabled for this org".to_string()),
            },
        )];
        let err = evaluate_policies(&policies, &input("slack", "cap", "write")).unwrap_err();
        match err {
            CoreError::PolicyViolation { policy, reason } => {
                assert_eq!(policy, "no-slack");
                assert_eq!(reason, "slack is disabled for this org");
            }
            other => panic!("expected PolicyViolation, got {other:?}"),
        }
    }

    #[test]
    fn deny_action_type_blocks_writes_only() {
        let policies = vec![OrgPolicy::new(
            "read-only-org",
            PolicyRule::DenyActionType {
                action_type: "write".to_string(),
                reason: None,
            },
        )];
        assert!(evaluate_policies(&policies, &input("github", "cap", "read")).is_ok());
        assert!(evaluate_policies(&policies, &input("github", "cap", "write")).is_err());
    }

    #[test]
    fn first_deny_wins() {
        let policies = vec![
            OrgPolicy::new(
                "first",
                PolicyRule::DenyCapability {
                    capability_id: "cap".to_string(),
                    reason: Some("first".to_string()),
                },
            ),
            OrgPolicy::new(
                "second",
                PolicyRule::DenyCapability {
                    capability_id: "cap".to_string(),
                    reason: Some("second".to_string()),
                },
            ),
        ];
        let err = evaluate_policies(&policies, &input("github", "cap", "read")).unwrap_err();
        match err {
            CoreError::PolicyViolation { policy, .. } => assert_eq!(policy, "first"),
            other => panic!("expected PolicyViolation, got {other:?}"),
        }
    }

    #[test]
    fn custom_rule_sees_full_input() {
        let policies = vec![OrgPolicy::new(
            "no-deletes",
            PolicyRule::Custom(Arc::new(|input: &PolicyInput| {
                if input.capability_id.ends_with("_delete") {
                    PolicyDecision::deny("deletes require manual review")
                } else {
                    PolicyDecision::allow()
                }
            })),
        )];
        assert!(evaluate_policies(&policies, &input("jira", "jira_issue_delete", "write")).is_err());
        assert!(evaluate_policies(&policies, &input("jira", "jira_issue_create", "write")).is_ok());
    }
}
