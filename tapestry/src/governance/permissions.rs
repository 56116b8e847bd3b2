//! User-level permission evaluation.
//!
//! A permission grants access when its integration and capability scopes both
//! match (wildcard or exact) and its access level matches exactly. Write does
//! not imply read: a caller holding only `write` on an integration is still
//! denied a `read` capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::capabilities::types::CapabilityDefinition;
use crate::errors::{CoreError, CoreResult};
use crate::pipeline::{Handler, Middleware};
use crate::types::ExecutionContext;

/// Access level required by or granted for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
}

/// Either a wildcard or one exact integration/capability id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    Any,
    Exact(String),
}

impl Scope {
    pub fn covers(&self, id: &str) -> bool {
        match self {
            Scope::Any => true,
            Scope::Exact(exact) => exact == id,
        }
    }
}

impl From<String> for Scope {
    fn from(raw: String) -> Self {
        if raw == "*" {
            Scope::Any
        } else {
            Scope::Exact(raw)
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Any => "*".to_string(),
            Scope::Exact(exact) => exact,
        }
    }
}

/// One granted permission entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub integration: Scope,
    pub capability: Scope,
    pub access: AccessLevel,
}

impl Permission {
    pub fn new(integration: Scope, capability: Scope, access: AccessLevel) -> Self {
        Self {
            integration,
            capability,
            access,
        }
    }

    /// Grant `access` on every capability of every integration.
    pub fn any(access: AccessLevel) -> Self {
        Self::new(Scope::Any, Scope::Any, access)
    }

    /// Grant `access` on every capability of one integration.
    pub fn integration(integration_id: impl Into<String>, access: AccessLevel) -> Self {
        Self::new(Scope::Exact(integration_id.into()), Scope::Any, access)
    }

    fn grants(&self, integration_id: &str, capability_id: &str, access: AccessLevel) -> bool {
        self.integration.covers(integration_id)
            && self.capability.covers(capability_id)
            && self.access == access
    }
}

/// True when any entry in the permission set grants the requested access.
pub fn is_granted(
    permissions: &[Permission],
    integration_id: &str,
    capability_id: &str,
    access: AccessLevel,
) -> bool {
    permissions
        .iter()
        .any(|p| p.grants(integration_id, capability_id, access))
}

/// Check the permission set, raising [`CoreError::PermissionDenied`] when no
/// entry matches.
pub fn enforce_permissions(
    permissions: &[Permission],
    integration_id: &str,
    capability_id: &str,
    access: AccessLevel,
) -> CoreResult<()> {
    if is_granted(permissions, integration_id, capability_id, access) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            integration_id: integration_id.to_string(),
            capability_id: capability_id.to_string(),
        })
    }
}

/// Pipeline middleware enforcing the caller's permission set before anything
/// downstream runs. Denial short-circuits the chain: neither the policy
/// middleware nor the capability executor is reached.
pub struct PermissionEnforcement;

#[async_trait]
impl Middleware for PermissionEnforcement {
    async fn handle(
        &self,
        capability: Arc<CapabilityDefinition>,
        params: Value,
        context: Arc<ExecutionContext>,
        next: Handler,
    ) -> CoreResult<Value> {
        let required = capability.mode.required_access();
        enforce_permissions(
            &context.permissions,
            &capability.integration_id,
            &capability.id,
            required,
        )?;
        next(capability, params, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_on(integration: &str, capability: &str) -> Permission {
        Permission::new(
            Scope::Exact(integration.to_string()),
            Scope::Exact(capability.to_string()),
            AccessLevel::Read,
        )
    }

    #[test]
    fn exact_match_grants() {
        let perms = vec![read_on("github", "github_issues_list")];
        assert!(is_granted(
            &perms,
            "github",
            "github_issues_list",
            AccessLevel::Read
        ));
    }

    #[test]
    fn wildcard_integration_grants_any_capability() {
        let perms = vec![Permission::integration("github", AccessLevel::Read)];
        assert!(is_granted(&perms, "github", "anything", AccessLevel::Read));
        assert!(!is_granted(&perms, "slack", "anything", AccessLevel::Read));
    }

    #[test]
    fn write_does_not_imply_read() {
        let perms = vec![Permission::any(AccessLevel::Write)];
        assert!(!is_granted(&perms, "github", "cap", AccessLevel::Read));
        assert!(is_granted(&perms, "github", "cap", AccessLevel::Write));
    }

    #[test]
    fn read_does_not_imply_write() {
        let perms = vec![Permission::any(AccessLevel::Read)];
        assert!(!is_granted(&perms, "github", "cap", AccessLevel::Write));
    }

    #[test]
    fn denial_names_integration_and_capability() {
        let err = enforce_permissions(&[], "slack", "slack_message_send", AccessLevel::Write)
            .unwrap_err();
        match err {
            CoreError::PermissionDenied {
                integration_id,
                capability_id,
            } => {
                assert_eq!(integration_id, "slack");
                assert_eq!(capability_id, "slack_message_send");
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn scope_round_trips_through_strings() {
        assert_eq!(Scope::from("*".to_string()), Scope::Any);
        assert_eq!(String::from(Scope::Exact("jira".to_string())), "jira");
    }
}
