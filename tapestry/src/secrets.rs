//! Credential provider collaborator. Token acquisition and refresh happen
//! elsewhere; this core only asks for a valid bearer credential on demand
//! before executing capabilities that need OAuth. Failures propagate as
//! execution-time errors and are never cached.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::{CoreError, CoreResult};
use crate::types::{IntegrationId, OrgId};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_valid_access_token(
        &self,
        org_id: &OrgId,
        integration_id: &IntegrationId,
    ) -> CoreResult<String>;
}

/// Fixed token map for tests and local development.
#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    tokens: HashMap<(OrgId, IntegrationId), String>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(
        mut self,
        org_id: impl Into<OrgId>,
        integration_id: impl Into<IntegrationId>,
        token: impl Into<String>,
    ) -> Self {
        self.tokens
            .insert((org_id.into(), integration_id.into()), token.into());
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn get_valid_access_token(
        &self,
        org_id: &OrgId,
        integration_id: &IntegrationId,
    ) -> CoreResult<String> {
        self.tokens
            .get(&(org_id.clone(), integration_id.clone()))
            .cloned()
            .ok_or_else(|| {
                CoreError::Credential(format!(
                    "no credential for integration '{integration_id}' in org '{org_id}'"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_is_an_error() {
        let provider = StaticCredentialProvider::new().with_token("org-1", "github", "tok");
        assert_eq!(
            provider
                .get_valid_access_token(&"org-1".to_string(), &"github".to_string())
                .await
                .unwrap(),
            "tok"
        );
        assert!(provider
            .get_valid_access_token(&"org-1".to_string(), &"slack".to_string())
            .await
            .is_err());
    }
}
