//! Connection store collaborator: which integrations an organization has
//! connected. Lets spec validation distinguish "unknown integration" from
//! "connected but unschematized". Mirrors the `integration_connections`
//! table (org id, integration id, encrypted credentials).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::CoreResult;
use crate::types::{IntegrationId, OrgId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConnection {
    pub org_id: OrgId,
    pub integration_id: IntegrationId,
    /// Opaque to this core; decryption is the credential provider's concern.
    pub encrypted_credentials: String,
    pub connected_at: DateTime<Utc>,
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn list_connected_integrations(&self, org_id: &OrgId) -> CoreResult<Vec<IntegrationId>>;
}

/// In-memory `integration_connections` table with single-row upsert
/// semantics keyed by (org, integration).
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    rows: RwLock<Vec<IntegrationConnection>>,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, connection: IntegrationConnection) {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.iter_mut().find(|row| {
            row.org_id == connection.org_id && row.integration_id == connection.integration_id
        }) {
            *existing = connection;
        } else {
            rows.push(connection);
        }
    }

    pub async fn connect(&self, org_id: impl Into<OrgId>, integration_id: impl Into<IntegrationId>) {
        self.upsert(IntegrationConnection {
            org_id: org_id.into(),
            integration_id: integration_id.into(),
            encrypted_credentials: String::new(),
            connected_at: Utc::now(),
        })
        .await;
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn list_connected_integrations(&self, org_id: &OrgId) -> CoreResult<Vec<IntegrationId>> {
        let rows = self.rows.read().await;
        let mut ids: Vec<IntegrationId> = rows
            .iter()
            .filter(|row| &row.org_id == org_id)
            .map(|row| row.integration_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
