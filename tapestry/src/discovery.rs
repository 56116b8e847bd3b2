//! Schema discovery collaborator. Discovered schemas describe the tables
//! and fields an integration exposes for an organization; the plan
//! validator consults them to flag unknown resources. Advisory only — a
//! missing schema never blocks compilation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CoreResult;
use crate::types::{IntegrationId, OrgId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredSchema {
    pub integration_id: IntegrationId,
    pub resource: String,
    pub fields: Vec<SchemaField>,
}

#[async_trait]
pub trait SchemaDiscovery: Send + Sync {
    async fn get_discovered_schemas(&self, org_id: &OrgId) -> CoreResult<Vec<DiscoveredSchema>>;
}

/// Fixed schema set, for tests and bootstrapping.
#[derive(Debug, Default)]
pub struct StaticSchemaDiscovery {
    schemas: Vec<DiscoveredSchema>,
}

impl StaticSchemaDiscovery {
    pub fn new(schemas: Vec<DiscoveredSchema>) -> Self {
        Self { schemas }
    }
}

#[async_trait]
impl SchemaDiscovery for StaticSchemaDiscovery {
    async fn get_discovered_schemas(&self, _org_id: &OrgId) -> CoreResult<Vec<DiscoveredSchema>> {
        Ok(self.schemas.clone())
    }
}
