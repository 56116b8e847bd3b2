//! Plan and specification validation.
//!
//! Plan validation against the registry is binding: unknown capability,
//! integration mismatch and missing required filters reject the plan
//! (per-view). Unrecognized parameters are dropped with a warning, never
//! rejected — callers may send parameters a newer capability version
//! understands. Specification validation against discovered integration
//! schemas is advisory only and never halts compilation of other views.

use tracing::warn;

use crate::capabilities::registry::CapabilityRegistry;
use crate::connections::ConnectionStore;
use crate::discovery::SchemaDiscovery;
use crate::errors::PlanError;
use crate::metrics::store::MetricStore;
use crate::planner::compiler::ViewIssue;
use crate::planner::spec::{ExecutionPlan, ViewSource, ViewSpecification};
use crate::types::OrgId;

/// Validate a compiled plan against the registry, dropping unrecognized
/// parameters. Returns human-readable warnings for everything dropped.
pub fn validate_plan(
    registry: &CapabilityRegistry,
    plan: &mut ExecutionPlan,
) -> Result<Vec<String>, PlanError> {
    let definition =
        registry
            .get(&plan.capability_id)
            .ok_or_else(|| PlanError::UnknownCapabilityId {
                view_id: plan.view_id.clone(),
                capability_id: plan.capability_id.clone(),
            })?;

    if definition.integration_id != plan.integration_id {
        return Err(PlanError::IntegrationMismatch {
            view_id: plan.view_id.clone(),
            capability_id: plan.capability_id.clone(),
            plan_integration: plan.integration_id.clone(),
            capability_integration: definition.integration_id.clone(),
        });
    }

    for key in &definition.contract.required {
        if !plan.params.contains_key(key) {
            return Err(PlanError::MissingRequiredParameter {
                capability_id: plan.capability_id.clone(),
                key: key.clone(),
            });
        }
    }

    let mut warnings = Vec::new();
    plan.params.retain(|key, _| {
        if definition.contract.recognizes(key) {
            true
        } else {
            warnings.push(format!(
                "parameter '{key}' is not recognized by capability '{}' and was dropped",
                plan.capability_id
            ));
            false
        }
    });
    for warning in &warnings {
        warn!(view = %plan.view_id, "{warning}");
    }

    Ok(warnings)
}

/// Advisory connectivity/schema check for a whole specification. Reports
/// unconnected integrations, undiscovered resources and unknown filter
/// fields as per-view issues; never fails.
pub async fn validate_spec_connectivity(
    spec: &ViewSpecification,
    org_id: &OrgId,
    metrics: &dyn MetricStore,
    connections: &dyn ConnectionStore,
    discovery: &dyn SchemaDiscovery,
) -> Vec<ViewIssue> {
    let mut issues = Vec::new();

    let connected = match connections.list_connected_integrations(org_id).await {
        Ok(connected) => connected,
        Err(e) => {
            issues.push(ViewIssue {
                view_id: "*".to_string(),
                message: format!("connection store unavailable: {e}"),
            });
            return issues;
        }
    };
    let schemas = match discovery.get_discovered_schemas(org_id).await {
        Ok(schemas) => schemas,
        Err(e) => {
            issues.push(ViewIssue {
                view_id: "*".to_string(),
                message: format!("schema discovery unavailable: {e}"),
            });
            Vec::new()
        }
    };

    for view in &spec.views {
        let target = match &view.source {
            ViewSource::Resource {
                integration_id,
                resource,
                ..
            } => Some((integration_id.clone(), resource.clone())),
            ViewSource::Metric { metric_id } => match metrics.get(metric_id).await {
                Ok(Some(metric)) => Some((metric.integration_id.clone(), metric.resource.clone())),
                Ok(None) => {
                    issues.push(ViewIssue {
                        view_id: view.id.clone(),
                        message: format!("references unknown metric '{metric_id}'"),
                    });
                    None
                }
                Err(e) => {
                    issues.push(ViewIssue {
                        view_id: view.id.clone(),
                        message: format!("metric store unavailable: {e}"),
                    });
                    None
                }
            },
            // direct capability queries are validated against the registry
            ViewSource::Capability { .. } => None,
        };

        let Some((integration_id, resource)) = target else {
            continue;
        };

        if !connected.contains(&integration_id) {
            issues.push(ViewIssue {
                view_id: view.id.clone(),
                message: format!("integration '{integration_id}' is not connected"),
            });
            continue;
        }

        let integration_schemas: Vec<_> = schemas
            .iter()
            .filter(|s| s.integration_id == integration_id)
            .collect();
        if integration_schemas.is_empty() {
            // connected but unschematized; nothing further to check
            continue;
        }

        let Some(schema) = integration_schemas.iter().find(|s| s.resource == resource) else {
            issues.push(ViewIssue {
                view_id: view.id.clone(),
                message: format!(
                    "resource '{resource}' was not discovered on integration '{integration_id}'"
                ),
            });
            continue;
        };

        if let Some(query) = &view.query {
            for filter in &query.filters {
                if !schema.fields.iter().any(|f| f.name == filter.field) {
                    issues.push(ViewIssue {
                        view_id: view.id.clone(),
                        message: format!(
                            "filter field '{}' is not in the discovered schema for '{resource}'",
                            filter.field
                        ),
                    });
                }
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::types::{CapabilityDefinition, CapabilityMode, ParameterContract};
    use indexmap::IndexMap;
    use serde_json::json;

    fn registry_with_issues_list() -> CapabilityRegistry {
        let registry = CapabilityRegistry::in_memory();
        registry.register(
            CapabilityDefinition::new("github_issues_list", "github", CapabilityMode::Read)
                .with_contract(ParameterContract::new(&["owner", "repo"], &["state", "limit"])),
        );
        registry
    }

    fn plan(capability_id: &str, integration_id: &str, params: &[(&str, serde_json::Value)]) -> ExecutionPlan {
        let mut map = IndexMap::new();
        for (k, v) in params {
            map.insert(k.to_string(), v.clone());
        }
        ExecutionPlan {
            view_id: "v1".to_string(),
            integration_id: integration_id.to_string(),
            capability_id: capability_id.to_string(),
            resource: "issues".to_string(),
            params: map,
        }
    }

    #[test]
    fn unknown_capability_is_rejected() {
        let registry = registry_with_issues_list();
        let mut p = plan("github_pulls_list", "github", &[]);
        let err = validate_plan(&registry, &mut p).unwrap_err();
        assert!(matches!(err, PlanError::UnknownCapabilityId { .. }));
    }

    #[test]
    fn integration_mismatch_is_rejected() {
        let registry = registry_with_issues_list();
        let mut p = plan(
            "github_issues_list",
            "jira",
            &[("owner", json!("acme")), ("repo", json!("widgets"))],
        );
        let err = validate_plan(&registry, &mut p).unwrap_err();
        assert!(matches!(err, PlanError::IntegrationMismatch { .. }));
    }

    #[test]
    fn missing_required_filter_names_the_key() {
        let registry = registry_with_issues_list();
        let mut p = plan("github_issues_list", "github", &[("owner", json!("acme"))]);
        let err = validate_plan(&registry, &mut p).unwrap_err();
        match err {
            PlanError::MissingRequiredParameter { key, .. } => assert_eq!(key, "repo"),
            other => panic!("expected MissingRequiredParameter, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_params_are_dropped_with_warning() {
        let registry = registry_with_issues_list();
        let mut p = plan(
            "github_issues_list",
            "github",
            &[
                ("owner", json!("acme")),
                ("repo", json!("widgets")),
                ("assignee", json!("kim")),
            ],
        );
        let warnings = validate_plan(&registry, &mut p).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("assignee"));
        assert!(!p.params.contains_key("assignee"));
        assert!(p.params.contains_key("owner"));
    }
}
