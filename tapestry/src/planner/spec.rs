//! The declarative specification language the chat/planning layer emits:
//! a set of views, each backed by a persisted metric, an integration
//! resource, or a direct capability query, plus the structured query shape
//! that flattens into capability parameters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CapabilityId, IntegrationId, MetricId, ViewId};

/// A set of views to compile and execute together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSpecification {
    pub views: Vec<ViewSpec>,
}

impl ViewSpecification {
    pub fn single(view: ViewSpec) -> Self {
        Self { views: vec![view] }
    }
}

/// One requested view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub id: ViewId,
    pub source: ViewSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<StructuredQuery>,
    /// Bypass the metric execution cache for this view.
    #[serde(default)]
    pub force_refresh: bool,
}

impl ViewSpec {
    pub fn new(id: impl Into<ViewId>, source: ViewSource) -> Self {
        Self {
            id: id.into(),
            source,
            query: None,
            force_refresh: false,
        }
    }

    pub fn with_query(mut self, query: StructuredQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Where a view's data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewSource {
    /// A persisted metric; served from its execution cache when fresh.
    Metric { metric_id: MetricId },
    /// An integration resource, queried through a capability chosen either
    /// explicitly or by the `{integration}_{resource}_list` convention.
    Resource {
        integration_id: IntegrationId,
        resource: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capability_id: Option<CapabilityId>,
    },
    /// A direct capability call with raw parameters.
    Capability {
        capability_id: CapabilityId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource: Option<String>,
        #[serde(default)]
        params: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl FilterOp {
    fn suffix(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySort {
    pub field: String,
    pub direction: SortDirection,
}

/// Structured filters/sort/limit, flattened into a flat parameter map at
/// compile time. Equality filters flatten to `field`; other operators to
/// `field__op` so capabilities that understand range queries can pick them
/// up, and ones that do not simply drop them as unrecognized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default)]
    pub filters: Vec<QueryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<QuerySort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl StructuredQuery {
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.filters.push(QueryFilter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn sorted(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(QuerySort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn flatten(&self) -> IndexMap<String, Value> {
        let mut params = IndexMap::new();
        for filter in &self.filters {
            let key = match filter.op {
                FilterOp::Eq => filter.field.clone(),
                other => format!("{}__{}", filter.field, other.suffix()),
            };
            params.insert(key, filter.value.clone());
        }
        if let Some(sort) = &self.sort {
            params.insert("sort_by".to_string(), Value::String(sort.field.clone()));
            let dir = match sort.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            params.insert("sort_dir".to_string(), Value::String(dir.to_string()));
        }
        if let Some(limit) = self.limit {
            params.insert("limit".to_string(), Value::from(limit));
        }
        params
    }
}

/// A fully bound, independently executable unit: one integration, one
/// capability, one resource, flat parameters. Produced by the compiler and
/// independently fallible at execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub view_id: ViewId,
    pub integration_id: IntegrationId,
    pub capability_id: CapabilityId,
    pub resource: String,
    pub params: IndexMap<String, Value>,
}

impl ExecutionPlan {
    /// The flat parameter map as the JSON object capabilities receive.
    pub fn params_value(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_keeps_declaration_order() {
        let query = StructuredQuery::default()
            .filter("state", FilterOp::Eq, json!("open"))
            .filter("created_at", FilterOp::Gte, json!("2026-01-01"))
            .sorted("created_at", SortDirection::Desc)
            .limit(50);
        let params = query.flatten();
        let keys: Vec<&String> = params.keys().collect();
        assert_eq!(keys, vec!["state", "created_at__gte", "sort_by", "sort_dir", "limit"]);
        assert_eq!(params.get("state"), Some(&json!("open")));
        assert_eq!(params.get("limit"), Some(&json!(50)));
    }

    #[test]
    fn view_source_serializes_tagged() {
        let source = ViewSource::Resource {
            integration_id: "github".to_string(),
            resource: "issues".to_string(),
            capability_id: None,
        };
        let wire = serde_json::to_value(&source).unwrap();
        assert_eq!(wire["type"], "resource");
        assert_eq!(wire["integration_id"], "github");
    }

    #[test]
    fn plan_params_value_is_a_json_object() {
        let mut params = IndexMap::new();
        params.insert("state".to_string(), json!("open"));
        let plan = ExecutionPlan {
            view_id: "v1".to_string(),
            integration_id: "github".to_string(),
            capability_id: "github_issues_list".to_string(),
            resource: "issues".to_string(),
            params,
        };
        assert_eq!(plan.params_value(), json!({"state": "open"}));
    }
}
