//! Declarative view/metric specifications and their compilation into
//! validated execution plans. Compilation failures are always per-view: one
//! bad view never prevents the rest of a specification from executing.

pub mod compiler;
pub mod spec;
pub mod validator;

pub use compiler::{CompiledSpec, PlanCompiler, ViewIssue};
pub use spec::{
    ExecutionPlan, FilterOp, QueryFilter, QuerySort, SortDirection, StructuredQuery, ViewSource,
    ViewSpec, ViewSpecification,
};
pub use validator::validate_plan;
