//! Typed, permissioned units of integration work and the registry that owns
//! them. A capability couples an id, its owning integration, a read/write
//! mode, a parameter contract and an executor; the registry stores them by
//! id and runs them through the governance/replay pipeline.

pub mod registry;
pub mod types;

pub use registry::CapabilityRegistry;
pub use types::{
    CapabilityDefinition, CapabilityHandler, CapabilityMode, FnHandler, ParamNormalizer,
    ParameterContract, RepoSlugNormalizer,
};
