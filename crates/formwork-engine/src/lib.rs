//! formwork-engine - Configuration builders and the runtime evaluation engine
//!
//! Forms are described as an immutable configuration tree built with
//! [`FormBuilder`]. A [`FormContext`] binds that tree to one entity and one
//! mode and evaluates visibility, validation, field dependencies and list
//! mutations against it. [`PageContext`] adds actions and DTO mapping on top.

pub mod api;
pub mod config;
pub mod context;
pub mod dependency;
pub mod list_ops;
pub mod mapper;
pub mod message;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod validation;
pub mod visibility;

#[cfg(test)]
mod test_support;

// Re-export primary types
pub use api::{ApiClient, ApiRequest};
pub use config::{load_settings, EngineSettings};
pub use context::{
    ActionOutcome, ContextState, DialogContext, DialogOptions, DialogOutcome, FormContext,
    ListItemContext, PageConfig, PageContext, ReportedError, MAX_CASCADE_DEPTH,
};
pub use dependency::{DependencyGraph, DependsOnConfig};
pub use list_ops::{ItemErrors, ListOperations};
pub use mapper::{Mapper, MapperBuilder};
pub use message::{ChangeEvent, EngineMessage};
pub use registry::{Registrable, Registries, Registry, RouteDefinition};
pub use resolve::{resolve, Resolvable};
pub use schema::{FormBuilder, FormConfig};
pub use validation::ValidationRule;
pub use visibility::{evaluate_visibility, HiddenBy, VisibilityConfig, VisibilityResult};

/// Everything needed to declare and evaluate a form
pub mod prelude {
    pub use crate::context::{FormContext, PageConfig, PageContext};
    pub use crate::dependency::DependsOnConfig;
    pub use crate::mapper::MapperBuilder;
    pub use crate::registry::{Registrable, Registries};
    pub use crate::resolve::Resolvable;
    pub use crate::schema::{ActionPosition, DisplayMode, FormBuilder, VisibilityExt};
    pub use crate::validation::ValidationRule;
    pub use formwork_core::prelude::*;
}
