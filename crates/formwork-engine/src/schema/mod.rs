//! Immutable configuration tree and the fluent builders that produce it

pub mod action;
pub mod builder;
pub mod field;
pub mod form;
pub mod layout;
pub mod list;

pub use action::{ActionConfig, ActionKind, ActionPosition};
pub use builder::{FormBuilder, Scope, VisibilityExt};
pub use field::{ComponentRef, FieldConfig, FieldKind};
pub use form::{ConfigNode, FieldScope, FormConfig, NodeKind, SectionScope};
pub use layout::{RowConfig, SectionConfig, TabConfig, TabsConfig};
pub use list::{DisplayMode, ListActionPolicy, ListConfig};
