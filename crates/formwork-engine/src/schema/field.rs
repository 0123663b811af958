//! Field configuration

use formwork_core::Record;
use serde::Serialize;
use serde_json::Value;

use crate::dependency::DependsOnConfig;
use crate::resolve::Resolvable;
use crate::schema::list::ListConfig;
use crate::validation::ValidationRule;
use crate::visibility::VisibilityConfig;

/// Abstract component reference, passed through to the renderer untouched
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ComponentRef(pub String);

impl ComponentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What kind of value a field holds
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A single value
    Input,
    /// An array of item objects
    List(ListConfig),
}

/// A single field in a row
#[derive(Debug, Clone)]
pub struct FieldConfig {
    /// Entity key; unique within the containing row
    pub name: String,
    pub kind: FieldKind,
    pub component: Option<ComponentRef>,
    pub label: Resolvable<String>,
    pub rules: Vec<ValidationRule>,
    pub props: Resolvable<Record>,
    pub visibility: Option<VisibilityConfig>,
    pub disabled: Option<Resolvable<bool>>,
    pub read_only: Option<Resolvable<bool>>,
    pub depends_on: Vec<DependsOnConfig>,
    /// Applied when the bound entity has no value for this field
    pub default_value: Option<Value>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: Resolvable::literal(name.clone()),
            name,
            kind: FieldKind::Input,
            component: None,
            rules: Vec::new(),
            props: Resolvable::literal(Record::new()),
            visibility: None,
            disabled: None,
            read_only: None,
            depends_on: Vec::new(),
            default_value: None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, FieldKind::List(_))
    }

    pub fn list_config(&self) -> Option<&ListConfig> {
        match &self.kind {
            FieldKind::List(config) => Some(config),
            FieldKind::Input => None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|rule| rule.kind == "required")
    }
}
