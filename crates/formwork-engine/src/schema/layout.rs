//! Rows, sections and tabs

use crate::resolve::Resolvable;
use crate::schema::field::FieldConfig;
use crate::visibility::VisibilityConfig;

/// An ordered run of fields rendered side by side
#[derive(Debug, Clone, Default)]
pub struct RowConfig {
    pub fields: Vec<FieldConfig>,
    pub visibility: Option<VisibilityConfig>,
}

impl RowConfig {
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A titled group of rows
#[derive(Debug, Clone)]
pub struct SectionConfig {
    pub id: String,
    pub title: Option<Resolvable<String>>,
    pub rows: Vec<RowConfig>,
    pub visibility: Option<VisibilityConfig>,
}

impl SectionConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            rows: Vec::new(),
            visibility: None,
        }
    }
}

/// One tab of a tab group
#[derive(Debug, Clone)]
pub struct TabConfig {
    pub id: String,
    pub label: Resolvable<String>,
    pub sections: Vec<SectionConfig>,
    pub visibility: Option<VisibilityConfig>,
}

impl TabConfig {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: Resolvable::literal(id.clone()),
            id,
            sections: Vec::new(),
            visibility: None,
        }
    }
}

/// A group of tabs
#[derive(Debug, Clone)]
pub struct TabsConfig {
    pub id: String,
    pub tabs: Vec<TabConfig>,
}
