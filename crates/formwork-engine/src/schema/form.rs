//! The built configuration tree
//!
//! A [`FormConfig`] is immutable once built and shared behind an `Arc`.
//! Top-level content is a sequence of tagged [`ConfigNode`]s.

use serde::Serialize;

use crate::resolve::Resolvable;
use crate::schema::action::ActionConfig;
use crate::schema::field::FieldConfig;
use crate::schema::layout::{RowConfig, SectionConfig, TabConfig, TabsConfig};
use crate::visibility::VisibilityConfig;

/// Kind tag of a top-level node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Section,
    Tabs,
    Action,
}

/// A top-level element of a form
#[derive(Debug, Clone)]
pub enum ConfigNode {
    Section(SectionConfig),
    Tabs(TabsConfig),
    Action(ActionConfig),
}

impl ConfigNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigNode::Section(_) => NodeKind::Section,
            ConfigNode::Tabs(_) => NodeKind::Tabs,
            ConfigNode::Action(_) => NodeKind::Action,
        }
    }
}

/// A field together with the containers that enclose it
#[derive(Debug, Clone, Copy)]
pub struct FieldScope<'a> {
    pub field: &'a FieldConfig,
    pub row: &'a RowConfig,
    pub section: &'a SectionConfig,
    pub tab: Option<&'a TabConfig>,
}

impl<'a> FieldScope<'a> {
    /// Visibility configs from the outermost container to the field itself
    pub fn visibility_chain(&self) -> [Option<&'a VisibilityConfig>; 4] {
        [
            self.tab.and_then(|tab| tab.visibility.as_ref()),
            self.section.visibility.as_ref(),
            self.row.visibility.as_ref(),
            self.field.visibility.as_ref(),
        ]
    }
}

/// A section together with its enclosing tab, if any
#[derive(Debug, Clone, Copy)]
pub struct SectionScope<'a> {
    pub section: &'a SectionConfig,
    pub tab: Option<&'a TabConfig>,
}

impl<'a> SectionScope<'a> {
    pub fn visibility_chain(&self) -> [Option<&'a VisibilityConfig>; 2] {
        [
            self.tab.and_then(|tab| tab.visibility.as_ref()),
            self.section.visibility.as_ref(),
        ]
    }
}

/// An immutable, fully built form configuration
#[derive(Debug, Clone)]
pub struct FormConfig {
    pub id: String,
    pub title: Option<Resolvable<String>>,
    pub nodes: Vec<ConfigNode>,
}

impl FormConfig {
    /// Every section in document order, including sections inside tabs
    pub fn section_scopes(&self) -> Vec<SectionScope<'_>> {
        let mut scopes = Vec::new();
        for node in &self.nodes {
            match node {
                ConfigNode::Section(section) => scopes.push(SectionScope { section, tab: None }),
                ConfigNode::Tabs(tabs) => {
                    for tab in &tabs.tabs {
                        for section in &tab.sections {
                            scopes.push(SectionScope {
                                section,
                                tab: Some(tab),
                            });
                        }
                    }
                }
                ConfigNode::Action(_) => {}
            }
        }
        scopes
    }

    /// Every top-level field in document order
    pub fn field_scopes(&self) -> Vec<FieldScope<'_>> {
        let mut scopes = Vec::new();
        for SectionScope { section, tab } in self.section_scopes() {
            for row in &section.rows {
                for field in &row.fields {
                    scopes.push(FieldScope {
                        field,
                        row,
                        section,
                        tab,
                    });
                }
            }
        }
        scopes
    }

    /// First field with the given name
    pub fn field_scope(&self, name: &str) -> Option<FieldScope<'_>> {
        self.field_scopes()
            .into_iter()
            .find(|scope| scope.field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.field_scope(name).map(|scope| scope.field)
    }

    pub fn section_scope(&self, id: &str) -> Option<SectionScope<'_>> {
        self.section_scopes()
            .into_iter()
            .find(|scope| scope.section.id == id)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.field_scopes()
            .into_iter()
            .map(|scope| scope.field.name.as_str())
            .collect()
    }

    pub fn list_field_names(&self) -> Vec<&str> {
        self.field_scopes()
            .into_iter()
            .filter(|scope| scope.field.is_list())
            .map(|scope| scope.field.name.as_str())
            .collect()
    }

    pub fn actions(&self) -> Vec<&ActionConfig> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                ConfigNode::Action(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    pub fn action(&self, name: &str) -> Option<&ActionConfig> {
        self.actions().into_iter().find(|action| action.name == name)
    }
}
