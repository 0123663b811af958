//! List (array-valued field) configuration

use formwork_core::Record;
use serde::{Deserialize, Serialize};

use crate::schema::action::ActionPosition;
use crate::schema::field::FieldConfig;
use crate::schema::layout::RowConfig;
use crate::validation::ValidationRule;

/// How a list's items are rendered; does not affect how they are mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Rows,
    Tabs,
    Table,
    Cards,
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Rows => write!(f, "rows"),
            DisplayMode::Tabs => write!(f, "tabs"),
            DisplayMode::Table => write!(f, "table"),
            DisplayMode::Cards => write!(f, "cards"),
        }
    }
}

/// Which list actions the renderer offers, and how
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListActionPolicy {
    pub can_add: bool,
    pub can_remove: bool,
    pub can_reorder: bool,
    /// Prompt shown before removing an item, if any
    pub confirm_remove: Option<String>,
    pub add_label: String,
    pub remove_label: String,
    pub position: ActionPosition,
}

impl Default for ListActionPolicy {
    fn default() -> Self {
        Self {
            can_add: true,
            can_remove: true,
            can_reorder: true,
            confirm_remove: None,
            add_label: "Add".to_string(),
            remove_label: "Remove".to_string(),
            position: ActionPosition::Bottom,
        }
    }
}

/// Configuration of an array-valued field
#[derive(Debug, Clone, Default)]
pub struct ListConfig {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub min_message: Option<String>,
    pub max_message: Option<String>,
    /// Base object that partial values of new items are merged onto
    pub default_item: Record,
    pub display: DisplayMode,
    /// Rules run against each whole item object
    pub item_rules: Vec<ValidationRule>,
    /// Layout of the fields inside each item
    pub item_rows: Vec<RowConfig>,
    pub actions: ListActionPolicy,
}

impl ListConfig {
    /// List-level errors for a given item count
    pub fn bound_errors(&self, count: usize) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(min) = self.min {
            if count < min {
                errors.push(
                    self.min_message
                        .clone()
                        .unwrap_or_else(|| format!("At least {} item(s) required", min)),
                );
            }
        }
        if let Some(max) = self.max {
            if count > max {
                errors.push(
                    self.max_message
                        .clone()
                        .unwrap_or_else(|| format!("At most {} item(s) allowed", max)),
                );
            }
        }
        errors
    }

    pub fn is_full(&self, count: usize) -> bool {
        self.max.map_or(false, |max| count >= max)
    }

    pub fn is_at_min(&self, count: usize) -> bool {
        self.min.map_or(false, |min| count <= min)
    }

    /// Fields inside each item, with the row that holds them
    pub fn item_fields(&self) -> impl Iterator<Item = (&RowConfig, &FieldConfig)> {
        self.item_rows
            .iter()
            .flat_map(|row| row.fields.iter().map(move |field| (row, field)))
    }

    pub fn item_field(&self, name: &str) -> Option<(&RowConfig, &FieldConfig)> {
        self.item_fields().find(|(_, field)| field.name == name)
    }
}
