//! Form actions (submit, cancel, reset, custom buttons)

use serde::{Deserialize, Serialize};

use crate::resolve::Resolvable;
use crate::visibility::VisibilityConfig;

/// Where the renderer places action buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPosition {
    Top,
    #[default]
    Bottom,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Submit,
    Cancel,
    Reset,
    #[default]
    Custom,
}

/// A button-like action attached to a form
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Action name; also the name matched by rule `skip_on` / `validate_on`
    pub name: String,
    pub label: Resolvable<String>,
    pub kind: ActionKind,
    /// Run validation (filtered by this action's name) before completing
    pub validates: bool,
    pub position: ActionPosition,
    pub visibility: Option<VisibilityConfig>,
    pub disabled: Option<Resolvable<bool>>,
}

impl ActionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: Resolvable::literal(name.clone()),
            name,
            kind: ActionKind::Custom,
            validates: false,
            position: ActionPosition::Bottom,
            visibility: None,
            disabled: None,
        }
    }
}
