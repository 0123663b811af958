//! Pages: a form plus its actions, bound to one entity
//!
//! A [`PageConfig`] is a registrable artifact naming its form, an optional
//! route path and an optional mapper id. A [`PageContext`] wraps the page's
//! [`FormContext`] and turns action triggers into [`ActionOutcome`]s.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use formwork_core::prelude::*;

use crate::context::FormContext;
use crate::registry::Registries;
use crate::schema::{ActionConfig, ActionKind, FormConfig};
use crate::visibility::evaluate_visibility;

/// A page definition
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub id: String,
    pub title: Option<String>,
    /// Route path registered alongside the page
    pub route: Option<String>,
    /// Mapper applied to the payload of submit actions
    pub mapper: Option<String>,
    pub form: Arc<FormConfig>,
}

impl PageConfig {
    pub fn new(id: impl Into<String>, form: Arc<FormConfig>) -> Self {
        Self {
            id: id.into(),
            title: None,
            route: None,
            mapper: None,
            form,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn route(mut self, path: impl Into<String>) -> Self {
        self.route = Some(path.into());
        self
    }

    pub fn mapper(mut self, mapper_id: impl Into<String>) -> Self {
        self.mapper = Some(mapper_id.into());
        self
    }
}

/// Result of triggering a page action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Validation passed; the payload is mapped to a DTO when the page names a mapper
    Submitted { action: String, payload: Record },
    /// Validation failed; field errors keyed by field path
    Blocked {
        action: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    Cancelled { action: String },
    Reset { action: String },
    Custom { action: String },
    /// Unknown, hidden or disabled action
    Unavailable { action: String },
}

/// Runtime facade for a page
#[derive(Debug)]
pub struct PageContext {
    page: Arc<PageConfig>,
    form: FormContext,
}

impl PageContext {
    pub fn new(
        page: Arc<PageConfig>,
        entity: Record,
        mode: impl Into<String>,
        registries: Arc<Registries>,
    ) -> Self {
        let form = FormContext::new(Arc::clone(&page.form), entity, mode, registries);
        Self { page, form }
    }

    /// Open a registered page by id
    pub fn open(
        registries: Arc<Registries>,
        page_id: &str,
        entity: Record,
        mode: impl Into<String>,
    ) -> Result<Self> {
        let page = registries
            .pages
            .get(page_id)
            .ok_or_else(|| Error::registry(format!("page '{}' is not registered", page_id)))?;
        Ok(Self::new(page, entity, mode, registries))
    }

    /// Swap the wrapped form context, e.g. to attach settings or a client
    pub fn map_form(mut self, f: impl FnOnce(FormContext) -> FormContext) -> Self {
        self.form = f(self.form);
        self
    }

    pub fn page(&self) -> &PageConfig {
        &self.page
    }

    pub fn form(&self) -> &FormContext {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormContext {
        &mut self.form
    }

    pub fn into_form(self) -> FormContext {
        self.form
    }

    /// Page title, falling back to the form title
    pub fn title(&self) -> Option<String> {
        self.page.title.clone().or_else(|| {
            self.page
                .form
                .title
                .as_ref()
                .map(|title| title.resolve(&self.form))
        })
    }

    pub fn visible_actions(&self) -> Vec<&ActionConfig> {
        self.page
            .form
            .actions()
            .into_iter()
            .filter(|action| evaluate_visibility(action.visibility.as_ref(), &self.form).is_visible)
            .collect()
    }

    pub fn is_action_disabled(&self, name: &str) -> bool {
        self.page
            .form
            .action(name)
            .and_then(|action| action.disabled.as_ref())
            .map_or(false, |disabled| disabled.resolve(&self.form))
    }

    /// Run an action: validate when it asks to, then produce its outcome
    pub fn trigger_action(&mut self, name: &str) -> Result<ActionOutcome> {
        self.form.ensure_active("trigger action")?;
        let action_name = name.to_string();

        let page = Arc::clone(&self.page);
        let available = self
            .visible_actions()
            .iter()
            .any(|action| action.name == name)
            && !self.is_action_disabled(name);
        let Some(action) = page.form.action(name).filter(|_| available) else {
            debug!("Action '{}' is not available on page '{}'", name, page.id);
            return Ok(ActionOutcome::Unavailable { action: action_name });
        };

        if action.validates && !self.form.validate_for_action(name) {
            return Ok(ActionOutcome::Blocked {
                action: action_name,
                errors: self.collected_errors(),
            });
        }

        let outcome = match action.kind {
            ActionKind::Submit => ActionOutcome::Submitted {
                action: action_name,
                payload: self.payload()?,
            },
            ActionKind::Cancel => ActionOutcome::Cancelled { action: action_name },
            ActionKind::Reset => {
                self.form.reset_form()?;
                ActionOutcome::Reset { action: action_name }
            }
            ActionKind::Custom => ActionOutcome::Custom { action: action_name },
        };
        info!("Page '{}' action '{}' completed", page.id, name);
        Ok(outcome)
    }

    pub fn destroy(&mut self) {
        self.form.destroy();
    }

    /// Field errors plus per-item errors as `list[index].field` paths
    fn collected_errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut errors = self.form.errors().clone();
        for (list, state) in &self.form.lists {
            for (index, item) in &state.item_errors {
                if !item.item.is_empty() {
                    errors.insert(format!("{}[{}]", list, index), item.item.clone());
                }
                for (field, messages) in &item.fields {
                    errors.insert(format!("{}[{}].{}", list, index, field), messages.clone());
                }
            }
        }
        errors
    }

    fn payload(&self) -> Result<Record> {
        let values = self.form.values();
        match &self.page.mapper {
            Some(mapper_id) => {
                let mapper = self.form.registries().mappers.get(mapper_id).ok_or_else(|| {
                    Error::registry(format!("mapper '{}' is not registered", mapper_id))
                })?;
                Ok(mapper.to_dto(values))
            }
            None => Ok(values.clone()),
        }
    }
}
