//! Fluent configuration builders
//!
//! Each scope builder owns its parent; `end()` hands the finished child to
//! the parent and returns it, so an `end()` without a matching open scope
//! does not type-check. Building is append-only.
//!
//! ```
//! use formwork_engine::prelude::*;
//!
//! let form = FormBuilder::new("person")
//!     .section("names")
//!     .row()
//!     .field("firstName").required("First name is required").end()
//!     .field("lastName").required("Last name is required").end()
//!     .end()
//!     .end()
//!     .build()
//!     .unwrap();
//! assert_eq!(form.field_names(), vec!["firstName", "lastName"]);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use formwork_core::{Error, Record, Result};
use serde_json::Value;

use crate::context::FormContext;
use crate::dependency::DependsOnConfig;
use crate::resolve::Resolvable;
use crate::schema::action::{ActionConfig, ActionKind, ActionPosition};
use crate::schema::field::{ComponentRef, FieldConfig, FieldKind};
use crate::schema::form::{ConfigNode, FormConfig};
use crate::schema::layout::{RowConfig, SectionConfig, TabConfig, TabsConfig};
use crate::schema::list::{DisplayMode, ListConfig};
use crate::validation::ValidationRule;
use crate::visibility::VisibilityConfig;

/// A builder that can receive a finished child of type `C`
pub trait Scope<C> {
    fn accept(&mut self, child: C, issues: Vec<String>);
}

/// Visibility predicates shared by every scope builder
pub trait VisibilityExt: Sized {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig;

    fn hide(mut self, hidden: bool) -> Self {
        self.visibility_mut().hide = Some(Resolvable::literal(hidden));
        self
    }

    fn hide_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.visibility_mut().hide = Some(Resolvable::computed(f));
        self
    }

    fn visible_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.visibility_mut().visible = Some(Resolvable::computed(f));
        self
    }

    fn hide_by_access(mut self, hidden: bool) -> Self {
        self.visibility_mut().hide_by_access = Some(Resolvable::literal(hidden));
        self
    }

    fn hide_by_access_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.visibility_mut().hide_by_access = Some(Resolvable::computed(f));
        self
    }

    fn visible_by_access_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.visibility_mut().visible_by_access = Some(Resolvable::computed(f));
        self
    }
}

fn visibility_slot(slot: &mut Option<VisibilityConfig>) -> &mut VisibilityConfig {
    slot.get_or_insert_with(VisibilityConfig::default)
}

// ─────────────────────────────────────────────────────────────────
// Form
// ─────────────────────────────────────────────────────────────────

/// Root builder producing an immutable [`FormConfig`]
#[derive(Debug)]
pub struct FormBuilder {
    id: String,
    title: Option<Resolvable<String>>,
    nodes: Vec<ConfigNode>,
    issues: Vec<String>,
    built: bool,
}

impl FormBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            nodes: Vec::new(),
            issues: Vec::new(),
            built: false,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(Resolvable::literal(title.into()));
        self
    }

    pub fn title_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> String + Send + Sync + 'static,
    {
        self.title = Some(Resolvable::computed(f));
        self
    }

    pub fn section(self, id: impl Into<String>) -> SectionBuilder<Self> {
        SectionBuilder::new(self, id)
    }

    pub fn tabs(self, id: impl Into<String>) -> TabsBuilder<Self> {
        TabsBuilder {
            parent: self,
            config: TabsConfig {
                id: id.into(),
                tabs: Vec::new(),
            },
            issues: Vec::new(),
        }
    }

    pub fn action(self, name: impl Into<String>) -> ActionBuilder<Self> {
        ActionBuilder {
            parent: self,
            config: ActionConfig::new(name),
        }
    }

    /// Materialize the configuration snapshot
    ///
    /// Fails with [`Error::BuilderState`] when called a second time or when
    /// the tree is malformed. Later changes to the builder never reach a
    /// snapshot that was already returned.
    pub fn build(&mut self) -> Result<Arc<FormConfig>> {
        if self.built {
            return Err(Error::builder_state(format!(
                "form '{}' was already built",
                self.id
            )));
        }

        let config = FormConfig {
            id: self.id.clone(),
            title: self.title.clone(),
            nodes: self.nodes.clone(),
        };

        let mut issues = self.issues.clone();
        issues.extend(check_tree(&config));
        if !issues.is_empty() {
            return Err(Error::builder_state(issues.join("; ")));
        }

        self.built = true;
        tracing::debug!(
            "Built form '{}' with {} field(s)",
            config.id,
            config.field_scopes().len()
        );
        Ok(Arc::new(config))
    }
}

impl Scope<SectionConfig> for FormBuilder {
    fn accept(&mut self, child: SectionConfig, issues: Vec<String>) {
        self.nodes.push(ConfigNode::Section(child));
        self.issues.extend(issues);
    }
}

impl Scope<TabsConfig> for FormBuilder {
    fn accept(&mut self, child: TabsConfig, issues: Vec<String>) {
        self.nodes.push(ConfigNode::Tabs(child));
        self.issues.extend(issues);
    }
}

impl Scope<ActionConfig> for FormBuilder {
    fn accept(&mut self, child: ActionConfig, issues: Vec<String>) {
        self.nodes.push(ConfigNode::Action(child));
        self.issues.extend(issues);
    }
}

/// Structural checks run on every build
fn check_tree(form: &FormConfig) -> Vec<String> {
    let mut issues = Vec::new();

    if form.id.trim().is_empty() {
        issues.push("form id must not be empty".to_string());
    }

    let mut section_ids = HashSet::new();
    for scope in form.section_scopes() {
        let section = scope.section;
        if section.id.trim().is_empty() {
            issues.push("section id must not be empty".to_string());
        } else if !section_ids.insert(section.id.as_str()) {
            issues.push(format!("duplicate section id '{}'", section.id));
        }
        for (index, row) in section.rows.iter().enumerate() {
            check_row(row, &format!("section '{}' row {}", section.id, index), &mut issues);
        }
    }

    for node in &form.nodes {
        if let ConfigNode::Tabs(tabs) = node {
            if tabs.tabs.is_empty() {
                issues.push(format!("tab group '{}' has no tabs", tabs.id));
            }
            let mut tab_ids = HashSet::new();
            for tab in &tabs.tabs {
                if !tab_ids.insert(tab.id.as_str()) {
                    issues.push(format!("duplicate tab id '{}' in '{}'", tab.id, tabs.id));
                }
            }
        }
    }

    let mut action_names = HashSet::new();
    for action in form.actions() {
        if action.name.trim().is_empty() {
            issues.push("action name must not be empty".to_string());
        } else if !action_names.insert(action.name.as_str()) {
            issues.push(format!("duplicate action '{}'", action.name));
        }
    }

    let known: HashSet<&str> = form.field_names().into_iter().collect();
    let mut seen = HashSet::new();
    for scope in form.field_scopes() {
        let field = scope.field;
        if !seen.insert(field.name.as_str()) {
            tracing::debug!(
                "Field '{}' appears in more than one row of form '{}'",
                field.name,
                form.id
            );
        }
        for dependency in &field.depends_on {
            if dependency.sources.is_empty() {
                issues.push(format!("dependency on '{}' declares no source", field.name));
            }
            for source in &dependency.sources {
                if source == &field.name {
                    issues.push(format!("field '{}' depends on itself", field.name));
                } else if !known.contains(source.as_str()) {
                    issues.push(format!(
                        "field '{}' depends on unknown field '{}'",
                        field.name, source
                    ));
                }
            }
        }
    }

    issues
}

fn check_row(row: &RowConfig, location: &str, issues: &mut Vec<String>) {
    let mut names = HashSet::new();
    for field in &row.fields {
        if field.name.trim().is_empty() {
            issues.push(format!("{}: field name must not be empty", location));
        } else if !names.insert(field.name.as_str()) {
            issues.push(format!("{}: duplicate field '{}'", location, field.name));
        }
        if let Some(list) = field.list_config() {
            if let (Some(min), Some(max)) = (list.min, list.max) {
                if min > max {
                    issues.push(format!(
                        "list '{}': min {} exceeds max {}",
                        field.name, min, max
                    ));
                }
            }
            for (index, item_row) in list.item_rows.iter().enumerate() {
                check_row(
                    item_row,
                    &format!("list '{}' item row {}", field.name, index),
                    issues,
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Sections, rows, tabs
// ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SectionBuilder<P: Scope<SectionConfig>> {
    parent: P,
    config: SectionConfig,
    issues: Vec<String>,
}

impl<P: Scope<SectionConfig>> SectionBuilder<P> {
    fn new(parent: P, id: impl Into<String>) -> Self {
        Self {
            parent,
            config: SectionConfig::new(id),
            issues: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(Resolvable::literal(title.into()));
        self
    }

    pub fn title_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> String + Send + Sync + 'static,
    {
        self.config.title = Some(Resolvable::computed(f));
        self
    }

    pub fn row(self) -> RowBuilder<Self> {
        RowBuilder::new(self)
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, self.issues);
        self.parent
    }
}

impl<P: Scope<SectionConfig>> Scope<RowConfig> for SectionBuilder<P> {
    fn accept(&mut self, child: RowConfig, issues: Vec<String>) {
        self.config.rows.push(child);
        self.issues.extend(issues);
    }
}

impl<P: Scope<SectionConfig>> VisibilityExt for SectionBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.config.visibility)
    }
}

#[derive(Debug)]
pub struct RowBuilder<P: Scope<RowConfig>> {
    parent: P,
    config: RowConfig,
    issues: Vec<String>,
}

impl<P: Scope<RowConfig>> RowBuilder<P> {
    fn new(parent: P) -> Self {
        Self {
            parent,
            config: RowConfig::default(),
            issues: Vec::new(),
        }
    }

    pub fn field(self, name: impl Into<String>) -> FieldBuilder<Self> {
        FieldBuilder {
            parent: self,
            config: FieldConfig::new(name),
            issues: Vec::new(),
        }
    }

    pub fn list(self, name: impl Into<String>) -> ListBuilder<Self> {
        ListBuilder {
            parent: self,
            field: FieldConfig::new(name),
            list: ListConfig::default(),
            issues: Vec::new(),
        }
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, self.issues);
        self.parent
    }
}

impl<P: Scope<RowConfig>> Scope<FieldConfig> for RowBuilder<P> {
    fn accept(&mut self, child: FieldConfig, issues: Vec<String>) {
        self.config.fields.push(child);
        self.issues.extend(issues);
    }
}

impl<P: Scope<RowConfig>> VisibilityExt for RowBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.config.visibility)
    }
}

#[derive(Debug)]
pub struct TabsBuilder<P: Scope<TabsConfig>> {
    parent: P,
    config: TabsConfig,
    issues: Vec<String>,
}

impl<P: Scope<TabsConfig>> TabsBuilder<P> {
    pub fn tab(self, id: impl Into<String>) -> TabBuilder<Self> {
        TabBuilder {
            parent: self,
            config: TabConfig::new(id),
            issues: Vec::new(),
        }
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, self.issues);
        self.parent
    }
}

impl<P: Scope<TabsConfig>> Scope<TabConfig> for TabsBuilder<P> {
    fn accept(&mut self, child: TabConfig, issues: Vec<String>) {
        self.config.tabs.push(child);
        self.issues.extend(issues);
    }
}

#[derive(Debug)]
pub struct TabBuilder<P: Scope<TabConfig>> {
    parent: P,
    config: TabConfig,
    issues: Vec<String>,
}

impl<P: Scope<TabConfig>> TabBuilder<P> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Resolvable::literal(label.into());
        self
    }

    pub fn label_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> String + Send + Sync + 'static,
    {
        self.config.label = Resolvable::computed(f);
        self
    }

    pub fn section(self, id: impl Into<String>) -> SectionBuilder<Self> {
        SectionBuilder::new(self, id)
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, self.issues);
        self.parent
    }
}

impl<P: Scope<TabConfig>> Scope<SectionConfig> for TabBuilder<P> {
    fn accept(&mut self, child: SectionConfig, issues: Vec<String>) {
        self.config.sections.push(child);
        self.issues.extend(issues);
    }
}

impl<P: Scope<TabConfig>> VisibilityExt for TabBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.config.visibility)
    }
}

// ─────────────────────────────────────────────────────────────────
// Fields and lists
// ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FieldBuilder<P: Scope<FieldConfig>> {
    parent: P,
    config: FieldConfig,
    issues: Vec<String>,
}

impl<P: Scope<FieldConfig>> FieldBuilder<P> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Resolvable::literal(label.into());
        self
    }

    pub fn label_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> String + Send + Sync + 'static,
    {
        self.config.label = Resolvable::computed(f);
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.config.component = Some(ComponentRef::new(component));
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.config.rules.push(rule);
        self
    }

    pub fn required(self, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::required(message))
    }

    pub fn min_length(self, min: usize, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::min_length(min, message))
    }

    pub fn max_length(self, max: usize, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::max_length(max, message))
    }

    pub fn email(self, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::email(message))
    }

    /// Add a regex rule; an invalid pattern fails the final `build()`
    pub fn pattern(mut self, pattern: &str, message: impl Into<String>) -> Self {
        match ValidationRule::pattern(pattern, message) {
            Ok(rule) => self.config.rules.push(rule),
            Err(e) => self
                .issues
                .push(format!("field '{}': {}", self.config.name, e)),
        }
        self
    }

    pub fn props(mut self, props: Record) -> Self {
        self.config.props = Resolvable::literal(props);
        self
    }

    pub fn props_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> Record + Send + Sync + 'static,
    {
        self.config.props = Resolvable::computed(f);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.config.disabled = Some(Resolvable::literal(disabled));
        self
    }

    pub fn disabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.config.disabled = Some(Resolvable::computed(f));
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = Some(Resolvable::literal(read_only));
        self
    }

    pub fn read_only_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.config.read_only = Some(Resolvable::computed(f));
        self
    }

    pub fn depends_on(mut self, dependency: DependsOnConfig) -> Self {
        self.config.depends_on.push(dependency);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.config.default_value = Some(value);
        self
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, self.issues);
        self.parent
    }
}

impl<P: Scope<FieldConfig>> VisibilityExt for FieldBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.config.visibility)
    }
}

/// Builder for an array-valued field
#[derive(Debug)]
pub struct ListBuilder<P: Scope<FieldConfig>> {
    parent: P,
    field: FieldConfig,
    list: ListConfig,
    issues: Vec<String>,
}

impl<P: Scope<FieldConfig>> ListBuilder<P> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.field.label = Resolvable::literal(label.into());
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.field.component = Some(ComponentRef::new(component));
        self
    }

    pub fn min(mut self, min: usize) -> Self {
        self.list.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.list.max = Some(max);
        self
    }

    pub fn min_message(mut self, message: impl Into<String>) -> Self {
        self.list.min_message = Some(message.into());
        self
    }

    pub fn max_message(mut self, message: impl Into<String>) -> Self {
        self.list.max_message = Some(message.into());
        self
    }

    /// Base object for new items; non-object values are ignored
    pub fn default_item(mut self, item: Value) -> Self {
        match item {
            Value::Object(map) => self.list.default_item = map,
            other => self.issues.push(format!(
                "list '{}': default item must be an object, got {}",
                self.field.name, other
            )),
        }
        self
    }

    pub fn display(mut self, display: DisplayMode) -> Self {
        self.list.display = display;
        self
    }

    /// Rule applied to the list value as a whole
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.field.rules.push(rule);
        self
    }

    /// Rule applied to each item object
    pub fn item_rule(mut self, rule: ValidationRule) -> Self {
        self.list.item_rules.push(rule);
        self
    }

    pub fn add_label(mut self, label: impl Into<String>) -> Self {
        self.list.actions.add_label = label.into();
        self
    }

    pub fn remove_label(mut self, label: impl Into<String>) -> Self {
        self.list.actions.remove_label = label.into();
        self
    }

    pub fn confirm_remove(mut self, prompt: impl Into<String>) -> Self {
        self.list.actions.confirm_remove = Some(prompt.into());
        self
    }

    pub fn no_add(mut self) -> Self {
        self.list.actions.can_add = false;
        self
    }

    pub fn no_remove(mut self) -> Self {
        self.list.actions.can_remove = false;
        self
    }

    pub fn no_reorder(mut self) -> Self {
        self.list.actions.can_reorder = false;
        self
    }

    pub fn actions_position(mut self, position: ActionPosition) -> Self {
        self.list.actions.position = position;
        self
    }

    pub fn depends_on(mut self, dependency: DependsOnConfig) -> Self {
        self.field.depends_on.push(dependency);
        self
    }

    /// Open a row describing the fields of each item
    pub fn item_row(self) -> RowBuilder<Self> {
        RowBuilder::new(self)
    }

    pub fn end(mut self) -> P {
        self.field.kind = FieldKind::List(self.list);
        self.parent.accept(self.field, self.issues);
        self.parent
    }
}

impl<P: Scope<FieldConfig>> Scope<RowConfig> for ListBuilder<P> {
    fn accept(&mut self, child: RowConfig, issues: Vec<String>) {
        self.list.item_rows.push(child);
        self.issues.extend(issues);
    }
}

impl<P: Scope<FieldConfig>> VisibilityExt for ListBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.field.visibility)
    }
}

// ─────────────────────────────────────────────────────────────────
// Actions
// ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ActionBuilder<P: Scope<ActionConfig>> {
    parent: P,
    config: ActionConfig,
}

impl<P: Scope<ActionConfig>> ActionBuilder<P> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Resolvable::literal(label.into());
        self
    }

    pub fn submit(mut self) -> Self {
        self.config.kind = ActionKind::Submit;
        self.config.validates = true;
        self
    }

    pub fn cancel(mut self) -> Self {
        self.config.kind = ActionKind::Cancel;
        self
    }

    pub fn reset(mut self) -> Self {
        self.config.kind = ActionKind::Reset;
        self
    }

    pub fn validates(mut self, validates: bool) -> Self {
        self.config.validates = validates;
        self
    }

    pub fn position(mut self, position: ActionPosition) -> Self {
        self.config.position = position;
        self
    }

    pub fn disabled_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> bool + Send + Sync + 'static,
    {
        self.config.disabled = Some(Resolvable::computed(f));
        self
    }

    pub fn end(mut self) -> P {
        self.parent.accept(self.config, Vec::new());
        self.parent
    }
}

impl<P: Scope<ActionConfig>> VisibilityExt for ActionBuilder<P> {
    fn visibility_mut(&mut self) -> &mut VisibilityConfig {
        visibility_slot(&mut self.config.visibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_field_form() -> FormBuilder {
        FormBuilder::new("person")
            .section("names")
            .row()
            .field("firstName")
            .required("First name is required")
            .end()
            .field("lastName")
            .required("Last name is required")
            .end()
            .end()
            .end()
    }

    #[test]
    fn test_build_produces_tree() {
        let form = two_field_form().build().unwrap();
        assert_eq!(form.id, "person");
        assert_eq!(form.field_names(), vec!["firstName", "lastName"]);
        assert!(form.field("firstName").unwrap().is_required());
    }

    #[test]
    fn test_double_build_is_rejected() {
        let mut builder = two_field_form();
        assert!(builder.build().is_ok());
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::BuilderState { .. }));
    }

    #[test]
    fn test_snapshot_unaffected_by_later_mutation() {
        let mut builder = two_field_form();
        let first = builder.build().unwrap();

        let _extended = builder
            .section("extra")
            .row()
            .field("nickname")
            .end()
            .end()
            .end();

        assert_eq!(first.field_names(), vec!["firstName", "lastName"]);
        assert!(first.field("nickname").is_none());
    }

    #[test]
    fn test_duplicate_field_in_row_is_rejected() {
        let err = FormBuilder::new("dup")
            .section("s")
            .row()
            .field("a")
            .end()
            .field("a")
            .end()
            .end()
            .end()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate field 'a'"));
    }

    #[test]
    fn test_same_name_in_different_rows_is_allowed() {
        let form = FormBuilder::new("rows")
            .section("s")
            .row()
            .field("a")
            .end()
            .end()
            .row()
            .field("a")
            .end()
            .end()
            .end()
            .build();
        assert!(form.is_ok());
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        let err = FormBuilder::new("p")
            .section("s")
            .row()
            .field("zip")
            .pattern("([", "bad")
            .end()
            .end()
            .end()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("field 'zip'"));
    }

    #[test]
    fn test_failed_build_does_not_poison_sibling_builders() {
        let broken = FormBuilder::new("broken")
            .section("s")
            .row()
            .field("")
            .end()
            .end()
            .end()
            .build();
        assert!(broken.is_err());
        assert!(two_field_form().build().is_ok());
    }

    #[test]
    fn test_list_min_above_max_is_rejected() {
        let err = FormBuilder::new("l")
            .section("s")
            .row()
            .list("items")
            .min(3)
            .max(1)
            .end()
            .end()
            .end()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("min 3 exceeds max 1"));
    }

    #[test]
    fn test_list_default_item_must_be_object() {
        let err = FormBuilder::new("l")
            .section("s")
            .row()
            .list("items")
            .default_item(json!(5))
            .end()
            .end()
            .end()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("default item must be an object"));
    }

    #[test]
    fn test_list_builder_collects_item_rows_and_policy() {
        let form = FormBuilder::new("l")
            .section("s")
            .row()
            .list("addresses")
            .min(1)
            .max(3)
            .display(DisplayMode::Tabs)
            .default_item(json!({"country": "NO"}))
            .confirm_remove("Remove this address?")
            .no_reorder()
            .item_row()
            .field("street")
            .required("Street is required")
            .end()
            .end()
            .end()
            .end()
            .end()
            .build()
            .unwrap();

        let list = form.field("addresses").unwrap().list_config().unwrap();
        assert_eq!(list.min, Some(1));
        assert_eq!(list.display, DisplayMode::Tabs);
        assert_eq!(list.default_item.get("country"), Some(&json!("NO")));
        assert!(!list.actions.can_reorder);
        assert!(list.item_field("street").is_some());
    }

    #[test]
    fn test_unknown_dependency_source_is_rejected() {
        let err = FormBuilder::new("d")
            .section("s")
            .row()
            .field("city")
            .depends_on(DependsOnConfig::on("country").clear())
            .end()
            .end()
            .end()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown field 'country'"));
    }

    #[test]
    fn test_duplicate_sections_and_actions_are_rejected() {
        let err = FormBuilder::new("d")
            .section("s")
            .end()
            .section("s")
            .end()
            .action("save")
            .end()
            .action("save")
            .end()
            .build()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("duplicate section id 's'"));
        assert!(message.contains("duplicate action 'save'"));
    }

    #[test]
    fn test_visibility_methods_on_every_scope() {
        let form = FormBuilder::new("v")
            .section("s")
            .visible_when(|ctx| ctx.is_mode("edit"))
            .row()
            .hide_by_access(true)
            .field("f")
            .hide_when(|_| false)
            .end()
            .end()
            .end()
            .action("a")
            .visible_by_access_when(|ctx| ctx.has_permission("admin"))
            .end()
            .build()
            .unwrap();

        let scope = form.field_scope("f").unwrap();
        assert!(scope.section.visibility.as_ref().unwrap().visible.is_some());
        assert!(scope.row.visibility.as_ref().unwrap().hide_by_access.is_some());
        assert!(scope.field.visibility.as_ref().unwrap().hide.is_some());
        assert!(form.action("a").unwrap().visibility.is_some());
    }
}
