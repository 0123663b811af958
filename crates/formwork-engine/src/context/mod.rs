//! Runtime context objects
//!
//! A [`FormContext`] binds one built [`FormConfig`] to one entity instance
//! and one mode. It is the only way to read or mutate that entity: value
//! writes, dirty/touched tracking, validation, visibility queries, list
//! operations and dependency resolution all go through it.
//!
//! Asynchronous work (debounced dependencies, option reloads) is spawned on
//! the ambient tokio runtime and reports back as [`EngineMessage`]s, which
//! the host drains with [`FormContext::process_messages`] or awaits with
//! [`FormContext::settle`].

pub mod dialog;
pub mod item;
pub mod page;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use formwork_core::prelude::*;
use formwork_core::{is_truthy, value::display};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::api::{ApiClient, ApiRequest};
use crate::config::EngineSettings;
use crate::dependency::{Debouncer, Dependent, DependencyGraph, ReloadGuard, ValueAction};
use crate::list_ops::{ItemErrors, ListOperations, ListState};
use crate::message::{ChangeEvent, EngineMessage};
use crate::registry::Registries;
use crate::resolve::Resolvable;
use crate::schema::{FieldConfig, FormConfig, ListConfig};
use crate::validation::{run_sync_rules, RuleCheck};
use crate::visibility::{evaluate_chain, HiddenBy, VisibilityResult, VisibilityTracker};

pub use dialog::{Dialog, DialogContext, DialogOptions, DialogOutcome};
pub use item::ListItemContext;
pub use page::{ActionOutcome, PageConfig, PageContext};

/// Dependency cascades deeper than this are cut and reported
pub const MAX_CASCADE_DEPTH: usize = 8;

const EVENT_CAPACITY: usize = 256;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Active,
    Destroyed,
}

/// A runtime failure captured instead of propagated
#[derive(Debug)]
pub struct ReportedError {
    /// Field the failure relates to, if any
    pub field: Option<String>,
    pub error: Error,
}

/// The list item a scoped evaluation is running against
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemScope {
    pub list: String,
    pub index: usize,
}

/// Runtime facade over one form and one entity
pub struct FormContext {
    form: Arc<FormConfig>,
    mode: String,
    registries: Arc<Registries>,
    settings: EngineSettings,
    permissions: BTreeSet<String>,

    values: Record,
    initial: Record,
    touched: BTreeSet<String>,
    errors: BTreeMap<String, Vec<String>>,
    options: HashMap<String, Value>,
    validating: HashSet<String>,
    pub(crate) lists: HashMap<String, ListState>,
    reported: Vec<ReportedError>,

    dependencies: DependencyGraph,
    debouncer: Debouncer,
    reloads: ReloadGuard,
    visibility: VisibilityTracker,
    api: Option<Arc<dyn ApiClient>>,

    tx: mpsc::UnboundedSender<EngineMessage>,
    rx: mpsc::UnboundedReceiver<EngineMessage>,
    events: broadcast::Sender<ChangeEvent>,
    data_version: u64,
    state: ContextState,

    pub(crate) scope: RefCell<Option<ItemScope>>,
    pub(crate) dialogs: Vec<Dialog>,
    next_dialog_id: u64,
    cascade_depth: usize,
}

impl std::fmt::Debug for FormContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormContext")
            .field("form", &self.form.id)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("data_version", &self.data_version)
            .field("values", &self.values)
            .field("errors", &self.errors)
            .field("has_api_client", &self.api.is_some())
            .field("open_dialogs", &self.dialogs.len())
            .finish()
    }
}

impl FormContext {
    /// Bind a form to an entity
    ///
    /// Field defaults fill keys the entity lacks; the result becomes the
    /// initial snapshot used for dirty tracking and `reset_form`.
    pub fn new(
        form: Arc<FormConfig>,
        entity: Record,
        mode: impl Into<String>,
        registries: Arc<Registries>,
    ) -> Self {
        let mut values = entity;
        for scope in form.field_scopes() {
            if let Some(default) = &scope.field.default_value {
                if !values.contains_key(&scope.field.name) {
                    values.insert(scope.field.name.clone(), default.clone());
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let dependencies = DependencyGraph::from_form(&form);

        let mut ctx = Self {
            initial: values.clone(),
            values,
            mode: mode.into(),
            registries,
            settings: EngineSettings::default(),
            permissions: BTreeSet::new(),
            touched: BTreeSet::new(),
            errors: BTreeMap::new(),
            options: HashMap::new(),
            validating: HashSet::new(),
            lists: HashMap::new(),
            reported: Vec::new(),
            dependencies,
            debouncer: Debouncer::new(),
            reloads: ReloadGuard::new(),
            visibility: VisibilityTracker::new(),
            api: None,
            tx,
            rx,
            events,
            data_version: 0,
            state: ContextState::Active,
            scope: RefCell::new(None),
            dialogs: Vec::new(),
            next_dialog_id: 0,
            cascade_depth: 0,
            form,
        };
        ctx.prime_visibility();

        debug!(
            "Context created for form '{}' in mode '{}' ({} dependencies)",
            ctx.form.id,
            ctx.mode,
            ctx.dependencies.len()
        );
        ctx
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_api_client(mut self, client: Arc<dyn ApiClient>) -> Self {
        self.api = Some(client);
        self
    }

    /// Permissions consulted by access-axis predicates
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self.prime_visibility();
        self
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn form(&self) -> &Arc<FormConfig> {
        &self.form
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn is_mode(&self, mode: &str) -> bool {
        self.mode == mode
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == ContextState::Destroyed
    }

    /// Incremented on every committed mutation
    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    /// Receive a [`ChangeEvent`] for every committed mutation
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────
    // Values
    // ─────────────────────────────────────────────────────────────

    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Owned value of a field; `Null` when absent
    pub fn value(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Commit one value and run everything that reacts to it
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.set_values([(name, value)])
    }

    /// Commit several values as one batch
    ///
    /// Each dependent fires at most once for the whole batch, after every
    /// value in the batch has been committed.
    pub fn set_values<I, K>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.ensure_active("set values")?;

        let mut changed = Vec::new();
        for (name, value) in entries {
            let name = name.into();
            if self.commit(&name, value) {
                changed.push(name);
            }
        }
        if changed.is_empty() {
            return Ok(());
        }

        for name in &changed {
            self.revalidate_if_needed(name);
        }
        self.resolve_dependents(&changed);
        self.sweep_hidden();
        Ok(())
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.values.get(name).unwrap_or(&Value::Null) != self.initial.get(name).unwrap_or(&Value::Null)
    }

    pub fn is_form_dirty(&self) -> bool {
        !self.dirty_fields().is_empty()
    }

    pub fn dirty_fields(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.values.keys().chain(self.initial.keys()).collect();
        names
            .into_iter()
            .filter(|name| self.is_dirty(name))
            .cloned()
            .collect()
    }

    /// Mark a field as touched and validate it
    pub fn touch(&mut self, name: &str) -> Result<()> {
        self.ensure_active("touch field")?;
        if self.touched.insert(name.to_string()) {
            self.notify(ChangeEvent::Touched {
                field: name.to_string(),
            });
        }
        self.validate_field(name);
        Ok(())
    }

    pub fn is_touched(&self, name: &str) -> bool {
        self.touched.contains(name)
    }

    /// Restore the initial snapshot and forget touched state and errors
    pub fn reset_form(&mut self) -> Result<()> {
        self.ensure_active("reset form")?;
        self.debouncer.cancel_all();
        self.values = self.initial.clone();
        self.touched.clear();
        self.errors.clear();
        for state in self.lists.values_mut() {
            *state = ListState::default();
        }
        self.prime_visibility();
        self.data_version += 1;
        self.notify(ChangeEvent::FormReset);
        info!("Form '{}' reset to its initial values", self.form.id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────

    /// Validate every visible field; errors become queryable per field
    pub fn validate(&mut self) -> bool {
        self.run_validation(None)
    }

    /// Validate with `skip_on` / `validate_on` filters for an action
    pub fn validate_for_action(&mut self, action: &str) -> bool {
        self.run_validation(Some(action))
    }

    /// Validate a single field and store its errors
    pub fn validate_field(&mut self, name: &str) -> bool {
        if self.is_destroyed() {
            return self.is_field_valid(name);
        }
        let form = Arc::clone(&self.form);
        let Some(scope) = form.field_scope(name) else {
            return true;
        };

        let messages = if evaluate_chain(scope.visibility_chain(), self).should_skip_validation {
            Vec::new()
        } else {
            self.compute_field_errors(scope.field, None)
        };
        if let Some(list) = scope.field.list_config() {
            let item_errors = self.compute_item_errors(scope.field, list, None);
            self.lists.entry(name.to_string()).or_default().item_errors = item_errors;
        }

        let valid = messages.is_empty();
        self.store_field_errors(name, messages);
        valid
    }

    /// Run sync validation, then await every applicable async rule
    pub async fn validate_async(&mut self) -> bool {
        let mut valid = self.validate();
        if self.is_destroyed() {
            return valid;
        }

        let form = Arc::clone(&self.form);
        let mut checks = Vec::new();
        for scope in form.field_scopes() {
            if evaluate_chain(scope.visibility_chain(), self).should_skip_validation {
                continue;
            }
            let value = self.value(&scope.field.name);
            for rule in scope.field.rules.iter().filter(|rule| rule.applies_to(None)) {
                if let RuleCheck::Async(check) = &rule.check {
                    let name = scope.field.name.clone();
                    let message = rule.message.clone();
                    let pending = check(value.clone());
                    self.validating.insert(name.clone());
                    checks.push(async move { (name, message, pending.await) });
                }
            }
        }
        if checks.is_empty() {
            return valid;
        }

        debug!("Awaiting {} async validation rule(s)", checks.len());
        for (name, message, passed) in join_all(checks).await {
            self.validating.remove(&name);
            if !passed {
                valid = false;
                self.errors.entry(name).or_default().push(message);
            }
        }
        self.notify(ChangeEvent::ValidationChanged);
        valid
    }

    /// Whole-form validity, evaluated against the current values
    pub fn is_valid(&self) -> bool {
        let form = Arc::clone(&self.form);
        form.field_scopes().into_iter().all(|scope| {
            if evaluate_chain(scope.visibility_chain(), self).should_skip_validation {
                return true;
            }
            let items_valid = scope.field.list_config().map_or(true, |list| {
                self.compute_item_errors(scope.field, list, None).is_empty()
            });
            items_valid && self.compute_field_errors(scope.field, None).is_empty()
        })
    }

    pub fn is_field_valid(&self, name: &str) -> bool {
        let form = Arc::clone(&self.form);
        let Some(scope) = form.field_scope(name) else {
            return true;
        };
        evaluate_chain(scope.visibility_chain(), self).should_skip_validation
            || self.compute_field_errors(scope.field, None).is_empty()
    }

    /// Errors stored by the last validation of a field
    pub fn field_errors(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    fn run_validation(&mut self, action: Option<&str>) -> bool {
        if self.is_destroyed() {
            return self.is_valid();
        }

        let form = Arc::clone(&self.form);
        let mut errors = BTreeMap::new();
        let mut items_valid = true;

        for scope in form.field_scopes() {
            let field = scope.field;
            let skip = evaluate_chain(scope.visibility_chain(), self).should_skip_validation;

            if !skip {
                let messages = self.compute_field_errors(field, action);
                if !messages.is_empty() {
                    errors.insert(field.name.clone(), messages);
                }
            }

            if let Some(list) = field.list_config() {
                let item_errors = if skip {
                    BTreeMap::new()
                } else {
                    self.compute_item_errors(field, list, action)
                };
                items_valid &= item_errors.is_empty();
                self.lists.entry(field.name.clone()).or_default().item_errors = item_errors;
            }
        }

        let valid = errors.is_empty() && items_valid;
        if errors != self.errors {
            self.errors = errors;
            self.notify(ChangeEvent::ValidationChanged);
        }
        debug!(
            "Validated form '{}' (action: {:?}): {}",
            self.form.id,
            action,
            if valid { "valid" } else { "invalid" }
        );
        valid
    }

    fn compute_field_errors(&self, field: &FieldConfig, action: Option<&str>) -> Vec<String> {
        let value = self.value(&field.name);
        let mut messages = run_sync_rules(&field.rules, &value, self, action);
        if let Some(list) = field.list_config() {
            let count = value.as_array().map_or(0, Vec::len);
            messages.extend(list.bound_errors(count));
        }
        messages
    }

    pub(crate) fn compute_item_errors(
        &self,
        field: &FieldConfig,
        list: &ListConfig,
        action: Option<&str>,
    ) -> BTreeMap<usize, ItemErrors> {
        let items = match self.values.get(&field.name) {
            Some(Value::Array(items)) => items.clone(),
            _ => return BTreeMap::new(),
        };

        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let errors = self.compute_one_item(&field.name, list, index, item, action);
                (!errors.is_empty()).then_some((index, errors))
            })
            .collect()
    }

    pub(crate) fn compute_one_item(
        &self,
        list_name: &str,
        list: &ListConfig,
        index: usize,
        item: &Value,
        action: Option<&str>,
    ) -> ItemErrors {
        self.with_item_scope(list_name, index, |ctx| {
            let mut errors = ItemErrors {
                item: run_sync_rules(&list.item_rules, item, ctx, action),
                ..Default::default()
            };
            for (row, field) in list.item_fields() {
                let visibility = evaluate_chain(
                    [row.visibility.as_ref(), field.visibility.as_ref()],
                    ctx,
                );
                if visibility.should_skip_validation {
                    continue;
                }
                let value = item.get(&field.name).cloned().unwrap_or(Value::Null);
                let messages = run_sync_rules(&field.rules, &value, ctx, action);
                if !messages.is_empty() {
                    errors.fields.insert(field.name.clone(), messages);
                }
            }
            errors
        })
    }

    fn store_field_errors(&mut self, name: &str, messages: Vec<String>) {
        let previous = if messages.is_empty() {
            self.errors.remove(name)
        } else {
            self.errors.insert(name.to_string(), messages.clone())
        };
        let changed = match previous {
            Some(previous) => previous != messages,
            None => !messages.is_empty(),
        };
        if changed {
            self.notify(ChangeEvent::ValidationChanged);
        }
    }

    fn revalidate_if_needed(&mut self, name: &str) {
        if self.settings.behavior.validate_on_change || self.errors.contains_key(name) {
            self.validate_field(name);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Visibility and field state
    // ─────────────────────────────────────────────────────────────

    /// Visibility of a field, including every enclosing container
    ///
    /// Inside a list item scope, names of the item's own fields resolve
    /// against the item layout first.
    pub fn evaluate_field_visibility(&self, name: &str) -> VisibilityResult {
        let form = Arc::clone(&self.form);

        let item_scope = self.scope.borrow().clone();
        if let Some(item_scope) = item_scope {
            if let Some(list_scope) = form.field_scope(&item_scope.list) {
                if let Some((row, field)) = list_scope
                    .field
                    .list_config()
                    .and_then(|list| list.item_field(name))
                {
                    let chain = list_scope
                        .visibility_chain()
                        .into_iter()
                        .chain([row.visibility.as_ref(), field.visibility.as_ref()]);
                    return evaluate_chain(chain, self);
                }
            }
        }

        match form.field_scope(name) {
            Some(scope) => evaluate_chain(scope.visibility_chain(), self),
            None => VisibilityResult::VISIBLE,
        }
    }

    pub fn is_field_hidden(&self, name: &str) -> bool {
        !self.evaluate_field_visibility(name).is_visible
    }

    /// Whether a field is hidden by the data-driven (clearing) axis
    pub fn hide_field_by_condition(&self, name: &str) -> bool {
        self.evaluate_field_visibility(name).hidden_by == Some(HiddenBy::Conditional)
    }

    /// Whether a field is hidden by the permission (data-preserving) axis
    pub fn hide_field_by_access(&self, name: &str) -> bool {
        self.evaluate_field_visibility(name).hidden_by == Some(HiddenBy::Access)
    }

    pub fn evaluate_section_visibility(&self, id: &str) -> VisibilityResult {
        let form = Arc::clone(&self.form);
        match form.section_scope(id) {
            Some(scope) => evaluate_chain(scope.visibility_chain(), self),
            None => VisibilityResult::VISIBLE,
        }
    }

    pub fn is_section_hidden(&self, id: &str) -> bool {
        !self.evaluate_section_visibility(id).is_visible
    }

    pub fn hide_section_by_condition(&self, id: &str) -> bool {
        self.evaluate_section_visibility(id).hidden_by == Some(HiddenBy::Conditional)
    }

    pub fn hide_section_by_access(&self, id: &str) -> bool {
        self.evaluate_section_visibility(id).hidden_by == Some(HiddenBy::Access)
    }

    pub fn is_field_disabled(&self, name: &str) -> bool {
        self.resolve_flag(name, |field| field.disabled.as_ref())
    }

    /// Read-only when the field says so or the context is in "view" mode
    pub fn is_field_read_only(&self, name: &str) -> bool {
        self.is_mode("view") || self.resolve_flag(name, |field| field.read_only.as_ref())
    }

    pub fn field_label(&self, name: &str) -> Option<String> {
        let form = Arc::clone(&self.form);
        form.field(name).map(|field| field.label.resolve(self))
    }

    pub fn field_props(&self, name: &str) -> Record {
        let form = Arc::clone(&self.form);
        form.field(name)
            .map(|field| field.props.resolve(self))
            .unwrap_or_default()
    }

    /// Options delivered by the latest reload of a field
    pub fn field_options(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    fn resolve_flag<F>(&self, name: &str, select: F) -> bool
    where
        F: Fn(&FieldConfig) -> Option<&Resolvable<bool>>,
    {
        let form = Arc::clone(&self.form);
        form.field(name)
            .and_then(|field| select(field).map(|flag| flag.resolve(self)))
            .unwrap_or(false)
    }

    fn visibility_snapshot(&self) -> Vec<(String, VisibilityResult)> {
        let form = Arc::clone(&self.form);
        form.field_scopes()
            .into_iter()
            .map(|scope| {
                (
                    scope.field.name.clone(),
                    evaluate_chain(scope.visibility_chain(), self),
                )
            })
            .collect()
    }

    fn prime_visibility(&mut self) {
        let snapshot = self.visibility_snapshot();
        self.visibility.prime(snapshot);
    }

    /// Clear fields that just became conditionally hidden
    fn sweep_hidden(&mut self) {
        for _ in 0..MAX_CASCADE_DEPTH {
            let snapshot = self.visibility_snapshot();
            let newly_hidden = self.visibility.transitions(snapshot);
            if newly_hidden.is_empty() || !self.settings.behavior.clear_hidden_data {
                return;
            }

            let mut cleared = Vec::new();
            for name in newly_hidden {
                self.errors.remove(&name);
                let has_data = self.values.get(&name).map_or(false, |v| !v.is_null());
                if has_data {
                    self.values.insert(name.clone(), Value::Null);
                    cleared.push(name);
                }
            }
            if cleared.is_empty() {
                return;
            }

            debug!("Cleared hidden fields: {:?}", cleared);
            self.data_version += 1;
            self.notify(ChangeEvent::FieldsCleared {
                fields: cleared.clone(),
            });
            self.resolve_dependents(&cleared);
        }
        warn!(
            "Hidden-field sweep for form '{}' did not settle after {} passes",
            self.form.id, MAX_CASCADE_DEPTH
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Lists, items and dialogs
    // ─────────────────────────────────────────────────────────────

    /// Operations on an array-valued field
    pub fn list(&mut self, name: &str) -> Result<ListOperations<'_>> {
        let form = Arc::clone(&self.form);
        let field = form.field(name).ok_or_else(|| Error::unknown_field(name))?;
        let config = field
            .list_config()
            .cloned()
            .ok_or_else(|| Error::not_a_list(name))?;
        self.lists.entry(name.to_string()).or_default();
        Ok(ListOperations::new(self, name, config))
    }

    /// Current items of a list field
    pub(crate) fn list_items(&self, name: &str) -> Vec<Value> {
        match self.values.get(name) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Commit a list mutation with exactly one change notification
    pub(crate) fn commit_list(&mut self, name: &str, items: Vec<Value>, operation: &str) {
        self.values.insert(name.to_string(), Value::Array(items));
        self.data_version += 1;
        self.notify(ChangeEvent::ListChanged {
            field: name.to_string(),
            operation: operation.to_string(),
        });
        self.revalidate_if_needed(name);
        self.resolve_dependents(&[name.to_string()]);
        self.sweep_hidden();
    }

    pub(crate) fn list_state_changed(&mut self, name: &str, operation: &str) {
        self.data_version += 1;
        self.notify(ChangeEvent::ListChanged {
            field: name.to_string(),
            operation: operation.to_string(),
        });
    }

    /// Run `f` with a list item as the current scope
    pub(crate) fn with_item_scope<R>(
        &self,
        list: &str,
        index: usize,
        f: impl FnOnce(&Self) -> R,
    ) -> R {
        let previous = self.scope.replace(Some(ItemScope {
            list: list.to_string(),
            index,
        }));
        let result = f(self);
        self.scope.replace(previous);
        result
    }

    /// The list item the current evaluation is scoped to
    pub fn current_item(&self) -> Option<Value> {
        let scope = self.scope.borrow();
        let scope = scope.as_ref()?;
        match self.values.get(&scope.list) {
            Some(Value::Array(items)) => items.get(scope.index).cloned(),
            _ => None,
        }
    }

    /// A value of the current list item
    pub fn item_value(&self, name: &str) -> Option<Value> {
        self.current_item()
            .and_then(|item| item.get(name).cloned())
    }

    // ─────────────────────────────────────────────────────────────
    // Asynchronous work
    // ─────────────────────────────────────────────────────────────

    /// Whether async work (debounce, reload, async rule) targets a field
    pub fn is_pending(&self, name: &str) -> bool {
        self.validating.contains(name)
            || self.reloads.is_in_flight(name)
            || (0..self.dependencies.len()).any(|id| {
                self.debouncer.is_pending(id)
                    && self
                        .dependencies
                        .get(id)
                        .map_or(false, |dependent| dependent.target == name)
            })
    }

    /// No debounce timer or reload is outstanding
    pub fn is_idle(&self) -> bool {
        self.debouncer.is_idle() && self.reloads.is_idle()
    }

    /// Apply every settled async result without waiting
    pub fn process_messages(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
            processed += 1;
        }
        processed
    }

    /// Wait until every outstanding debounce and reload has been applied
    pub async fn settle(&mut self) {
        loop {
            self.process_messages();
            if self.is_idle() || self.is_destroyed() {
                return;
            }
            match self.rx.recv().await {
                Some(message) => self.handle_message(message),
                None => return,
            }
        }
    }

    fn handle_message(&mut self, message: EngineMessage) {
        if self.is_destroyed() {
            trace!("Dropping {:?} for destroyed context", message);
            return;
        }

        match message {
            EngineMessage::DebounceElapsed {
                dependent_id,
                source,
                value,
                generation,
            } => {
                if !self.debouncer.complete(dependent_id, &source, generation) {
                    trace!("Ignoring superseded debounce for dependent {}", dependent_id);
                    return;
                }
                let Some(dependent) = self.dependencies.get(dependent_id).cloned() else {
                    return;
                };
                debug!(
                    "Debounce elapsed: '{}' -> '{}' with {}",
                    source,
                    dependent.target,
                    display(&value)
                );
                self.resolve_dependent(&dependent, &value);
                self.sweep_hidden();
            }
            EngineMessage::ReloadSettled {
                target,
                request_id,
                result,
            } => {
                if !self.reloads.settle(&target, request_id) {
                    warn!("Discarding stale reload #{} for '{}'", request_id, target);
                    return;
                }
                match result {
                    Ok(options) => {
                        debug!("Reloaded options for '{}'", target);
                        self.options.insert(target.clone(), options);
                        self.data_version += 1;
                        self.notify(ChangeEvent::OptionsReloaded { field: target });
                    }
                    Err(e) => {
                        let error = Error::dependency(&target, e.to_string());
                        self.report(Some(&target), error);
                    }
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Dependency resolution
    // ─────────────────────────────────────────────────────────────

    /// Each target resolves at most once per batch, through the first of
    /// its dependencies that is not skipped
    fn resolve_dependents(&mut self, changed: &[String]) {
        let mut fired: HashSet<String> = HashSet::new();
        for source in changed {
            let value = self.value(source);
            for dependent in self.dependencies.dependents_of(source) {
                if fired.contains(&dependent.target) {
                    trace!(
                        "'{}' already resolved in this batch, skipping '{}'",
                        dependent.target,
                        source
                    );
                    continue;
                }
                if self.trigger(&dependent, source, value.clone()) {
                    fired.insert(dependent.target.clone());
                }
            }
        }
    }

    /// Returns false when the dependency was skipped
    fn trigger(&mut self, dependent: &Dependent, source: &str, value: Value) -> bool {
        let config = &dependent.config;
        if config.only_if_truthy && !is_truthy(&value) {
            trace!(
                "Skipping '{}' <- '{}': source value is falsy",
                dependent.target,
                source
            );
            return false;
        }

        let delay = match config.debounce_ms {
            Some(ms) => (ms > 0).then(|| Duration::from_millis(ms)),
            None => self.settings.dependencies.default_debounce(),
        };

        match delay {
            Some(delay) => {
                let scheduled =
                    self.debouncer
                        .schedule(dependent, source, value, delay, self.tx.clone());
                if let Err(e) = scheduled {
                    self.report(Some(&dependent.target), e);
                }
            }
            None => self.resolve_dependent(dependent, &value),
        }
        true
    }

    /// Value action, then reload, then handler
    fn resolve_dependent(&mut self, dependent: &Dependent, source_value: &Value) {
        let target = dependent.target.clone();
        if self.cascade_depth >= MAX_CASCADE_DEPTH {
            let error = Error::dependency(
                &target,
                format!("cascade deeper than {} levels", MAX_CASCADE_DEPTH),
            );
            self.report(Some(&target), error);
            return;
        }
        self.cascade_depth += 1;

        let config = Arc::clone(&dependent.config);
        let changed = match config.value_action {
            ValueAction::Keep => false,
            ValueAction::Clear => self.commit(&target, Value::Null),
            ValueAction::Reset => {
                let original = self.original_value(&target);
                self.commit(&target, original)
            }
        };

        if let Some(api) = &config.reload_api {
            self.start_reload(&target, api, config.reload_params.as_ref());
        }

        if let Some(handler) = &config.handler {
            if let Err(e) = handler(source_value, self) {
                let error = match e {
                    Error::DependencyResolution { .. } => e,
                    other => Error::dependency(&target, other.to_string()),
                };
                self.report(Some(&target), error);
            }
        }

        if changed {
            self.revalidate_if_needed(&target);
            self.resolve_dependents(&[target]);
        }
        self.cascade_depth -= 1;
    }

    fn start_reload(&mut self, target: &str, api: &str, params: Option<&Resolvable<Record>>) {
        let Some(client) = self.api.clone() else {
            let error = Error::dependency(target, format!("no API client for '{}'", api));
            self.report(Some(target), error);
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            let error = Error::no_async_runtime(format!("reload of '{}'", target));
            self.report(Some(target), error);
            return;
        };

        let request = ApiRequest {
            api: api.to_string(),
            params: params.map(|params| params.resolve(self)).unwrap_or_default(),
            target: target.to_string(),
        };
        let request_id = self.reloads.begin(target);
        debug!("Reload #{} for '{}' via '{}'", request_id, target, api);

        let pending = client.invoke(request);
        let tx = self.tx.clone();
        let target = target.to_string();
        handle.spawn(async move {
            let result = pending.await;
            let _ = tx.send(EngineMessage::ReloadSettled {
                target,
                request_id,
                result,
            });
        });
    }

    /// Initial entity value, else the configured default, else null
    fn original_value(&self, name: &str) -> Value {
        if let Some(value) = self.initial.get(name) {
            return value.clone();
        }
        self.form
            .field(name)
            .and_then(|field| field.default_value.clone())
            .unwrap_or(Value::Null)
    }

    // ─────────────────────────────────────────────────────────────
    // Errors, notifications, lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Failures captured from dependency side effects
    pub fn reported_errors(&self) -> &[ReportedError] {
        &self.reported
    }

    pub fn take_reported_errors(&mut self) -> Vec<ReportedError> {
        std::mem::take(&mut self.reported)
    }

    pub(crate) fn report(&mut self, field: Option<&str>, error: Error) {
        warn!("Reported error on {:?}: {}", field, error);
        self.reported.push(ReportedError {
            field: field.map(str::to_string),
            error,
        });
    }

    pub(crate) fn notify(&self, event: ChangeEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::context_destroyed(operation));
        }
        Ok(())
    }

    /// Store a value; false when it was already equal
    fn commit(&mut self, name: &str, value: Value) -> bool {
        if self.values.get(name).unwrap_or(&Value::Null) == &value {
            return false;
        }
        trace!("Commit '{}' = {}", name, display(&value));
        self.values.insert(name.to_string(), value);
        self.data_version += 1;
        self.notify(ChangeEvent::ValueChanged {
            field: name.to_string(),
        });
        true
    }

    pub(crate) fn next_dialog_id(&mut self) -> u64 {
        self.next_dialog_id += 1;
        self.next_dialog_id
    }

    /// Tear the context down; later mutations fail with `ContextDestroyed`
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.debouncer.cancel_all();
        self.dialogs.clear();
        self.state = ContextState::Destroyed;
        self.notify(ChangeEvent::Destroyed);
        debug!("Context for form '{}' destroyed", self.form.id);
    }
}
