//! List operations engine
//!
//! Every mutation of an array-valued field goes through [`ListOperations`]:
//! indices are bounds-checked, new items are merged onto the list's default
//! item, per-item errors move with their items, and each mutating call
//! produces exactly one change notification on the owning context.

use std::collections::BTreeMap;

use formwork_core::prelude::*;
use formwork_core::shallow_merge;
use serde::Serialize;
use serde_json::Value;

use crate::context::FormContext;
use crate::schema::{DisplayMode, ListConfig};

/// Validation failures of one list item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemErrors {
    /// Failures of rules attached to the item as a whole
    pub item: Vec<String>,
    /// Failures of the item's own fields
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ItemErrors {
    pub fn is_empty(&self) -> bool {
        self.item.is_empty() && self.fields.values().all(Vec::is_empty)
    }

    /// Every message, item-level first
    pub fn messages(&self) -> Vec<String> {
        self.item
            .iter()
            .chain(self.fields.values().flatten())
            .cloned()
            .collect()
    }
}

/// Per-list runtime state kept by the context
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    /// Selected item in tab display mode
    pub active_index: usize,
    /// Errors from the last validation, keyed by item index
    pub item_errors: BTreeMap<usize, ItemErrors>,
}

impl ListState {
    /// Rebuild error keys after items moved; `None` drops the entry
    fn reindex(&mut self, map: impl Fn(usize) -> Option<usize>) {
        self.item_errors = std::mem::take(&mut self.item_errors)
            .into_iter()
            .filter_map(|(index, errors)| map(index).map(|to| (to, errors)))
            .collect();
    }
}

/// Operations on one list field of a context
pub struct ListOperations<'a> {
    ctx: &'a mut FormContext,
    field: String,
    config: ListConfig,
}

impl<'a> ListOperations<'a> {
    pub(crate) fn new(ctx: &'a mut FormContext, field: &str, config: ListConfig) -> Self {
        Self {
            ctx,
            field: field.to_string(),
            config,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    fn state(&mut self) -> &mut ListState {
        self.ctx.lists.entry(self.field.clone()).or_default()
    }

    fn items(&self) -> Vec<Value> {
        self.ctx.list_items(&self.field)
    }

    fn with_defaults(&self, item: Value) -> Value {
        match item {
            Value::Object(partial) => Value::Object(shallow_merge(&self.config.default_item, &partial)),
            Value::Null => Value::Object(self.config.default_item.clone()),
            other => other,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Add
    // ─────────────────────────────────────────────────────────────

    /// Append an item; returns its index, or `None` when the list is full
    pub fn add(&mut self, item: Value) -> Result<Option<usize>> {
        let end = self.count();
        self.add_at(end, item)
    }

    pub fn add_first(&mut self, item: Value) -> Result<Option<usize>> {
        self.add_at(0, item)
    }

    /// Insert at `index`, clamped to the end of the list
    pub fn add_at(&mut self, index: usize, item: Value) -> Result<Option<usize>> {
        self.ctx.ensure_active("add list item")?;

        let mut items = self.items();
        if self.ctx.settings().lists.enforce_max_on_add && self.config.is_full(items.len()) {
            debug!("List '{}' is full, ignoring add", self.field);
            return Ok(None);
        }

        let index = index.min(items.len());
        items.insert(index, self.with_defaults(item));

        let tabs = self.config.display == DisplayMode::Tabs;
        let state = self.state();
        state.reindex(|i| Some(if i >= index { i + 1 } else { i }));
        if tabs {
            state.active_index = index;
        }

        self.ctx.commit_list(&self.field, items, "add");
        Ok(Some(index))
    }

    // ─────────────────────────────────────────────────────────────
    // Remove
    // ─────────────────────────────────────────────────────────────

    /// Remove by index; out-of-range indices are a no-op
    ///
    /// Dropping below `min` is allowed and leaves the list invalid, unless
    /// `enforce_min_on_remove` is set, in which case the call is ignored.
    pub fn remove(&mut self, index: usize) -> Result<Option<Value>> {
        self.ctx.ensure_active("remove list item")?;

        let mut items = self.items();
        if index >= items.len() {
            debug!(
                "Remove of index {} ignored, list '{}' has {} item(s)",
                index,
                self.field,
                items.len()
            );
            return Ok(None);
        }
        if self.ctx.settings().lists.enforce_min_on_remove && self.config.is_at_min(items.len()) {
            debug!("List '{}' is at its minimum, ignoring remove", self.field);
            return Ok(None);
        }

        let removed = items.remove(index);
        let remaining = items.len();

        let state = self.state();
        state.reindex(|i| match i.cmp(&index) {
            std::cmp::Ordering::Less => Some(i),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(i - 1),
        });
        if state.active_index > index || state.active_index >= remaining {
            state.active_index = state.active_index.saturating_sub(1);
        }

        self.ctx.commit_list(&self.field, items, "remove");
        Ok(Some(removed))
    }

    /// Remove the first item equal to `item`
    pub fn remove_item(&mut self, item: &Value) -> Result<bool> {
        match self.find_index(|candidate| candidate == item) {
            Some(index) => Ok(self.remove(index)?.is_some()),
            None => Ok(false),
        }
    }

    pub fn remove_first(&mut self) -> Result<Option<Value>> {
        self.remove(0)
    }

    pub fn remove_last(&mut self) -> Result<Option<Value>> {
        match self.count() {
            0 => Ok(None),
            count => self.remove(count - 1),
        }
    }

    /// Remove every item; returns how many were removed
    pub fn remove_all(&mut self) -> Result<usize> {
        self.ctx.ensure_active("clear list")?;

        let count = self.count();
        if count == 0 {
            return Ok(0);
        }
        if self.ctx.settings().lists.enforce_min_on_remove && self.config.min.unwrap_or(0) > 0 {
            debug!("List '{}' has a minimum, ignoring remove_all", self.field);
            return Ok(0);
        }

        *self.state() = ListState::default();
        self.ctx.commit_list(&self.field, Vec::new(), "remove_all");
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────
    // Reorder
    // ─────────────────────────────────────────────────────────────

    /// Move one item to another position; false when either index is out of range
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<bool> {
        self.ctx.ensure_active("move list item")?;

        let mut items = self.items();
        if from >= items.len() || to >= items.len() {
            return Ok(false);
        }
        if from == to {
            return Ok(true);
        }

        let item = items.remove(from);
        items.insert(to, item);

        let state = self.state();
        let shift = move |i: usize| {
            if i == from {
                to
            } else if from < to && i > from && i <= to {
                i - 1
            } else if from > to && i >= to && i < from {
                i + 1
            } else {
                i
            }
        };
        state.reindex(|i| Some(shift(i)));
        state.active_index = shift(state.active_index);

        self.ctx.commit_list(&self.field, items, "move");
        Ok(true)
    }

    /// Exchange two items with a single notification
    pub fn swap(&mut self, a: usize, b: usize) -> Result<bool> {
        self.ctx.ensure_active("swap list items")?;

        let mut items = self.items();
        if a >= items.len() || b >= items.len() {
            return Ok(false);
        }
        if a == b {
            return Ok(true);
        }

        items.swap(a, b);
        let state = self.state();
        let exchange = move |i: usize| match i {
            i if i == a => b,
            i if i == b => a,
            i => i,
        };
        state.reindex(|i| Some(exchange(i)));
        state.active_index = exchange(state.active_index);

        self.ctx.commit_list(&self.field, items, "swap");
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items().get(index).cloned()
    }

    /// Replace an item; false when out of range
    ///
    /// Errors stored for the replaced item are dropped.
    pub fn set(&mut self, index: usize, item: Value) -> Result<bool> {
        self.ctx.ensure_active("set list item")?;

        let mut items = self.items();
        match items.get_mut(index) {
            Some(slot) => *slot = item,
            None => return Ok(false),
        }
        self.state().item_errors.remove(&index);
        self.ctx.commit_list(&self.field, items, "set");
        Ok(true)
    }

    /// Shallow-merge `partial` into an item; non-object values replace it
    pub fn update(&mut self, index: usize, partial: Value) -> Result<bool> {
        self.ctx.ensure_active("update list item")?;

        let mut items = self.items();
        let Some(slot) = items.get_mut(index) else {
            return Ok(false);
        };
        let current = std::mem::take(slot);
        *slot = match (current, partial) {
            (Value::Object(current), Value::Object(partial)) => {
                Value::Object(shallow_merge(&current, &partial))
            }
            (_, replacement) => replacement,
        };
        self.ctx.commit_list(&self.field, items, "update");
        Ok(true)
    }

    pub fn get_all(&self) -> Vec<Value> {
        self.items()
    }

    pub fn count(&self) -> usize {
        self.ctx
            .get_value(&self.field)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn find<P>(&self, predicate: P) -> Option<Value>
    where
        P: Fn(&Value) -> bool,
    {
        self.items().into_iter().find(|item| predicate(item))
    }

    pub fn find_index<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&Value) -> bool,
    {
        self.items().iter().position(|item| predicate(item))
    }

    // ─────────────────────────────────────────────────────────────
    // Tabs
    // ─────────────────────────────────────────────────────────────

    /// Selected item in tab display mode; `None` for an empty list
    pub fn active_index(&self) -> Option<usize> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let active = self
            .ctx
            .lists
            .get(&self.field)
            .map_or(0, |state| state.active_index);
        Some(active.min(count - 1))
    }

    pub fn set_active_index(&mut self, index: usize) -> Result<bool> {
        self.ctx.ensure_active("select list item")?;
        if index >= self.count() {
            return Ok(false);
        }
        if self.state().active_index != index {
            self.state().active_index = index;
            self.ctx.list_state_changed(&self.field, "activate");
        }
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────

    /// Count-bound errors for the current number of items
    pub fn list_errors(&self) -> Vec<String> {
        self.config.bound_errors(self.count())
    }

    /// Errors stored for an item by the last validation
    pub fn item_errors(&self, index: usize) -> ItemErrors {
        self.ctx
            .lists
            .get(&self.field)
            .and_then(|state| state.item_errors.get(&index).cloned())
            .unwrap_or_default()
    }

    pub fn is_item_valid(&self, index: usize) -> bool {
        match self.get(index) {
            Some(item) => self
                .ctx
                .compute_one_item(&self.field, &self.config, index, &item, None)
                .is_empty(),
            None => false,
        }
    }

    /// Bounds and every item, against the current values
    pub fn is_valid(&self) -> bool {
        self.list_errors().is_empty() && (0..self.count()).all(|index| self.is_item_valid(index))
    }

    /// Validate the list and store per-item errors
    pub fn validate(&mut self) -> bool {
        self.ctx.validate_field(&self.field)
            && self
                .ctx
                .lists
                .get(&self.field)
                .map_or(true, |state| state.item_errors.is_empty())
    }

    // ─────────────────────────────────────────────────────────────
    // Action policy
    // ─────────────────────────────────────────────────────────────

    pub fn can_add(&self) -> bool {
        self.config.actions.can_add && !self.config.is_full(self.count())
    }

    pub fn can_remove(&self) -> bool {
        let count = self.count();
        self.config.actions.can_remove && count > 0 && !self.config.is_at_min(count)
    }

    pub fn can_reorder(&self) -> bool {
        self.config.actions.can_reorder && self.count() > 1
    }
}
