//! Scoped access to one item of a list field
//!
//! While a [`ListItemContext`] is alive, predicates evaluated through the
//! context see the item as [`FormContext::current_item`]. The previous scope
//! is restored when it is dropped.

use serde_json::Value;

use formwork_core::prelude::*;

use crate::context::{FormContext, ItemScope};
use crate::list_ops::ItemErrors;
use crate::visibility::VisibilityResult;

pub struct ListItemContext<'a> {
    ctx: &'a mut FormContext,
    list: String,
    index: usize,
    previous: Option<Option<ItemScope>>,
}

impl ListItemContext<'_> {
    pub fn list_field_name(&self) -> &str {
        &self.list
    }

    pub fn list_item_index(&self) -> usize {
        self.index
    }

    pub fn item(&self) -> Value {
        self.ctx.current_item().unwrap_or(Value::Null)
    }

    pub fn item_value(&self, name: &str) -> Option<Value> {
        self.ctx.item_value(name)
    }

    /// Visibility of one of the item's fields
    pub fn evaluate_field_visibility(&self, name: &str) -> VisibilityResult {
        self.ctx.evaluate_field_visibility(name)
    }

    pub fn is_field_hidden(&self, name: &str) -> bool {
        self.ctx.is_field_hidden(name)
    }

    /// Errors stored for this item by the last validation
    pub fn item_errors(&self) -> ItemErrors {
        self.ctx
            .lists
            .get(&self.list)
            .and_then(|state| state.item_errors.get(&self.index).cloned())
            .unwrap_or_default()
    }

    pub fn context(&self) -> &FormContext {
        self.ctx
    }

    pub fn set_item_value(&mut self, name: &str, value: Value) -> Result<()> {
        let mut partial = Record::new();
        partial.insert(name.to_string(), value);
        self.update_current_item(Value::Object(partial))
    }

    /// Shallow-merge `partial` into the item
    pub fn update_current_item(&mut self, partial: Value) -> Result<()> {
        self.ctx.list(&self.list)?.update(self.index, partial)?;
        Ok(())
    }

    /// Remove the item this scope points at
    pub fn remove_current_item(mut self) -> Result<Option<Value>> {
        self.release();
        let list = std::mem::take(&mut self.list);
        self.ctx.list(&list)?.remove(self.index)
    }

    fn release(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.ctx.scope.replace(previous);
        }
    }
}

impl Drop for ListItemContext<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl FormContext {
    /// Scope evaluation to one item of a list field
    pub fn list_item(&mut self, list: &str, index: usize) -> Result<ListItemContext<'_>> {
        let count = self.list(list)?.count();
        if index >= count {
            return Err(Error::unknown_field(format!("{}[{}]", list, index)));
        }

        let previous = self.scope.replace(Some(ItemScope {
            list: list.to_string(),
            index,
        }));
        Ok(ListItemContext {
            ctx: self,
            list: list.to_string(),
            index,
            previous: Some(previous),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builder::VisibilityExt;
    use crate::schema::FormBuilder;
    use crate::test_support::{context_for, record};
    use serde_json::json;

    fn form() -> std::sync::Arc<crate::schema::FormConfig> {
        FormBuilder::new("customer")
            .section("s")
            .row()
            .list("addresses")
            .item_row()
            .field("kind")
            .end()
            .field("street")
            .required("Street is required")
            .hide_when(|ctx| ctx.item_value("kind") == Some(json!("po_box")))
            .end()
            .end()
            .end()
            .end()
            .end()
            .build()
            .unwrap()
    }

    fn entity() -> Record {
        record(json!({
            "addresses": [
                {"kind": "home", "street": "Main"},
                {"kind": "po_box", "street": ""}
            ]
        }))
    }

    #[test]
    fn test_item_scope_drives_item_predicates() {
        let mut ctx = context_for(form(), entity());

        let home = ctx.list_item("addresses", 0).unwrap();
        assert_eq!(home.list_field_name(), "addresses");
        assert_eq!(home.list_item_index(), 0);
        assert!(!home.is_field_hidden("street"));
        drop(home);

        let po_box = ctx.list_item("addresses", 1).unwrap();
        assert!(po_box.is_field_hidden("street"));
        assert_eq!(po_box.item_value("kind"), Some(json!("po_box")));
        drop(po_box);

        assert!(ctx.current_item().is_none());
    }

    #[test]
    fn test_hidden_item_field_skips_validation() {
        let mut ctx = context_for(form(), entity());
        assert!(ctx.validate());

        let mut item = ctx.list_item("addresses", 1).unwrap();
        item.set_item_value("kind", json!("home")).unwrap();
        drop(item);

        assert!(!ctx.validate());
        let item = ctx.list_item("addresses", 1).unwrap();
        assert_eq!(item.item_errors().messages(), vec!["Street is required"]);
    }

    #[test]
    fn test_update_and_remove_current_item() {
        let mut ctx = context_for(form(), entity());

        let mut item = ctx.list_item("addresses", 0).unwrap();
        item.update_current_item(json!({"street": "Second"})).unwrap();
        assert_eq!(item.item(), json!({"kind": "home", "street": "Second"}));

        let removed = item.remove_current_item().unwrap();
        assert_eq!(removed.unwrap()["street"], "Second");
        assert_eq!(ctx.list("addresses").unwrap().count(), 1);
        assert!(ctx.current_item().is_none());
    }

    #[test]
    fn test_out_of_range_item_is_an_error() {
        let mut ctx = context_for(form(), entity());
        assert!(matches!(
            ctx.list_item("addresses", 9),
            Err(Error::UnknownField { .. })
        ));
    }
}
