//! Shared fixtures for unit tests

use std::sync::Arc;

use formwork_core::Record;
use serde_json::Value;

use crate::context::FormContext;
use crate::registry::Registries;
use crate::schema::{FormBuilder, FormConfig};

/// Context over an empty form in "edit" mode
pub fn empty_context() -> FormContext {
    let form = FormBuilder::new("empty")
        .build()
        .expect("empty form builds");
    context_for(form, Record::new())
}

pub fn context_for(form: Arc<FormConfig>, entity: Record) -> FormContext {
    FormContext::new(form, entity, "edit", Arc::new(Registries::new()))
}

/// Unwrap a `json!` object literal into a [`Record`]
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("expected a JSON object, got {}", other),
    }
}
