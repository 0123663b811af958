//! Inspection runner - evaluate one page and report it
//!
//! Opens the page against the entity, applies `--set` overrides as a single
//! batch, waits for dependency side effects to settle, validates, optionally
//! triggers an action and writes every step as a [`ReportEvent`].

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;

use formwork_core::prelude::*;
use formwork_engine::{ApiClient, EngineSettings, PageContext, Registries};

use super::ReportEvent;

/// What to inspect
#[derive(Debug, Clone)]
pub struct InspectRequest {
    pub page: String,
    pub entity: Record,
    pub mode: String,
    pub permissions: Vec<String>,
    /// `field=json` overrides, committed in order as one batch
    pub sets: Vec<(String, Value)>,
    pub action: Option<String>,
    pub settings: EngineSettings,
}

impl InspectRequest {
    pub fn new(page: impl Into<String>, entity: Record) -> Self {
        Self {
            page: page.into(),
            entity,
            mode: "edit".to_string(),
            permissions: Vec::new(),
            sets: Vec::new(),
            action: None,
            settings: EngineSettings::default(),
        }
    }
}

/// Parse a `field=json` override; a value that is not valid JSON is taken as a string
pub fn parse_set(raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::config(format!("expected field=value, got '{}'", raw)))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(Error::config(format!("missing field name in '{}'", raw)));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

/// Run one inspection and write the report to `out`
pub async fn run_inspect<W: Write>(
    registries: Arc<Registries>,
    client: Option<Arc<dyn ApiClient>>,
    request: InspectRequest,
    out: &mut W,
) -> Result<()> {
    info!("Inspecting page '{}' in mode '{}'", request.page, request.mode);

    let settings = request.settings.clone();
    let permissions = request.permissions.clone();
    let mut page = PageContext::open(registries, &request.page, request.entity, &request.mode)?
        .map_form(|form| {
            let form = form.with_settings(settings).with_permissions(permissions);
            match client {
                Some(client) => form.with_api_client(client),
                None => form,
            }
        });

    ReportEvent::PageOpened {
        page: request.page.clone(),
        title: page.title(),
        mode: request.mode.clone(),
        timestamp: ReportEvent::now(),
    }
    .write_to(out)?;

    if !request.sets.is_empty() {
        page.form_mut().set_values(request.sets.clone())?;
        for (field, value) in request.sets {
            ReportEvent::ValueSet {
                field,
                value,
                timestamp: ReportEvent::now(),
            }
            .write_to(out)?;
        }
    }

    page.form_mut().settle().await;
    page.form_mut().validate();

    write_state(&mut page, out)?;

    if let Some(action) = &request.action {
        let outcome = page.trigger_action(action)?;
        ReportEvent::Action {
            outcome,
            timestamp: ReportEvent::now(),
        }
        .write_to(out)?;
        page.form_mut().settle().await;
    }

    for reported in page.form_mut().take_reported_errors() {
        warn!("Reported during inspection: {}", reported.error);
        ReportEvent::Reported {
            field: reported.field,
            message: reported.error.to_string(),
            timestamp: ReportEvent::now(),
        }
        .write_to(out)?;
    }

    let form = page.form();
    ReportEvent::Summary {
        valid: form.is_valid(),
        dirty_fields: form.dirty_fields(),
        data_version: form.data_version(),
        timestamp: ReportEvent::now(),
    }
    .write_to(out)?;

    page.destroy();
    Ok(())
}

fn write_state<W: Write>(page: &mut PageContext, out: &mut W) -> Result<()> {
    let config = Arc::clone(page.form().form());

    for scope in config.section_scopes() {
        let id = scope.section.id.as_str();
        let visibility = page.form().evaluate_section_visibility(id);
        ReportEvent::Section {
            id: id.to_string(),
            visible: visibility.is_visible,
            hidden_by: visibility.hidden_by,
            timestamp: ReportEvent::now(),
        }
        .write_to(out)?;
    }

    for name in config.field_names() {
        let form = page.form();
        let visibility = form.evaluate_field_visibility(name);
        ReportEvent::Field {
            name: name.to_string(),
            visible: visibility.is_visible,
            hidden_by: visibility.hidden_by,
            disabled: form.is_field_disabled(name),
            read_only: form.is_field_read_only(name),
            pending: form.is_pending(name),
            errors: form.field_errors(name).to_vec(),
            options: form.field_options(name).cloned(),
            timestamp: ReportEvent::now(),
        }
        .write_to(out)?;
    }

    for name in config.list_field_names() {
        let list = page.form_mut().list(name)?;
        let count = list.count();
        let item_errors = (0..count)
            .map(|index| (index, list.item_errors(index).messages()))
            .filter(|(_, messages)| !messages.is_empty())
            .collect();
        ReportEvent::List {
            name: name.to_string(),
            count,
            errors: list.list_errors(),
            item_errors,
            can_add: list.can_add(),
            can_remove: list.can_remove(),
            timestamp: ReportEvent::now(),
        }
        .write_to(out)?;
    }

    Ok(())
}
