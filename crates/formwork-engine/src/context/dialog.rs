//! Modal dialog scope
//!
//! Dialogs are stacked on the owning context. A [`DialogContext`] exposes
//! the data and options of one open dialog and closes it.

use serde::Serialize;
use serde_json::Value;

use formwork_core::prelude::*;

use crate::context::FormContext;
use crate::message::ChangeEvent;

/// Presentation options passed through to the renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogOptions {
    pub title: Option<String>,
    pub width: Option<String>,
    /// Whether the user may dismiss without confirming
    pub dismissible: bool,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self {
            title: None,
            width: None,
            dismissible: true,
            confirm_label: "OK".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}

impl DialogOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// How a dialog was closed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum DialogOutcome {
    Confirmed(Value),
    Dismissed,
}

/// An open dialog held by a context
#[derive(Debug, Clone)]
pub struct Dialog {
    pub id: u64,
    pub data: Value,
    pub options: DialogOptions,
}

/// Scoped access to one open dialog
pub struct DialogContext<'a> {
    ctx: &'a mut FormContext,
    position: usize,
}

impl DialogContext<'_> {
    fn dialog(&self) -> &Dialog {
        &self.ctx.dialogs[self.position]
    }

    pub fn id(&self) -> u64 {
        self.dialog().id
    }

    pub fn dialog_data(&self) -> &Value {
        &self.dialog().data
    }

    pub fn dialog_options(&self) -> &DialogOptions {
        &self.dialog().options
    }

    pub fn set_dialog_data(&mut self, data: Value) {
        self.ctx.dialogs[self.position].data = data;
    }

    /// The context that owns the dialog
    pub fn context(&self) -> &FormContext {
        self.ctx
    }

    /// Close the dialog with the given outcome
    pub fn close(self, outcome: DialogOutcome) -> Result<DialogOutcome> {
        self.ctx.ensure_active("close dialog")?;
        let dialog = self.ctx.dialogs.remove(self.position);
        debug!("Dialog {} closed: {:?}", dialog.id, outcome);
        self.ctx.notify(ChangeEvent::DialogChanged {
            open: self.ctx.dialogs.len(),
        });
        Ok(outcome)
    }

    /// Dismiss without confirming; `None` when the dialog is not dismissible
    pub fn dismiss(self) -> Result<Option<DialogOutcome>> {
        if !self.dialog_options().dismissible {
            return Ok(None);
        }
        self.close(DialogOutcome::Dismissed).map(Some)
    }
}

impl FormContext {
    /// Push a dialog and return its id
    pub fn open_dialog(&mut self, data: Value, options: DialogOptions) -> Result<u64> {
        self.ensure_active("open dialog")?;
        let id = self.next_dialog_id();
        self.dialogs.push(Dialog { id, data, options });
        self.notify(ChangeEvent::DialogChanged {
            open: self.dialogs.len(),
        });
        Ok(id)
    }

    pub fn dialog(&mut self, id: u64) -> Option<DialogContext<'_>> {
        let position = self.dialogs.iter().position(|dialog| dialog.id == id)?;
        Some(DialogContext {
            ctx: self,
            position,
        })
    }

    /// The most recently opened dialog
    pub fn top_dialog(&mut self) -> Option<DialogContext<'_>> {
        let position = self.dialogs.len().checked_sub(1)?;
        Some(DialogContext {
            ctx: self,
            position,
        })
    }

    pub fn open_dialogs(&self) -> usize {
        self.dialogs.len()
    }
}
