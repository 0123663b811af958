//! Messages flowing into and out of a context
//!
//! [`EngineMessage`]s are produced by spawned work (debounce timers, reload
//! fetches) and drained by the context on the host's thread.
//! [`ChangeEvent`]s are broadcast to the rendering layer after each committed
//! mutation.

use formwork_core::Result;
use serde::Serialize;
use serde_json::Value;

/// Settled asynchronous work, delivered back to the owning context
#[derive(Debug)]
pub enum EngineMessage {
    /// A debounce window elapsed without being superseded
    DebounceElapsed {
        dependent_id: usize,
        source: String,
        value: Value,
        generation: u64,
    },

    /// A reload fetch completed (successfully or not)
    ReloadSettled {
        target: String,
        request_id: u64,
        result: Result<Value>,
    },
}

/// Change notification for the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// One field value was committed
    ValueChanged { field: String },

    /// A list field was mutated through its operations
    ListChanged { field: String, operation: String },

    /// Fields were cleared because they became conditionally hidden
    FieldsCleared { fields: Vec<String> },

    /// A reload delivered a fresh option set for a field
    OptionsReloaded { field: String },

    /// Validation state changed
    ValidationChanged,

    /// Touched state changed for a field
    Touched { field: String },

    /// A dialog was opened or closed
    DialogChanged { open: usize },

    /// The form was restored to its initial snapshot
    FormReset,

    /// The context was torn down
    Destroyed,
}
