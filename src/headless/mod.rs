//! Headless inspection report
//!
//! `formwork inspect` evaluates one page against a JSON entity and writes
//! the result as NDJSON (newline-delimited JSON), one event per line. Each
//! event has an "event" field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"page_opened","page":"customer-edit","mode":"edit","timestamp":1704700001000}
//! {"event":"field","name":"companyName","visible":false,"hidden_by":"conditional","disabled":false,"read_only":false,"pending":false,"errors":[],"timestamp":1704700001001}
//! {"event":"summary","valid":false,"dirty_fields":["email"],"data_version":1,"timestamp":1704700001002}
//! ```

pub mod runner;

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use formwork_engine::{ActionOutcome, HiddenBy};

/// Events emitted by an inspection run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    /// The page context was created
    PageOpened {
        page: String,
        title: Option<String>,
        mode: String,
        timestamp: i64,
    },

    /// A `--set` override was committed
    ValueSet {
        field: String,
        value: Value,
        timestamp: i64,
    },

    /// Evaluated state of one top-level field
    Field {
        name: String,
        visible: bool,
        hidden_by: Option<HiddenBy>,
        disabled: bool,
        read_only: bool,
        pending: bool,
        errors: Vec<String>,
        options: Option<Value>,
        timestamp: i64,
    },

    /// Evaluated state of one list field
    List {
        name: String,
        count: usize,
        errors: Vec<String>,
        item_errors: BTreeMap<usize, Vec<String>>,
        can_add: bool,
        can_remove: bool,
        timestamp: i64,
    },

    /// Section visibility
    Section {
        id: String,
        visible: bool,
        hidden_by: Option<HiddenBy>,
        timestamp: i64,
    },

    /// Result of `--action`
    Action {
        outcome: ActionOutcome,
        timestamp: i64,
    },

    /// A failure captured on the context's error channel
    Reported {
        field: Option<String>,
        message: String,
        timestamp: i64,
    },

    /// Final form state
    Summary {
        valid: bool,
        dirty_fields: Vec<String>,
        data_version: u64,
        timestamp: i64,
    },
}

impl ReportEvent {
    /// Write this event as one JSON line
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)
    }

    /// Emit this event to stdout
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write report event to stdout: {}", e);
            return;
        }
        if let Err(e) = stdout.flush() {
            error!("Failed to flush report stdout: {}", e);
        }
    }

    pub(crate) fn now() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = ReportEvent::Summary {
            valid: true,
            dirty_fields: vec!["email".to_string()],
            data_version: 2,
            timestamp: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "summary");
        assert_eq!(json["dirty_fields"][0], "email");
    }

    #[test]
    fn test_write_to_emits_one_line() {
        let event = ReportEvent::Reported {
            field: Some("city".to_string()),
            message: "boom".to_string(),
            timestamp: 1,
        };
        let mut out = Vec::new();
        event.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"event\":\"reported\""));
    }

    #[test]
    fn test_hidden_by_serializes_snake_case() {
        let event = ReportEvent::Section {
            id: "account".to_string(),
            visible: false,
            hidden_by: Some(HiddenBy::Access),
            timestamp: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["hidden_by"], "access");
    }
}
