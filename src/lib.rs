//! formwork - declarative form and page engine
//!
//! The library half of the `formwork` binary. It is the outermost
//! composition point: it owns the process-wide registries, registers the
//! demo page set and runs headless page inspections.

pub mod demo;
pub mod headless;

use std::sync::Arc;

use formwork_core::prelude::*;
use formwork_engine::Registries;

pub use headless::runner::{parse_set, run_inspect, InspectRequest};
pub use headless::ReportEvent;

/// Process-wide registries with the demo pages registered once
pub fn bootstrap() -> Result<Arc<Registries>> {
    let registries = Registries::global();
    if !registries.pages.has(demo::CUSTOMER_PAGE) {
        demo::register_demo(&registries)?;
    }
    Ok(registries)
}
