//! # formwork-core - Core Domain Types
//!
//! Foundation crate for formwork. Provides error handling, logging setup
//! and the dynamic value helpers shared by the engine and the binary.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, serde_json, thiserror, toml, tracing).
//!
//! ## Public API
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Values (`value`)
//! - [`Record`] - An entity or DTO as a JSON object
//! - [`is_truthy()`], [`is_empty_value()`], [`shallow_merge()`]
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use formwork_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod value;

/// Prelude for common imports used throughout all formwork crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use super::value::Record;
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use value::{is_empty_value, is_truthy, shallow_merge, value_len, Record};
