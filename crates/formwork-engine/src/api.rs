//! API invocation contract used by dependency reloads
//!
//! The engine never performs I/O itself. Hosts plug in an [`ApiClient`] that
//! turns a request descriptor into a future; the engine spawns that future
//! and applies the result when it settles.

use formwork_core::{Record, Result};
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

/// Describes one reload call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequest {
    /// Logical API name, as declared by `reload(...)`
    pub api: String,
    /// Parameters resolved against the context at trigger time
    pub params: Record,
    /// Field whose options are being reloaded
    pub target: String,
}

/// Executes reload requests on behalf of the engine
#[cfg_attr(test, mockall::automock)]
pub trait ApiClient: Send + Sync {
    fn invoke(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value>>;
}
