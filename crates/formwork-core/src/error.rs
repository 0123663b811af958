//! Engine error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Build-time Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Builder state error: {message}")]
    BuilderState { message: String },

    #[error("Mapping invariant violated: {message}")]
    MappingInvariant { message: String },

    // ─────────────────────────────────────────────────────────────
    // Runtime/Context Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Context destroyed: cannot {operation}")]
    ContextDestroyed { operation: String },

    #[error("Unknown field: {name}")]
    UnknownField { name: String },

    #[error("Field is not a list: {name}")]
    NotAList { name: String },

    #[error("Dependency resolution failed for '{target}': {message}")]
    DependencyResolution { target: String, message: String },

    #[error("API call failed: {message}")]
    ApiCall { message: String },

    #[error("No async runtime available for {operation}")]
    NoAsyncRuntime { operation: String },

    // ─────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Registry error: {message}")]
    Registry { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn builder_state(message: impl Into<String>) -> Self {
        Self::BuilderState {
            message: message.into(),
        }
    }

    pub fn mapping_invariant(message: impl Into<String>) -> Self {
        Self::MappingInvariant {
            message: message.into(),
        }
    }

    pub fn context_destroyed(operation: impl Into<String>) -> Self {
        Self::ContextDestroyed {
            operation: operation.into(),
        }
    }

    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField { name: name.into() }
    }

    pub fn not_a_list(name: impl Into<String>) -> Self {
        Self::NotAList { name: name.into() }
    }

    pub fn dependency(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyResolution {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn api_call(message: impl Into<String>) -> Self {
        Self::ApiCall {
            message: message.into(),
        }
    }

    pub fn no_async_runtime(operation: impl Into<String>) -> Self {
        Self::NoAsyncRuntime {
            operation: operation.into(),
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors are reported through a context's error channel;
    /// evaluation carries on around them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ContextDestroyed { .. }
                | Error::DependencyResolution { .. }
                | Error::ApiCall { .. }
                | Error::NoAsyncRuntime { .. }
                | Error::UnknownField { .. }
        )
    }

    /// Check if this error aborts the operation that produced it
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BuilderState { .. } | Error::MappingInvariant { .. } | Error::Config { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
