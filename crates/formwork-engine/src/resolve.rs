//! Literal-or-computed configuration values
//!
//! Labels, props, visibility flags and similar settings are either fixed at
//! build time or derived from the live context on every evaluation.

use std::fmt;
use std::sync::Arc;

use crate::context::FormContext;

/// A function evaluated against the live context
pub type ContextFn<T> = Arc<dyn Fn(&FormContext) -> T + Send + Sync>;

/// A configuration value that is fixed or computed from context
pub enum Resolvable<T> {
    Literal(T),
    Computed(ContextFn<T>),
}

impl<T: Clone> Resolvable<T> {
    pub fn literal(value: T) -> Self {
        Self::Literal(value)
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&FormContext) -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Produce the concrete value for this evaluation pass
    pub fn resolve(&self, ctx: &FormContext) -> T {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(f) => f(ctx),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// Resolve a literal-or-computed value against a context
pub fn resolve<T: Clone>(value: &Resolvable<T>, ctx: &FormContext) -> T {
    value.resolve(ctx)
}

impl<T> Clone for Resolvable<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl<T> From<T> for Resolvable<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Default> Default for Resolvable<T> {
    fn default() -> Self {
        Self::Literal(T::default())
    }
}
