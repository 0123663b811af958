//! Validation rules
//!
//! A rule pairs a check `(value, context) -> bool` with the message shown
//! when the check fails. Checks are synchronous or asynchronous; action
//! filters (`skip_on` / `validate_on`) restrict when a rule runs.
//!
//! Every rule except `required` passes on an empty value, so optional
//! fields only validate what the user actually entered.

use std::fmt;
use std::sync::{Arc, LazyLock};

use formwork_core::{is_empty_value, value_len, Error, Result};
use futures_util::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

use crate::context::FormContext;

/// Synchronous rule check
pub type SyncCheck = Arc<dyn Fn(&Value, &FormContext) -> bool + Send + Sync>;

/// Asynchronous rule check; receives an owned copy of the value
pub type AsyncCheck = Arc<dyn Fn(Value) -> BoxFuture<'static, bool> + Send + Sync>;

/// Structural check only: local@domain.tld without whitespace
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email pattern regex")
});

#[derive(Clone)]
pub enum RuleCheck {
    Sync(SyncCheck),
    Async(AsyncCheck),
}

impl fmt::Debug for RuleCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Sync(<fn>)"),
            Self::Async(_) => f.write_str("Async(<fn>)"),
        }
    }
}

/// A single validation rule attached to a field or list
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Rule kind, e.g. "required" or "min_length"
    pub kind: String,
    /// Message reported when the check fails
    pub message: String,
    pub check: RuleCheck,
    /// Action names for which this rule is skipped
    pub skip_on: Vec<String>,
    /// When non-empty, the rule only runs for these action names
    pub validate_on: Vec<String>,
}

impl ValidationRule {
    fn sync<F>(kind: &str, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &FormContext) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            check: RuleCheck::Sync(Arc::new(check)),
            skip_on: Vec::new(),
            validate_on: Vec::new(),
        }
    }

    pub fn required(message: impl Into<String>) -> Self {
        Self::sync("required", message, |value, _| !is_empty_value(value))
    }

    pub fn min_length(min: usize, message: impl Into<String>) -> Self {
        Self::sync("min_length", message, move |value, _| {
            is_empty_value(value) || value_len(value).map_or(true, |len| len >= min)
        })
    }

    pub fn max_length(max: usize, message: impl Into<String>) -> Self {
        Self::sync("max_length", message, move |value, _| {
            is_empty_value(value) || value_len(value).map_or(true, |len| len <= max)
        })
    }

    /// Match string values against a regular expression
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::builder_state(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self::sync("pattern", message, move |value, _| {
            if is_empty_value(value) {
                return true;
            }
            value.as_str().map_or(false, |s| regex.is_match(s))
        }))
    }

    pub fn email(message: impl Into<String>) -> Self {
        Self::sync("email", message, |value, _| {
            if is_empty_value(value) {
                return true;
            }
            value.as_str().map_or(false, |s| EMAIL_PATTERN.is_match(s))
        })
    }

    pub fn min(min: f64, message: impl Into<String>) -> Self {
        Self::sync("min", message, move |value, _| {
            is_empty_value(value) || numeric(value).map_or(false, |n| n >= min)
        })
    }

    pub fn max(max: f64, message: impl Into<String>) -> Self {
        Self::sync("max", message, move |value, _| {
            is_empty_value(value) || numeric(value).map_or(false, |n| n <= max)
        })
    }

    pub fn custom<F>(kind: &str, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &FormContext) -> bool + Send + Sync + 'static,
    {
        Self::sync(kind, message, check)
    }

    pub fn custom_async<F>(kind: &str, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        Self {
            kind: kind.to_string(),
            message: message.into(),
            check: RuleCheck::Async(Arc::new(check)),
            skip_on: Vec::new(),
            validate_on: Vec::new(),
        }
    }

    pub fn skip_on(mut self, action: impl Into<String>) -> Self {
        self.skip_on.push(action.into());
        self
    }

    pub fn validate_on(mut self, action: impl Into<String>) -> Self {
        self.validate_on.push(action.into());
        self
    }

    pub fn is_async(&self) -> bool {
        matches!(self.check, RuleCheck::Async(_))
    }

    /// Whether the rule runs for the given action
    ///
    /// Without an action (plain `validate()`), rules restricted by
    /// `validate_on` are skipped.
    pub fn applies_to(&self, action: Option<&str>) -> bool {
        match action {
            Some(action) => {
                if self.skip_on.iter().any(|a| a == action) {
                    return false;
                }
                self.validate_on.is_empty() || self.validate_on.iter().any(|a| a == action)
            }
            None => self.validate_on.is_empty(),
        }
    }

    /// Run a synchronous check; `None` for async rules
    pub fn check_sync(&self, value: &Value, ctx: &FormContext) -> Option<bool> {
        match &self.check {
            RuleCheck::Sync(check) => Some(check(value, ctx)),
            RuleCheck::Async(_) => None,
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Run all applicable synchronous rules, collecting failure messages
pub fn run_sync_rules(
    rules: &[ValidationRule],
    value: &Value,
    ctx: &FormContext,
    action: Option<&str>,
) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.applies_to(action))
        .filter_map(|rule| match rule.check_sync(value, ctx) {
            Some(false) => Some(rule.message.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::empty_context;
    use serde_json::json;

    #[test]
    fn test_required() {
        let ctx = empty_context();
        let rule = ValidationRule::required("Required");
        assert_eq!(rule.check_sync(&Value::Null, &ctx), Some(false));
        assert_eq!(rule.check_sync(&json!("  "), &ctx), Some(false));
        assert_eq!(rule.check_sync(&json!("Ada"), &ctx), Some(true));
        assert_eq!(rule.check_sync(&json!(0), &ctx), Some(true));
    }

    #[test]
    fn test_length_rules_pass_on_empty() {
        let ctx = empty_context();
        let min = ValidationRule::min_length(3, "Too short");
        assert_eq!(min.check_sync(&json!(""), &ctx), Some(true));
        assert_eq!(min.check_sync(&json!("ab"), &ctx), Some(false));
        assert_eq!(min.check_sync(&json!("abc"), &ctx), Some(true));

        let max = ValidationRule::max_length(2, "Too long");
        assert_eq!(max.check_sync(&json!([1, 2, 3]), &ctx), Some(false));
    }

    #[test]
    fn test_pattern_rule() {
        let ctx = empty_context();
        let rule = ValidationRule::pattern(r"^\d{4}$", "Four digits").unwrap();
        assert_eq!(rule.check_sync(&json!("0150"), &ctx), Some(true));
        assert_eq!(rule.check_sync(&json!("15"), &ctx), Some(false));
        assert_eq!(rule.check_sync(&json!(1234), &ctx), Some(false));
    }

    #[test]
    fn test_invalid_pattern_is_builder_error() {
        let err = ValidationRule::pattern("(", "broken").unwrap_err();
        assert!(matches!(err, Error::BuilderState { .. }));
    }

    #[test]
    fn test_email_rule() {
        let ctx = empty_context();
        let rule = ValidationRule::email("Invalid email");
        assert_eq!(rule.check_sync(&json!("ada@example.com"), &ctx), Some(true));
        assert_eq!(rule.check_sync(&json!("ada@example"), &ctx), Some(false));
        assert_eq!(rule.check_sync(&json!("a da@example.com"), &ctx), Some(false));
    }

    #[test]
    fn test_numeric_bounds_accept_numeric_strings() {
        let ctx = empty_context();
        let min = ValidationRule::min(18.0, "Adults only");
        assert_eq!(min.check_sync(&json!(17), &ctx), Some(false));
        assert_eq!(min.check_sync(&json!("21"), &ctx), Some(true));
        assert_eq!(min.check_sync(&json!("abc"), &ctx), Some(false));

        let max = ValidationRule::max(100.0, "Too much");
        assert_eq!(max.check_sync(&json!(100.0), &ctx), Some(true));
    }

    #[test]
    fn test_action_filters() {
        let rule = ValidationRule::required("x").skip_on("draft");
        assert!(rule.applies_to(None));
        assert!(rule.applies_to(Some("submit")));
        assert!(!rule.applies_to(Some("draft")));

        let rule = ValidationRule::required("x").validate_on("submit");
        assert!(!rule.applies_to(None));
        assert!(rule.applies_to(Some("submit")));
        assert!(!rule.applies_to(Some("draft")));
    }

    #[test]
    fn test_async_rule_is_not_run_synchronously() {
        let ctx = empty_context();
        let rule = ValidationRule::custom_async("unique", "Taken", |_| Box::pin(async { false }));
        assert!(rule.is_async());
        assert_eq!(rule.check_sync(&json!("x"), &ctx), None);
        assert!(run_sync_rules(&[rule], &json!("x"), &ctx, None).is_empty());
    }

    #[test]
    fn test_async_check_receives_owned_value() {
        let rule = ValidationRule::custom_async("unique", "Taken", |value| {
            Box::pin(async move { value != json!("admin") })
        });
        let RuleCheck::Async(check) = &rule.check else {
            panic!("expected an async check");
        };
        assert!(!tokio_test::block_on(check(json!("admin"))));
        assert!(tokio_test::block_on(check(json!("ada"))));
    }

    #[test]
    fn test_run_sync_rules_collects_messages_in_order() {
        let ctx = empty_context();
        let rules = vec![
            ValidationRule::required("Required"),
            ValidationRule::min_length(2, "Too short"),
            ValidationRule::custom("never", "Never valid", |_, _| false),
        ];
        assert_eq!(
            run_sync_rules(&rules, &Value::Null, &ctx, None),
            vec!["Required".to_string(), "Never valid".to_string()]
        );
    }
}
