//! Field dependencies
//!
//! A [`DependsOnConfig`] attached to a target field reacts to committed value
//! changes on one or more source fields. Resolution runs, in order:
//! 1. the value action (`clear` or `reset`)
//! 2. an option reload through the API client (spawned, never awaited inline)
//! 3. a custom handler
//!
//! Debounced dependencies are scheduled on the tokio runtime; a newer trigger
//! aborts the pending one. Reload results are committed only when they belong
//! to the most recent request for their target.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use formwork_core::{Error, Record, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::context::FormContext;
use crate::message::EngineMessage;
use crate::resolve::Resolvable;
use crate::schema::FormConfig;

/// Custom dependency handler: receives the new source value and the context
pub type DependencyHandler = Arc<dyn Fn(&Value, &mut FormContext) -> Result<()> + Send + Sync>;

/// What happens to the target's own value when a source changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueAction {
    /// Leave the value alone
    #[default]
    Keep,
    /// Set the target to null
    Clear,
    /// Restore the target's original value (initial entity value or default)
    Reset,
}

/// Declares how a target field reacts to changes on its source fields
#[derive(Clone, Default)]
pub struct DependsOnConfig {
    pub sources: Vec<String>,
    pub value_action: ValueAction,
    pub reload_api: Option<String>,
    pub reload_params: Option<Resolvable<Record>>,
    pub handler: Option<DependencyHandler>,
    pub debounce_ms: Option<u64>,
    pub only_if_truthy: bool,
}

impl DependsOnConfig {
    /// React to changes on a single source field
    pub fn on(source: impl Into<String>) -> Self {
        Self {
            sources: vec![source.into()],
            ..Default::default()
        }
    }

    /// React to changes on any of several source fields
    pub fn on_any<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn clear(mut self) -> Self {
        self.value_action = ValueAction::Clear;
        self
    }

    pub fn reset(mut self) -> Self {
        self.value_action = ValueAction::Reset;
        self
    }

    pub fn reload(mut self, api: impl Into<String>) -> Self {
        self.reload_api = Some(api.into());
        self
    }

    pub fn reload_params(mut self, params: Record) -> Self {
        self.reload_params = Some(Resolvable::literal(params));
        self
    }

    pub fn reload_params_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormContext) -> Record + Send + Sync + 'static,
    {
        self.reload_params = Some(Resolvable::computed(f));
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &mut FormContext) -> Result<()> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    pub fn only_if_truthy(mut self) -> Self {
        self.only_if_truthy = true;
        self
    }
}

impl fmt::Debug for DependsOnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependsOnConfig")
            .field("sources", &self.sources)
            .field("value_action", &self.value_action)
            .field("reload_api", &self.reload_api)
            .field("has_handler", &self.handler.is_some())
            .field("debounce_ms", &self.debounce_ms)
            .field("only_if_truthy", &self.only_if_truthy)
            .finish()
    }
}

/// One registered dependency of a target field
#[derive(Debug, Clone)]
pub struct Dependent {
    /// Registration order across the whole form
    pub id: usize,
    pub target: String,
    pub config: Arc<DependsOnConfig>,
}

/// Source field -> dependents, in registration order
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dependents: Vec<Dependent>,
    by_source: HashMap<String, Vec<usize>>,
}

impl DependencyGraph {
    /// Collect every dependency declared in a form, walking it in tree order
    pub fn from_form(form: &FormConfig) -> Self {
        let mut graph = Self::default();
        for scope in form.field_scopes() {
            for config in &scope.field.depends_on {
                graph.register(&scope.field.name, config.clone());
            }
        }
        graph
    }

    pub fn register(&mut self, target: &str, config: DependsOnConfig) {
        let id = self.dependents.len();
        for source in &config.sources {
            self.by_source.entry(source.clone()).or_default().push(id);
        }
        self.dependents.push(Dependent {
            id,
            target: target.to_string(),
            config: Arc::new(config),
        });
    }

    /// Dependents of a source field, in registration order
    pub fn dependents_of(&self, source: &str) -> Vec<Dependent> {
        self.by_source
            .get(source)
            .map(|ids| ids.iter().map(|id| self.dependents[*id].clone()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, id: usize) -> Option<&Dependent> {
        self.dependents.get(id)
    }

    pub fn has_dependents(&self, source: &str) -> bool {
        self.by_source.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Pending debounced resolution for one dependent
#[derive(Debug)]
struct PendingDebounce {
    generation: u64,
    task: JoinHandle<()>,
}

/// Coalesces rapid triggers of a dependent from the same source into one
/// resolution; triggers from different sources are debounced independently
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: HashMap<(usize, String), PendingDebounce>,
    next_generation: u64,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule (or reschedule) a resolution after `delay`
    ///
    /// Any resolution already pending for the same dependent and source is
    /// cancelled.
    /// Fails with [`Error::NoAsyncRuntime`] outside a tokio runtime.
    pub fn schedule(
        &mut self,
        dependent: &Dependent,
        source: &str,
        value: Value,
        delay: Duration,
        tx: mpsc::UnboundedSender<EngineMessage>,
    ) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::no_async_runtime(format!("debounced '{}'", dependent.target)))?;

        let key = (dependent.id, source.to_string());
        if let Some(previous) = self.pending.remove(&key) {
            previous.task.abort();
            tracing::trace!(
                "Debounce for '{}' superseded (generation {})",
                dependent.target,
                previous.generation
            );
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let dependent_id = dependent.id;
        let source = source.to_string();

        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineMessage::DebounceElapsed {
                dependent_id,
                source,
                value,
                generation,
            });
        });

        self.pending.insert(key, PendingDebounce { generation, task });
        Ok(())
    }

    /// Accept an elapsed timer if it is still the current one
    pub fn complete(&mut self, dependent_id: usize, source: &str, generation: u64) -> bool {
        let key = (dependent_id, source.to_string());
        match self.pending.get(&key) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Whether any source has a resolution pending for this dependent
    pub fn is_pending(&self, dependent_id: usize) -> bool {
        self.pending.keys().any(|(id, _)| *id == dependent_id)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Tracks the most recent reload request per target field
#[derive(Debug, Default)]
pub struct ReloadGuard {
    latest: HashMap<String, u64>,
    in_flight: HashMap<String, usize>,
    next_request: u64,
}

impl ReloadGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request and return its id
    pub fn begin(&mut self, target: &str) -> u64 {
        self.next_request += 1;
        self.latest.insert(target.to_string(), self.next_request);
        *self.in_flight.entry(target.to_string()).or_default() += 1;
        self.next_request
    }

    /// Mark a request as settled; true when it is the latest for its target
    pub fn settle(&mut self, target: &str, request_id: u64) -> bool {
        if let Some(count) = self.in_flight.get_mut(target) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(target);
            }
        }
        self.latest.get(target) == Some(&request_id)
    }

    pub fn is_in_flight(&self, target: &str) -> bool {
        self.in_flight.contains_key(target)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FormBuilder;

    #[test]
    fn test_depends_on_builder() {
        let config = DependsOnConfig::on("country")
            .clear()
            .reload("cities")
            .debounce(300)
            .only_if_truthy();
        assert_eq!(config.sources, vec!["country".to_string()]);
        assert_eq!(config.value_action, ValueAction::Clear);
        assert_eq!(config.reload_api.as_deref(), Some("cities"));
        assert_eq!(config.debounce_ms, Some(300));
        assert!(config.only_if_truthy);
    }

    #[test]
    fn test_clear_and_reset_are_exclusive() {
        let config = DependsOnConfig::on("a").clear().reset();
        assert_eq!(config.value_action, ValueAction::Reset);
    }

    #[test]
    fn test_graph_keeps_registration_order() {
        let form = FormBuilder::new("deps")
            .section("main")
            .row()
            .field("country")
            .end()
            .field("region")
            .depends_on(DependsOnConfig::on("country").clear())
            .end()
            .field("city")
            .depends_on(DependsOnConfig::on_any(["country", "region"]).clear())
            .end()
            .end()
            .end()
            .build()
            .unwrap();

        let graph = DependencyGraph::from_form(&form);
        assert_eq!(graph.len(), 2);

        let targets: Vec<_> = graph
            .dependents_of("country")
            .into_iter()
            .map(|d| d.target)
            .collect();
        assert_eq!(targets, vec!["region".to_string(), "city".to_string()]);
        assert!(graph.has_dependents("region"));
        assert!(!graph.has_dependents("city"));
    }

    #[test]
    fn test_reload_guard_rejects_stale_results() {
        let mut guard = ReloadGuard::new();
        let first = guard.begin("city");
        let second = guard.begin("city");

        assert!(guard.settle("city", second));
        assert!(guard.is_in_flight("city"));
        assert!(!guard.settle("city", first));
        assert!(guard.is_idle());
    }

    #[test]
    fn test_debouncer_requires_runtime() {
        let mut debouncer = Debouncer::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let dependent = Dependent {
            id: 0,
            target: "city".to_string(),
            config: Arc::new(DependsOnConfig::on("country")),
        };
        let err = debouncer
            .schedule(&dependent, "country", Value::Null, Duration::from_millis(10), tx)
            .unwrap_err();
        assert!(matches!(err, Error::NoAsyncRuntime { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_supersedes_pending_trigger() {
        let mut debouncer = Debouncer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dependent = Dependent {
            id: 3,
            target: "city".to_string(),
            config: Arc::new(DependsOnConfig::on("country")),
        };

        for value in ["a", "ab", "abc"] {
            debouncer
                .schedule(
                    &dependent,
                    "country",
                    Value::String(value.to_string()),
                    Duration::from_millis(100),
                    tx.clone(),
                )
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let msg = rx.recv().await.unwrap();
        match msg {
            EngineMessage::DebounceElapsed {
                dependent_id,
                source,
                value,
                generation,
            } => {
                assert_eq!(dependent_id, 3);
                assert_eq!(value, Value::String("abc".to_string()));
                assert!(debouncer.complete(dependent_id, &source, generation));
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(debouncer.is_idle());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_keeps_sources_apart() {
        let mut debouncer = Debouncer::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dependent = Dependent {
            id: 1,
            target: "summary".to_string(),
            config: Arc::new(DependsOnConfig::on_any(["a", "b"])),
        };

        for source in ["a", "b"] {
            debouncer
                .schedule(
                    &dependent,
                    source,
                    Value::String(source.to_string()),
                    Duration::from_millis(100),
                    tx.clone(),
                )
                .unwrap();
        }
        assert!(debouncer.is_pending(1));

        let mut sources = Vec::new();
        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                EngineMessage::DebounceElapsed {
                    dependent_id,
                    source,
                    generation,
                    ..
                } => {
                    assert!(debouncer.complete(dependent_id, &source, generation));
                    sources.push(source);
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
        sources.sort();
        assert_eq!(sources, vec!["a".to_string(), "b".to_string()]);
        assert!(debouncer.is_idle());
    }
}
