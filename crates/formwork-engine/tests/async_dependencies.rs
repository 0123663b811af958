//! Debounced dependencies and reloads on a paused tokio clock

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formwork_engine::prelude::*;
use formwork_engine::{ApiClient, ApiRequest, FormConfig};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Value};

fn context(form: Arc<FormConfig>) -> FormContext {
    FormContext::new(form, Record::new(), "edit", Arc::new(Registries::new()))
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_resolve_once_with_last_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let form = {
        let calls = Arc::clone(&calls);
        let seen = Arc::clone(&seen);
        FormBuilder::new("search")
            .section("s")
            .row()
            .field("query")
            .end()
            .field("results")
            .depends_on(DependsOnConfig::on("query").debounce(300).handler(
                move |value, ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.lock().unwrap().push(value.clone());
                    ctx.set_value("results", json!(format!("results for {}", value)))
                },
            ))
            .end()
            .end()
            .end()
            .build()
            .unwrap()
    };
    let mut ctx = context(form);

    for query in ["r", "ru", "rus"] {
        ctx.set_value("query", json!(query)).unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(ctx.process_messages(), 0);
    }
    assert!(ctx.is_pending("results"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    ctx.settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![json!("rus")]);
    assert_eq!(ctx.value("results"), json!("results for \"rus\""));
    assert!(ctx.is_idle());
}

/// Answers the first request slowly and later ones quickly
struct SlowFirstClient {
    calls: AtomicUsize,
}

impl ApiClient for SlowFirstClient {
    fn invoke(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value>> {
        let delay = match self.calls.fetch_add(1, Ordering::SeqCst) {
            0 => Duration::from_millis(500),
            _ => Duration::from_millis(50),
        };
        async move {
            tokio::time::sleep(delay).await;
            Ok(json!([request.params["country"].clone()]))
        }
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_stale_reload_is_discarded() {
    let form = FormBuilder::new("address")
        .section("s")
        .row()
        .field("country")
        .end()
        .field("city")
        .depends_on(
            DependsOnConfig::on("country")
                .clear()
                .reload("cities")
                .reload_params_with(|ctx| {
                    let mut params = Record::new();
                    params.insert("country".to_string(), ctx.value("country"));
                    params
                }),
        )
        .end()
        .end()
        .end()
        .build()
        .unwrap();
    let client = Arc::new(SlowFirstClient {
        calls: AtomicUsize::new(0),
    });
    let mut ctx = context(form).with_api_client(client);

    ctx.set_value("country", json!("SE")).unwrap();
    ctx.set_value("country", json!("NO")).unwrap();
    assert!(ctx.is_pending("city"));

    ctx.settle().await;
    assert!(!ctx.is_pending("city"));
    assert_eq!(ctx.field_options("city"), Some(&json!(["NO"])));
    assert!(ctx.reported_errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_cancels_pending_debounce() {
    let calls = Arc::new(AtomicUsize::new(0));
    let form = {
        let calls = Arc::clone(&calls);
        FormBuilder::new("f")
            .section("s")
            .row()
            .field("a")
            .end()
            .field("b")
            .depends_on(DependsOnConfig::on("a").debounce(100).handler(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .end()
            .end()
            .end()
            .build()
            .unwrap()
    };
    let mut ctx = context(form);

    ctx.set_value("a", json!(1)).unwrap();
    ctx.destroy();
    tokio::time::advance(Duration::from_millis(200)).await;
    ctx.settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(ctx.set_value("a", json!(2)).is_err());
}
