//! End-to-end scenarios driven through the public API

use std::sync::Arc;

use formwork_engine::config::EngineSettings;
use formwork_engine::prelude::*;
use formwork_engine::{ActionOutcome, ChangeEvent, FormConfig};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("expected object, got {}", other),
    }
}

fn names_form() -> Arc<FormConfig> {
    FormBuilder::new("person")
        .section("names")
        .row()
        .field("firstName")
        .required("First name is required")
        .end()
        .field("lastName")
        .required("Last name is required")
        .end()
        .end()
        .end()
        .build()
        .unwrap()
}

fn addresses_form() -> Arc<FormConfig> {
    FormBuilder::new("customer")
        .section("addresses")
        .row()
        .list("addresses")
        .min(1)
        .min_message("Add at least one address")
        .default_item(json!({"country": "NO"}))
        .item_row()
        .field("street")
        .required("Street is required")
        .end()
        .end()
        .end()
        .end()
        .end()
        .build()
        .unwrap()
}

#[test]
fn test_required_row_flips_validity() {
    let mut ctx = FormContext::new(names_form(), Record::new(), "edit", Arc::new(Registries::new()));

    assert!(!ctx.validate());
    assert!(!ctx.is_valid());
    assert_eq!(ctx.field_errors("firstName"), ["First name is required"]);
    assert_eq!(ctx.field_errors("lastName"), ["Last name is required"]);

    ctx.set_value("firstName", json!("Ada")).unwrap();
    ctx.set_value("lastName", json!("Lovelace")).unwrap();
    assert!(ctx.is_valid());
    assert!(ctx.validate());
    assert!(ctx.field_errors("firstName").is_empty());
}

#[test]
fn test_removing_only_address_leaves_list_invalid() {
    let entity = record(json!({"addresses": [{"street": "Main", "country": "NO"}]}));
    let mut ctx = FormContext::new(addresses_form(), entity, "edit", Arc::new(Registries::new()));

    let mut list = ctx.list("addresses").unwrap();
    assert!(!list.can_remove());
    assert!(list.remove(0).unwrap().is_some());
    assert!(list.is_empty());
    assert_eq!(list.list_errors(), vec!["Add at least one address"]);
    assert!(!ctx.is_valid());

    let index = ctx.list("addresses").unwrap().add(json!({"street": "Second"})).unwrap();
    assert_eq!(index, Some(0));
    assert_eq!(
        ctx.value("addresses"),
        json!([{"country": "NO", "street": "Second"}])
    );
    assert!(ctx.is_valid());
}

#[test]
fn test_removing_only_address_ignored_when_min_enforced() {
    let mut settings = EngineSettings::default();
    settings.lists.enforce_min_on_remove = true;
    let entity = record(json!({"addresses": [{"street": "Main"}]}));
    let mut ctx = FormContext::new(addresses_form(), entity, "edit", Arc::new(Registries::new()))
        .with_settings(settings);

    let mut list = ctx.list("addresses").unwrap();
    assert_eq!(list.remove(0).unwrap(), None);
    assert_eq!(list.count(), 1);
    assert!(ctx.is_valid());
}

#[test]
fn test_list_mutations_emit_one_event_each() {
    let entity = record(json!({"addresses": [{"street": "A"}, {"street": "B"}, {"street": "C"}]}));
    let mut ctx = FormContext::new(addresses_form(), entity, "edit", Arc::new(Registries::new()));
    let mut events = ctx.subscribe();

    let mut list = ctx.list("addresses").unwrap();
    list.swap(0, 2).unwrap();
    list.swap(0, 2).unwrap();
    list.move_item(0, 1).unwrap();
    assert_eq!(list.remove(999).unwrap(), None);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 3);
    assert!(received
        .iter()
        .all(|event| matches!(event, ChangeEvent::ListChanged { .. })));
    assert_eq!(
        ctx.value("addresses"),
        json!([{"street": "B"}, {"street": "A"}, {"street": "C"}])
    );
}

#[test]
fn test_page_submit_maps_payload() {
    let registries = Arc::new(Registries::new());
    PageConfig::new("person", names_form())
        .route("/person")
        .mapper("person")
        .register(&registries)
        .unwrap();
    MapperBuilder::new("person")
        .map("first_name", "firstName")
        .map("last_name", "lastName")
        .computed_dto("display", |entity| {
            json!(format!(
                "{} {}",
                entity["firstName"].as_str().unwrap_or_default(),
                entity["lastName"].as_str().unwrap_or_default()
            ))
        })
        .build()
        .unwrap()
        .register(&registries)
        .unwrap();

    let form = FormBuilder::new("person-with-save")
        .section("names")
        .row()
        .field("firstName")
        .required("First name is required")
        .end()
        .end()
        .end()
        .action("save")
        .submit()
        .end()
        .build()
        .unwrap();
    PageConfig::new("person-save", form)
        .mapper("person")
        .register(&registries)
        .unwrap();

    let entity = record(json!({"firstName": "Ada", "lastName": "Lovelace"}));
    let mut page = PageContext::open(Arc::clone(&registries), "person-save", entity, "edit").unwrap();
    let outcome = page.trigger_action("save").unwrap();
    assert_eq!(
        outcome,
        ActionOutcome::Submitted {
            action: "save".to_string(),
            payload: record(json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "display": "Ada Lovelace"
            })),
        }
    );
    assert_eq!(registries.page_for_route("person").unwrap().id, "person");
}
