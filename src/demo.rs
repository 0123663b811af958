//! Demo page set registered by the `formwork` binary
//!
//! A customer page exercising conditional and access-based visibility, a
//! reloading dependency, a bounded address list and the three standard
//! actions, plus the mapper its submit action uses.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{json, Value};

use formwork_engine::prelude::*;
use formwork_engine::{ApiClient, ApiRequest, Mapper};

pub const CUSTOMER_PAGE: &str = "customer-edit";
pub const CUSTOMER_MAPPER: &str = "customer";

/// Register every demo artifact
pub fn register_demo(registries: &Registries) -> Result<()> {
    customer_mapper()?.register(registries)?;
    customer_page()?.register(registries)?;
    info!("Registered demo pages: {:?}", registries.pages.ids());
    Ok(())
}

pub fn customer_page() -> Result<PageConfig> {
    let form = FormBuilder::new("customer")
        .title("Customer")
        .section("identity")
        .title("Identity")
        .row()
        .field("customerType")
        .label("Customer type")
        .component("select")
        .props(record(json!({"options": ["person", "company"]})))
        .default_value(json!("person"))
        .end()
        .field("companyName")
        .label("Company name")
        .required("Company name is required")
        .visible_when(|ctx| ctx.value("customerType") == json!("company"))
        .end()
        .end()
        .row()
        .field("firstName")
        .label("First name")
        .required("First name is required")
        .max_length(50, "First name is too long")
        .end()
        .field("lastName")
        .label("Last name")
        .required("Last name is required")
        .end()
        .field("email")
        .label("Email")
        .email("Email address is invalid")
        .end()
        .end()
        .end()
        .section("account")
        .title("Account")
        .row()
        .field("creditLimit")
        .label("Credit limit")
        .rule(ValidationRule::min(0.0, "Credit limit cannot be negative"))
        .hide_by_access_when(|ctx| !ctx.has_permission("finance"))
        .read_only_when(|ctx| ctx.is_mode("review"))
        .end()
        .end()
        .row()
        .field("country")
        .label("Country")
        .component("select")
        .end()
        .field("city")
        .label("City")
        .component("select")
        .depends_on(
            DependsOnConfig::on("country")
                .clear()
                .reload("cities")
                .reload_params_with(|ctx| {
                    let mut params = Record::new();
                    params.insert("country".to_string(), ctx.value("country"));
                    params
                })
                .only_if_truthy(),
        )
        .end()
        .end()
        .end()
        .section("addresses")
        .title("Addresses")
        .row()
        .list("addresses")
        .label("Addresses")
        .min(1)
        .max(5)
        .min_message("At least one address is required")
        .default_item(json!({"kind": "home", "street": ""}))
        .display(DisplayMode::Tabs)
        .add_label("Add address")
        .confirm_remove("Remove this address?")
        .item_row()
        .field("kind")
        .label("Kind")
        .end()
        .field("street")
        .label("Street")
        .required("Street is required")
        .hide_when(|ctx| ctx.item_value("kind") == Some(json!("po_box")))
        .end()
        .end()
        .end()
        .end()
        .end()
        .action("save")
        .label("Save")
        .submit()
        .end()
        .action("cancel")
        .label("Cancel")
        .cancel()
        .end()
        .action("reset")
        .label("Reset")
        .reset()
        .position(ActionPosition::Top)
        .end()
        .build()?;

    Ok(PageConfig::new(CUSTOMER_PAGE, form)
        .title("Edit customer")
        .route("/customers/:id/edit")
        .mapper(CUSTOMER_MAPPER))
}

pub fn customer_mapper() -> Result<Mapper> {
    MapperBuilder::new(CUSTOMER_MAPPER)
        .map("customer_type", "customerType")
        .map("company_name", "companyName")
        .map("first_name", "firstName")
        .map("last_name", "lastName")
        .map("credit_limit", "creditLimit")
        .computed_dto("display_name", |entity| {
            let part = |key: &str| {
                entity
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            json!(format!("{} {}", part("firstName"), part("lastName")).trim())
        })
        .build()
}

/// Answers `cities` reloads from a fixed table
#[derive(Debug, Default)]
pub struct DemoApiClient;

impl ApiClient for DemoApiClient {
    fn invoke(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value>> {
        let result = match request.api.as_str() {
            "cities" => {
                let country = request.params.get("country").and_then(Value::as_str);
                Ok(match country {
                    Some("NO") => json!(["Oslo", "Bergen", "Trondheim"]),
                    Some("SE") => json!(["Stockholm", "Gothenburg"]),
                    Some("DK") => json!(["Copenhagen", "Aarhus"]),
                    _ => json!([]),
                })
            }
            other => Err(Error::api_call(format!("unknown api '{}'", other))),
        };
        async move { result }.boxed()
    }
}

/// Handle to the demo client as the engine expects it
pub fn demo_api_client() -> Arc<dyn ApiClient> {
    Arc::new(DemoApiClient)
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        _ => Record::new(),
    }
}
