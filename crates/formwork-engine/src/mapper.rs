//! Bidirectional entity <-> DTO mapping
//!
//! A [`Mapper`] converts between the wire shape (DTO) and the UI shape
//! (entity) of a record:
//!
//! - explicit [`FieldMapping`]s rename a field and optionally transform its
//!   value in one direction or both
//! - computed fields are derived from the whole opposite record and never
//!   travel back
//! - ignored fields never appear in either output
//!
//! Everything else is copied under the same name.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use formwork_core::prelude::*;

/// One-directional value transform
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Derives a value from the whole opposite record
pub type ComputeFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Explicit DTO field <-> entity field pair
#[derive(Clone)]
pub struct FieldMapping {
    pub dto_field: String,
    pub entity_field: String,
    /// Applied to the entity value when producing a DTO
    pub to_dto: Option<Transform>,
    /// Applied to the DTO value when producing an entity
    pub to_entity: Option<Transform>,
}

impl fmt::Debug for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("dto_field", &self.dto_field)
            .field("entity_field", &self.entity_field)
            .field("to_dto", &self.to_dto.is_some())
            .field("to_entity", &self.to_entity.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct ComputedField {
    pub name: String,
    pub compute: ComputeFn,
}

impl fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A built, immutable mapper
#[derive(Debug, Clone)]
pub struct Mapper {
    pub id: String,
    mappings: Vec<FieldMapping>,
    computed_dto: Vec<ComputedField>,
    computed_entity: Vec<ComputedField>,
    ignored: BTreeSet<String>,
}

impl Mapper {
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    fn by_entity_field(&self, name: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.entity_field == name)
    }

    fn by_dto_field(&self, name: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.dto_field == name)
    }

    /// Entity -> DTO
    ///
    /// Same-name copies run first and explicit mappings overwrite them.
    /// Entity-only computed fields are dropped.
    pub fn to_dto(&self, entity: &Record) -> Record {
        let mut dto = Record::new();
        for (key, value) in entity {
            if self.ignored.contains(key)
                || self.computed_entity.iter().any(|c| &c.name == key)
                || self.by_entity_field(key).is_some()
                || self.by_dto_field(key).is_some()
            {
                continue;
            }
            dto.insert(key.clone(), value.clone());
        }
        for mapping in &self.mappings {
            let Some(value) = entity.get(&mapping.entity_field) else {
                continue;
            };
            let value = match &mapping.to_dto {
                Some(transform) => transform(value),
                None => value.clone(),
            };
            dto.insert(mapping.dto_field.clone(), value);
        }
        for computed in &self.computed_dto {
            dto.insert(computed.name.clone(), (computed.compute)(entity));
        }
        dto
    }

    /// DTO -> entity; DTO-only computed fields are dropped
    pub fn to_entity(&self, dto: &Record) -> Record {
        let mut entity = Record::new();
        for (key, value) in dto {
            if self.ignored.contains(key)
                || self.computed_dto.iter().any(|c| &c.name == key)
                || self.by_dto_field(key).is_some()
                || self.by_entity_field(key).is_some()
            {
                continue;
            }
            entity.insert(key.clone(), value.clone());
        }
        for mapping in &self.mappings {
            let Some(value) = dto.get(&mapping.dto_field) else {
                continue;
            };
            let value = match &mapping.to_entity {
                Some(transform) => transform(value),
                None => value.clone(),
            };
            entity.insert(mapping.entity_field.clone(), value);
        }
        for computed in &self.computed_entity {
            entity.insert(computed.name.clone(), (computed.compute)(dto));
        }
        entity
    }

    /// Element-wise [`Mapper::to_dto`]; `None` maps to an empty list
    pub fn to_dto_list(&self, entities: Option<&[Record]>) -> Vec<Record> {
        entities
            .unwrap_or_default()
            .iter()
            .map(|entity| self.to_dto(entity))
            .collect()
    }

    pub fn to_entity_list(&self, dtos: Option<&[Record]>) -> Vec<Record> {
        dtos.unwrap_or_default()
            .iter()
            .map(|dto| self.to_entity(dto))
            .collect()
    }

    /// Typed entity -> typed DTO through their serde representations
    pub fn to_dto_as<E, D>(&self, entity: &E) -> Result<D>
    where
        E: Serialize,
        D: DeserializeOwned,
    {
        let dto = self.to_dto(&to_record(entity)?);
        Ok(serde_json::from_value(Value::Object(dto))?)
    }

    pub fn to_entity_as<D, E>(&self, dto: &D) -> Result<E>
    where
        D: Serialize,
        E: DeserializeOwned,
    {
        let entity = self.to_entity(&to_record(dto)?);
        Ok(serde_json::from_value(Value::Object(entity))?)
    }
}

fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record),
        other => Err(Error::mapping_invariant(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Builder for [`Mapper`]; shape errors are reported by [`MapperBuilder::build`]
pub struct MapperBuilder {
    id: String,
    mappings: Vec<FieldMapping>,
    computed_dto: Vec<ComputedField>,
    computed_entity: Vec<ComputedField>,
    ignored: BTreeSet<String>,
}

impl MapperBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mappings: Vec::new(),
            computed_dto: Vec::new(),
            computed_entity: Vec::new(),
            ignored: BTreeSet::new(),
        }
    }

    /// Rename `entity_field` to `dto_field` on the way out and back on the way in
    pub fn map(self, dto_field: impl Into<String>, entity_field: impl Into<String>) -> Self {
        self.map_with(dto_field, entity_field, None, None)
    }

    /// Mapping with optional transforms for each direction
    pub fn map_with(
        mut self,
        dto_field: impl Into<String>,
        entity_field: impl Into<String>,
        to_dto: Option<Transform>,
        to_entity: Option<Transform>,
    ) -> Self {
        let mut dto_field = dto_field.into();
        let mut entity_field = entity_field.into();
        // One missing name means "same name on both sides"
        if dto_field.is_empty() {
            dto_field = entity_field.clone();
        } else if entity_field.is_empty() {
            entity_field = dto_field.clone();
        }
        self.mappings.push(FieldMapping {
            dto_field,
            entity_field,
            to_dto,
            to_entity,
        });
        self
    }

    /// Same-name field with transforms in both directions
    pub fn transform<F, G>(self, field: impl Into<String>, to_dto: F, to_entity: G) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
        G: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let field = field.into();
        self.map_with(
            field.clone(),
            field,
            Some(Arc::new(to_dto)),
            Some(Arc::new(to_entity)),
        )
    }

    /// DTO-only field derived from the entity
    pub fn computed_dto<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.computed_dto.push(ComputedField {
            name: name.into(),
            compute: Arc::new(compute),
        });
        self
    }

    /// Entity-only field derived from the DTO
    pub fn computed_entity<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.computed_entity.push(ComputedField {
            name: name.into(),
            compute: Arc::new(compute),
        });
        self
    }

    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignored.insert(name.into());
        self
    }

    pub fn build(self) -> Result<Mapper> {
        if self.id.is_empty() {
            return Err(Error::mapping_invariant("mapper id must not be empty"));
        }

        for mapping in &self.mappings {
            if mapping.dto_field.is_empty() {
                return Err(Error::mapping_invariant(format!(
                    "mapper '{}': field mapping names neither a DTO nor an entity field",
                    self.id
                )));
            }
            for name in [&mapping.dto_field, &mapping.entity_field] {
                if self.ignored.contains(name) {
                    return Err(Error::mapping_invariant(format!(
                        "mapper '{}': mapped field '{}' is also ignored",
                        self.id, name
                    )));
                }
            }
        }

        for (side, fields) in [("DTO", &self.computed_dto), ("entity", &self.computed_entity)] {
            let mut seen = BTreeSet::new();
            for computed in fields.iter() {
                if computed.name.is_empty() {
                    return Err(Error::mapping_invariant(format!(
                        "mapper '{}': computed {} field has no name",
                        self.id, side
                    )));
                }
                if !seen.insert(computed.name.as_str()) {
                    return Err(Error::mapping_invariant(format!(
                        "mapper '{}': duplicate computed {} field '{}'",
                        self.id, side, computed.name
                    )));
                }
                if self.ignored.contains(&computed.name) {
                    return Err(Error::mapping_invariant(format!(
                        "mapper '{}': computed field '{}' is also ignored",
                        self.id, computed.name
                    )));
                }
            }
        }

        debug!(
            "Built mapper '{}' ({} mappings, {} computed)",
            self.id,
            self.mappings.len(),
            self.computed_dto.len() + self.computed_entity.len()
        );
        Ok(Mapper {
            id: self.id,
            mappings: self.mappings,
            computed_dto: self.computed_dto,
            computed_entity: self.computed_entity,
            ignored: self.ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;
    use serde::Deserialize;
    use serde_json::json;

    fn customer_mapper() -> Mapper {
        MapperBuilder::new("customer")
            .map("first_name", "firstName")
            .map("last_name", "lastName")
            .map_with(
                "birth_date",
                "birthDate",
                Some(Arc::new(|v: &Value| {
                    json!(v.as_str().map(|s| s.replace('/', "-")))
                })),
                Some(Arc::new(|v: &Value| {
                    json!(v.as_str().map(|s| s.replace('-', "/")))
                })),
            )
            .computed_dto("fullName", |entity| {
                let first = entity.get("firstName").and_then(Value::as_str).unwrap_or("");
                let last = entity.get("lastName").and_then(Value::as_str).unwrap_or("");
                json!(format!("{} {}", first, last).trim())
            })
            .ignore("uiState")
            .build()
            .unwrap()
    }

    #[test]
    fn test_to_dto_renames_copies_and_computes() {
        let entity = record(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "birthDate": "1815/12/10",
            "email": "ada@example.com",
            "uiState": {"expanded": true}
        }));
        let dto = customer_mapper().to_dto(&entity);
        assert_eq!(
            Value::Object(dto),
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "birth_date": "1815-12-10",
                "email": "ada@example.com",
                "fullName": "Ada Lovelace"
            })
        );
    }

    #[test]
    fn test_round_trip_reproduces_entity() {
        let mapper = customer_mapper();
        let entity = record(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "birthDate": "1815/12/10",
            "tags": ["math", "poetry"],
            "active": true
        }));
        assert_eq!(mapper.to_entity(&mapper.to_dto(&entity)), entity);
    }

    #[test]
    fn test_computed_dto_field_never_travels_back() {
        let mapper = customer_mapper();
        let dto = record(json!({"first_name": "Ada", "fullName": "Someone Else"}));
        let entity = mapper.to_entity(&dto);
        assert!(!entity.contains_key("fullName"));
        assert_eq!(entity["firstName"], "Ada");
    }

    #[test]
    fn test_ignored_fields_dropped_both_ways() {
        let mapper = customer_mapper();
        let dto = record(json!({"uiState": 1, "email": "x"}));
        assert!(!mapper.to_entity(&dto).contains_key("uiState"));
        assert!(mapper.is_ignored("uiState"));
    }

    #[test]
    fn test_computed_entity_field() {
        let mapper = MapperBuilder::new("order")
            .computed_entity("total", |dto| {
                let lines = dto.get("lines").and_then(Value::as_array);
                json!(lines.map_or(0, |lines| lines.len()))
            })
            .build()
            .unwrap();
        let entity = mapper.to_entity(&record(json!({"lines": [1, 2, 3]})));
        assert_eq!(entity["total"], 3);

        let dto = mapper.to_dto(&entity);
        assert!(!dto.contains_key("total"));
        assert_eq!(dto["lines"], json!([1, 2, 3]));
    }

    #[test]
    fn test_explicit_mapping_wins_over_same_name_copy() {
        let mapper = MapperBuilder::new("m").map("zz", "aa").build().unwrap();

        let dto = mapper.to_dto(&record(json!({"aa": "mapped", "zz": "implicit"})));
        assert_eq!(Value::Object(dto), json!({"zz": "mapped"}));

        let entity = mapper.to_entity(&record(json!({"zz": "mapped", "aa": "implicit"})));
        assert_eq!(Value::Object(entity), json!({"aa": "mapped"}));
    }

    #[test]
    fn test_list_variants_handle_none() {
        let mapper = customer_mapper();
        assert!(mapper.to_dto_list(None).is_empty());
        assert!(mapper.to_entity_list(None).is_empty());

        let entities = vec![record(json!({"firstName": "A"})), record(json!({"firstName": "B"}))];
        let dtos = mapper.to_dto_list(Some(&entities));
        assert_eq!(dtos.len(), 2);
        assert_eq!(dtos[1]["first_name"], "B");
    }

    #[test]
    fn test_typed_wrappers() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        #[serde(rename_all = "camelCase")]
        struct Person {
            first_name: String,
            last_name: String,
        }

        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct PersonDto {
            first_name: String,
            last_name: String,
            #[serde(rename = "fullName")]
            full_name: String,
        }

        let mapper = customer_mapper();
        let person = Person {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        };
        let dto: PersonDto = mapper.to_dto_as(&person).unwrap();
        assert_eq!(dto.full_name, "Ada Lovelace");

        let back: Person = mapper.to_entity_as(&dto).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn test_build_rejects_nameless_mapping() {
        let err = MapperBuilder::new("m").map("", "").build().unwrap_err();
        assert!(matches!(err, Error::MappingInvariant { .. }));
    }

    #[test]
    fn test_build_rejects_bad_computed_fields() {
        let nameless = MapperBuilder::new("m").computed_dto("", |_| Value::Null).build();
        assert!(matches!(nameless, Err(Error::MappingInvariant { .. })));

        let duplicate = MapperBuilder::new("m")
            .computed_dto("x", |_| Value::Null)
            .computed_dto("x", |_| Value::Null)
            .build();
        assert!(matches!(duplicate, Err(Error::MappingInvariant { .. })));

        let ignored = MapperBuilder::new("m")
            .computed_entity("x", |_| Value::Null)
            .ignore("x")
            .build();
        assert!(matches!(ignored, Err(Error::MappingInvariant { .. })));
    }

    #[test]
    fn test_one_sided_mapping_uses_same_name() {
        let mapper = MapperBuilder::new("m")
            .map_with("", "code", Some(Arc::new(|v: &Value| json!(v.to_string()))), None)
            .build()
            .unwrap();
        let dto = mapper.to_dto(&record(json!({"code": 7})));
        assert_eq!(dto["code"], "7");
    }
}
