//! Id -> artifact registries for pages, routes and mappers
//!
//! Registries are plain values passed into contexts. [`Registries::global`]
//! exists for the outermost composition point of an application only.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};

use formwork_core::prelude::*;

use crate::context::PageConfig;
use crate::mapper::Mapper;

/// A route entry; no URL matching is performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    pub path: String,
    pub page_id: String,
}

/// Thread-safe map from id to a shared artifact
#[derive(Debug)]
pub struct Registry<T> {
    kind: &'static str,
    entries: RwLock<BTreeMap<String, Arc<T>>>,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add an artifact; ids are unique per registry
    pub fn register(&self, id: impl Into<String>, artifact: T) -> Result<Arc<T>> {
        let id = id.into();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&id) {
            return Err(Error::registry(format!(
                "{} '{}' is already registered",
                self.kind, id
            )));
        }
        let artifact = Arc::new(artifact);
        entries.insert(id.clone(), Arc::clone(&artifact));
        debug!("Registered {} '{}'", self.kind, id);
        Ok(artifact)
    }

    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(id)
    }

    /// All artifacts, ordered by id
    pub fn get_all(&self) -> Vec<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

/// The registry set a context is bound to
#[derive(Debug)]
pub struct Registries {
    pub pages: Registry<PageConfig>,
    pub routes: Registry<RouteDefinition>,
    pub mappers: Registry<Mapper>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<Arc<Registries>> = LazyLock::new(|| Arc::new(Registries::new()));

impl Registries {
    pub fn new() -> Self {
        Self {
            pages: Registry::new("page"),
            routes: Registry::new("route"),
            mappers: Registry::new("mapper"),
        }
    }

    /// Process-wide instance
    pub fn global() -> Arc<Registries> {
        Arc::clone(&GLOBAL)
    }

    pub fn clear_all(&self) {
        self.pages.clear();
        self.routes.clear();
        self.mappers.clear();
    }

    /// Page registered for a route id
    pub fn page_for_route(&self, route_id: &str) -> Option<Arc<PageConfig>> {
        let route = self.routes.get(route_id)?;
        self.pages.get(&route.page_id)
    }
}

/// Second phase of the construct -> register lifecycle
pub trait Registrable: Sized {
    fn register(self, registries: &Registries) -> Result<Arc<Self>>;
}

impl Registrable for Mapper {
    fn register(self, registries: &Registries) -> Result<Arc<Self>> {
        let id = self.id.clone();
        registries.mappers.register(id, self)
    }
}

impl Registrable for PageConfig {
    /// Registers the page and, when it declares a path, a route with the page's id
    fn register(self, registries: &Registries) -> Result<Arc<Self>> {
        let id = self.id.clone();
        if let Some(path) = &self.route {
            if registries.routes.has(&id) {
                return Err(Error::registry(format!("route '{}' is already registered", id)));
            }
            let route = RouteDefinition {
                path: path.clone(),
                page_id: id.clone(),
            };
            let page = registries.pages.register(id.clone(), self)?;
            registries.routes.register(id, route)?;
            return Ok(page);
        }
        registries.pages.register(id, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MapperBuilder;
    use crate::schema::FormBuilder;
    use serial_test::serial;

    fn page(id: &str) -> PageConfig {
        let form = FormBuilder::new(id).build().unwrap();
        PageConfig::new(id, form)
    }

    #[test]
    fn test_register_and_query() {
        let registries = Registries::new();
        page("people").route("/people").register(&registries).unwrap();
        page("settings").register(&registries).unwrap();

        assert!(registries.pages.has("people"));
        assert_eq!(registries.pages.len(), 2);
        assert_eq!(registries.pages.ids(), vec!["people", "settings"]);
        assert_eq!(
            registries.routes.get("people").unwrap().path,
            "/people".to_string()
        );
        assert!(!registries.routes.has("settings"));
        assert_eq!(registries.page_for_route("people").unwrap().id, "people");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registries = Registries::new();
        let mapper = || MapperBuilder::new("m").build().unwrap();
        mapper().register(&registries).unwrap();
        let err = mapper().register(&registries).unwrap_err();
        assert!(matches!(err, Error::Registry { .. }));
        assert_eq!(registries.mappers.get_all().len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let registries = Registries::new();
        page("p").route("/p").register(&registries).unwrap();
        registries.clear_all();
        assert!(registries.pages.is_empty());
        assert!(registries.routes.is_empty());
        assert!(registries.pages.get("p").is_none());
    }

    #[test]
    #[serial]
    fn test_global_is_shared() {
        let global = Registries::global();
        global.clear_all();
        page("global-page").register(&global).unwrap();
        assert!(Registries::global().pages.has("global-page"));
        global.clear_all();
    }
}
