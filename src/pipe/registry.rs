use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use smol_str::SmolStr;

use crate::pipe::record::{Record, RecordBuilder};
use crate::pipe::value::ValueBuilder;
use crate::pipe::Builder;

/// Makes a fresh builder; receives the registry (for nested lookups) and
/// the name or tag it was requested under.
pub type Factory = dyn Fn(&Arc<Registry>, &[u8]) -> Box<dyn Builder> + Send + Sync;

/// Explicit mapping from type names to builder factories.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<SmolStr, Box<Factory>>,
    records: HashMap<TypeId, SmolStr>,
    fallback: Option<Box<Factory>>,
}

impl Registry {
    /// An empty registry: every unknown name is declined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value builders for the map and list tags, with a map-or-list fallback
    /// for any other tag.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for name in ["M", "$M"] {
            registry.register(name, |_, _| Box::new(ValueBuilder::map()));
        }
        for name in ["L", "A", "$L"] {
            registry.register(name, |_, _| Box::new(ValueBuilder::list()));
        }
        registry.with_fallback(|_, tag| Box::new(ValueBuilder::for_tag(tag)))
    }

    /// Shared [`Registry::standard`] instance.
    pub fn global() -> &'static Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Registry::standard()))
    }

    pub fn register<F>(&mut self, name: impl Into<SmolStr>, factory: F) -> &mut Self
    where
        F: Fn(&Arc<Registry>, &[u8]) -> Box<dyn Builder> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Registers `T` under `name`; a root decoding into `T` targets it.
    pub fn register_record<T: Record>(&mut self, name: impl Into<SmolStr>) -> &mut Self {
        let name = name.into();
        self.records.insert(TypeId::of::<T>(), name.clone());
        self.register(name, |registry, _| {
            Box::new(RecordBuilder::<T>::new(Arc::clone(registry)))
        })
    }

    pub fn with_fallback<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arc<Registry>, &[u8]) -> Box<dyn Builder> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Name `T` was registered under with [`Registry::register_record`].
    pub fn name_of<T: 'static>(&self) -> Option<&SmolStr> {
        self.records.get(&TypeId::of::<T>())
    }

    pub fn builder(self: &Arc<Self>, name: &[u8]) -> Option<Box<dyn Builder>> {
        let factory = std::str::from_utf8(name)
            .ok()
            .and_then(|name| self.factories.get(name))
            .or(self.fallback.as_ref())?;
        Some(factory(self, name))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(SmolStr::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry")
            .field("names", &names)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
