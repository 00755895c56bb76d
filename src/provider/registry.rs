//! Process-wide provider registry: name -> provider, plus a configurable
//! default name. An explicit dependency handed to each gateway rather than a
//! hidden singleton; gateways only read from it.

use crate::provider::Provider;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    default_name: RwLock<String>,
}

impl ProviderRegistry {
    pub fn new(default_name: impl Into<String>) -> Self {
        ProviderRegistry {
            providers: RwLock::new(HashMap::new()),
            default_name: RwLock::new(default_name.into()),
        }
    }

    /// Register a provider under its own name, replacing any previous entry.
    pub fn register(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        self.providers
            .write()
            .expect("provider registry lock poisoned")
            .insert(name, provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("provider registry lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn default_name(&self) -> String {
        self.default_name
            .read()
            .expect("provider registry lock poisoned")
            .clone()
    }

    pub fn set_default_name(&self, name: impl Into<String>) {
        *self
            .default_name
            .write()
            .expect("provider registry lock poisoned") = name.into();
    }
}
