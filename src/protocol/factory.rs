use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::formats::{JsonCallFormat, MorphTagFormat, StrictTagFormat};
use super::traits::ToolCallFormat;

type FormatCreator = Arc<dyn Fn() -> Arc<dyn ToolCallFormat> + Send + Sync>;

/// Registry of dialects by name, with aliases and instance caching.
pub struct FormatRegistry {
    creators: RwLock<HashMap<String, FormatCreator>>,
    aliases: RwLock<HashMap<String, String>>,
    instances: RwLock<HashMap<String, Arc<dyn ToolCallFormat>>>,
    default_format: RwLock<String>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            creators: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            default_format: RwLock::new(String::from("strict")),
        }
    }

    pub fn register<F>(&self, name: &str, creator: F)
    where
        F: Fn() -> Arc<dyn ToolCallFormat> + Send + Sync + 'static,
    {
        if let Ok(mut creators) = self.creators.write() {
            creators.insert(name.to_string(), Arc::new(creator));
        }
    }

    pub fn register_alias(&self, alias: &str, target: &str) {
        if let Ok(mut aliases) = self.aliases.write() {
            aliases.insert(alias.to_string(), target.to_string());
        }
    }

    pub fn set_default(&self, name: &str) {
        if let Ok(mut default) = self.default_format.write() {
            *default = name.to_string();
        }
    }

    fn resolve(&self, name: &str) -> String {
        self.aliases
            .read()
            .ok()
            .and_then(|aliases| aliases.get(name).cloned())
            .unwrap_or_else(|| name.to_string())
    }

    /// Look up a dialect by name or alias. Instances are cached; every call
    /// for the same name returns the same instance.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolCallFormat>> {
        let resolved = self.resolve(name);
        if let Ok(instances) = self.instances.read() {
            if let Some(instance) = instances.get(&resolved) {
                return Some(instance.clone());
            }
        }
        let creator = self.creators.read().ok()?.get(&resolved)?.clone();
        let instance = creator();
        if let Ok(mut instances) = self.instances.write() {
            instances.insert(resolved, instance.clone());
        }
        Some(instance)
    }

    pub fn default_format(&self) -> Option<Arc<dyn ToolCallFormat>> {
        let name = self.default_format.read().ok()?.clone();
        self.get(&name)
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.creators
            .read()
            .map(|creators| creators.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory pre-loaded with the built-in dialects.
pub struct FormatFactory {
    registry: FormatRegistry,
}

impl FormatFactory {
    pub fn new() -> Self {
        let registry = FormatRegistry::new();

        registry.register("strict", || Arc::new(StrictTagFormat) as Arc<dyn ToolCallFormat>);
        registry.register("morph", || Arc::new(MorphTagFormat) as Arc<dyn ToolCallFormat>);
        registry.register("json", || Arc::new(JsonCallFormat) as Arc<dyn ToolCallFormat>);

        registry.register_alias("xml", "strict");
        registry.register_alias("morph-xml", "morph");
        registry.register_alias("hermes", "json");

        registry.set_default("strict");
        Self { registry }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolCallFormat>> {
        self.registry.get(name)
    }

    pub fn default_format(&self) -> Option<Arc<dyn ToolCallFormat>> {
        self.registry.default_format()
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }
}

impl Default for FormatFactory {
    fn default() -> Self {
        Self::new()
    }
}
