//! Test module contract and static registry

use crate::context::TestContext;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::{ModuleResult, ScanConfig};
use async_trait::async_trait;

/// Contract every test module implements. `setup` and `teardown` frame
/// each `run`; `teardown` is invoked even when `run` fails.
#[async_trait]
pub trait TestModule: Send + Sync {
    /// Registry name, also used for `modules.<name>.enabled` lookup
    fn name(&self) -> &str;

    /// One-line description of what this module checks
    fn description(&self) -> &str;

    /// Acquires any module-held resource before `run`
    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    /// Executes the module against the frozen context. The client is
    /// the module's `make_request` surface for its own probing.
    async fn run(&self, client: &HttpClient, context: &TestContext) -> Result<ModuleResult>;

    /// Releases module-held resources; always invoked
    async fn teardown(&self) -> Result<()> {
        Ok(())
    }
}

/// Constructor for one registered module
pub type ModuleFactory = fn() -> Box<dyn TestModule>;

struct Registration {
    name: &'static str,
    factory: ModuleFactory,
}

/// Explicit name→factory map populated at program initialization.
/// Registration order is preserved and defines sequential execution
/// order; registering an existing name replaces that entry in place.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<Registration>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in module registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("headers", || {
            Box::new(crate::modules::headers::HeadersModule)
        });
        registry.register("seo", || Box::new(crate::modules::seo::SeoModule));
        registry.register("perf", || {
            Box::new(crate::modules::perf::PerfModule::default())
        });
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: ModuleFactory) {
        match self.entries.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.factory = factory,
            None => self.entries.push(Registration { name, factory }),
        }
    }

    /// Registered (name, description) pairs in registration order
    pub fn list(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|r| {
                let module = (r.factory)();
                (module.name().to_string(), module.description().to_string())
            })
            .collect()
    }

    /// Instantiates the modules enabled by configuration, in
    /// registration order.
    pub fn enabled_modules(&self, config: &ScanConfig) -> Vec<Box<dyn TestModule>> {
        self.entries
            .iter()
            .filter(|r| config.module_enabled(r.name))
            .map(|r| (r.factory)())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleSettings;

    #[test]
    fn test_builtins_registered_in_order() {
        let registry = ModuleRegistry::with_builtins();
        let names: Vec<String> = registry.list().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["headers", "seo", "perf"]);
    }

    #[test]
    fn test_enabled_filter() {
        let registry = ModuleRegistry::with_builtins();
        let mut config = ScanConfig::default();
        config
            .modules
            .insert("seo".to_string(), ModuleSettings { enabled: false });

        let enabled: Vec<String> = registry
            .enabled_modules(&config)
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(enabled, vec!["headers", "perf"]);
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut registry = ModuleRegistry::with_builtins();
        let before = registry.len();
        registry.register("seo", || Box::new(crate::modules::seo::SeoModule));
        assert_eq!(registry.len(), before);
    }
}
