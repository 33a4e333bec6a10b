//! Scan orchestration engine
//!
//! Drives a scan through Initializing → Crawling → ModuleExecution →
//! Finalizing. Only a setup-phase failure (bad configuration, unusable
//! root URL) crosses `run`'s boundary as an error; every module failure
//! is folded into the returned ScanResult as an error-status
//! ModuleResult so a partially failed scan is still a successful run.

use crate::cache::ScanCache;
use crate::context::TestContext;
use crate::crawler::Crawler;
use crate::error::{Result, VigilError};
use crate::http::HttpClient;
use crate::models::{ModuleResult, ScanConfig, ScanResult, ScanState};
use crate::progress::ScanStats;
use crate::registry::{ModuleRegistry, TestModule};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct ScanEngine {
    registry: ModuleRegistry,
    stats: Arc<ScanStats>,
    cancel: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            stats: Arc::new(ScanStats::new()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Engine with all built-in modules registered
    pub fn with_builtins() -> Self {
        Self::new(ModuleRegistry::with_builtins())
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Shared counters for a display collaborator to poll
    pub fn stats(&self) -> Arc<ScanStats> {
        Arc::clone(&self.stats)
    }

    /// Handle that a signal handler can flip to cancel the scan.
    /// In-flight fetches and modules finish naturally; nothing new
    /// is spawned once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Runs a complete scan
    pub async fn run(&self, config: &ScanConfig) -> Result<ScanResult> {
        self.stats.set_phase(ScanState::Initializing);
        if config.target.is_empty() {
            return Err(VigilError::ConfigError("no target URL given".to_string()));
        }

        let mut result = ScanResult::new(&config.target);
        let client = HttpClient::from_config(config)?;
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ScanCache::from_config(&config.cache)));
        let crawler = Crawler::new(
            client.clone(),
            cache.clone(),
            config,
            Arc::clone(&self.stats),
            Arc::clone(&self.cancel),
        )?;

        self.stats.set_phase(ScanState::Crawling);
        result.status = ScanState::Crawling;
        info!("Starting crawl of {}", config.target);
        let outcome = match crawler.crawl(&config.target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.set_phase(ScanState::Failed);
                result.status = ScanState::Failed;
                return Err(e);
            }
        };
        let urls_crawled = outcome.pages.len();
        let api_endpoints = outcome.api_endpoints.len();
        info!("Crawl discovered {urls_crawled} pages, {api_endpoints} API endpoints");

        let context = match TestContext::from_crawl(config, outcome) {
            Ok(context) => Arc::new(context),
            Err(e) => {
                self.stats.set_phase(ScanState::Failed);
                result.status = ScanState::Failed;
                return Err(e);
            }
        };

        self.stats.set_phase(ScanState::ModuleExecution);
        result.status = ScanState::ModuleExecution;
        let modules = self.registry.enabled_modules(config);
        self.stats.set_modules_total(modules.len());
        self.stats.begin_task("modules", modules.len());

        let module_results = if config.parallel_modules {
            self.run_parallel(modules, &client, &context).await
        } else {
            self.run_sequential(modules, &client, &context).await
        };

        self.stats.set_phase(ScanState::Finalizing);
        result.status = ScanState::Finalizing;
        if let Some(cache) = &cache {
            let stats = cache.stats();
            debug!(
                "Cache: {} hits ({} memory / {} shared / {} disk), {} misses, {} evictions",
                stats.hits,
                stats.memory_hits,
                stats.remote_hits,
                stats.disk_hits,
                stats.misses,
                stats.evictions
            );
        }

        result.module_results = module_results;
        result.finalize(urls_crawled, api_endpoints, client.request_count());
        self.stats.set_phase(ScanState::Completed);
        info!(
            "Scan complete: {} findings across {} modules",
            result.summary.total_findings, result.summary.modules_executed
        );
        Ok(result)
    }

    /// Runs modules one at a time in registration order
    async fn run_sequential(
        &self,
        modules: Vec<Box<dyn TestModule>>,
        client: &HttpClient,
        context: &Arc<TestContext>,
    ) -> Vec<ModuleResult> {
        let mut results = Vec::with_capacity(modules.len());
        for module in modules {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("Scan cancelled; skipping remaining modules");
                break;
            }
            let name = module.name().to_string();
            self.stats.set_current_module(&name);
            let handle = tokio::spawn(execute_module(
                module,
                client.clone(),
                Arc::clone(context),
            ));
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Module '{name}' task panicked: {e}");
                    ModuleResult::from_error(&name, format!("module task panicked: {e}"))
                }
            };
            self.stats.record_module_completed(&result.summary);
            results.push(result);
        }
        results
    }

    /// Launches every module concurrently over the shared context and
    /// waits for all of them; a failing module never cancels siblings.
    async fn run_parallel(
        &self,
        modules: Vec<Box<dyn TestModule>>,
        client: &HttpClient,
        context: &Arc<TestContext>,
    ) -> Vec<ModuleResult> {
        let mut handles = Vec::with_capacity(modules.len());
        for module in modules {
            let name = module.name().to_string();
            let handle = tokio::spawn(execute_module(
                module,
                client.clone(),
                Arc::clone(context),
            ));
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Module '{name}' task panicked: {e}");
                    ModuleResult::from_error(&name, format!("module task panicked: {e}"))
                }
            };
            self.stats.record_module_completed(&result.summary);
            results.push(result);
        }
        results
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Runs one module's full setup/run/teardown cycle. Errors in setup or
/// run become an error-status result with zero findings; teardown is
/// always invoked so module-held resources are released either way.
async fn execute_module(
    module: Box<dyn TestModule>,
    client: HttpClient,
    context: Arc<TestContext>,
) -> ModuleResult {
    let name = module.name().to_string();
    info!("Executing module: {name}");

    let mut result = match module.setup().await {
        Err(e) => {
            error!("Module '{name}' setup failed: {e}");
            ModuleResult::from_error(&name, format!("setup failed: {e}"))
        }
        Ok(()) => match module.run(&client, &context).await {
            Ok(result) => {
                info!(
                    "Module '{name}' completed: {} findings",
                    result.summary.total()
                );
                result
            }
            Err(e) => {
                error!("Module '{name}' failed: {e}");
                ModuleResult::from_error(&name, e.to_string())
            }
        },
    };

    if let Err(e) = module.teardown().await {
        warn!("Module '{name}' teardown failed: {e}");
    }

    if result.finished_at.is_none() {
        result.mark_completed();
    }
    result
}
