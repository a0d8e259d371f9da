//! Feature modules and their startup hooks
//!
//! Every active module gets `register_services` called once, in order, then
//! `configure_pipeline` called once, in the same order. The first failure
//! aborts startup; there is no partially activated module list.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::context::HostContext;
use crate::error::{HostError, Result};

/// Hosting environment handed to `configure_pipeline`
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub name: String,
    pub content_root: PathBuf,
    /// Static file root
    pub web_root: PathBuf,
}

impl HostEnvironment {
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            name: config.environment.clone(),
            content_root: config.content_root.clone(),
            web_root: config.content_root.join("wwwroot"),
        }
    }

    pub fn is_development(&self) -> bool {
        self.name.eq_ignore_ascii_case("development")
    }
}

type ServiceMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Services collected while modules register
#[derive(Default)]
pub struct ServiceCollection {
    services: ServiceMap,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any earlier one of the same type
    pub fn add<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        self.add_shared(Arc::new(service))
    }

    pub fn add_shared<T: Any + Send + Sync>(&mut self, service: Arc<T>) -> &mut Self {
        if self.services.insert(TypeId::of::<T>(), service).is_some() {
            debug!("Replaced service {}", type_name::<T>());
        }
        self
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        lookup(&self.services)
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Freeze the collection
    pub fn build(self) -> Services {
        Services {
            services: self.services,
        }
    }
}

/// Read-only services available to request handlers
#[derive(Default)]
pub struct Services {
    services: ServiceMap,
}

impl Services {
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        lookup(&self.services)
    }

    /// Like `get`, but a missing service is an error
    pub fn require<T: Any + Send + Sync>(&self) -> anyhow::Result<Arc<T>> {
        self.get::<T>()
            .ok_or_else(|| anyhow::anyhow!("Service {} is not registered", type_name::<T>()))
    }
}

fn lookup<T: Any + Send + Sync>(services: &ServiceMap) -> Option<Arc<T>> {
    services
        .get(&TypeId::of::<T>())
        .cloned()
        .and_then(|service| service.downcast::<T>().ok())
}

/// State shared by every routed handler
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<HostContext>,
    pub services: Arc<Services>,
}

/// A feature unit plugged into the host
pub trait HostModule: Send + Sync {
    fn name(&self) -> &str;

    /// Register the module's services
    fn register_services(
        &self,
        _services: &mut ServiceCollection,
        _context: &HostContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Add the module's routes and layers
    fn configure_pipeline(
        &self,
        router: Router<AppState>,
        _env: &HostEnvironment,
    ) -> anyhow::Result<Router<AppState>> {
        Ok(router)
    }
}

/// Factory for a named module
pub type ModuleFactory = fn() -> Arc<dyn HostModule>;

/// Known modules, looked up by case-insensitive name
#[derive(Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, factory: ModuleFactory) -> Self {
        self.factories.insert(name.to_ascii_lowercase(), factory);
        self
    }

    pub fn create(&self, name: &str) -> Option<Arc<dyn HostModule>> {
        self.factories
            .get(&name.trim().to_ascii_lowercase())
            .map(|factory| factory())
    }
}

/// Ordered set of active modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn HostModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve module names against a catalog, keeping their order
    pub fn from_names(names: &[String], catalog: &ModuleCatalog) -> Result<Self> {
        let mut registry = Self::new();
        for name in names {
            if registry.contains(name) {
                warn!("Module {} listed more than once, ignoring duplicate", name);
                continue;
            }
            let module = catalog
                .create(name)
                .ok_or_else(|| HostError::module(name.as_str(), anyhow::anyhow!("unknown module")))?;
            registry.push(module);
        }
        Ok(registry)
    }

    pub fn push(&mut self, module: Arc<dyn HostModule>) {
        self.modules.push(module);
    }

    pub fn with_module(mut self, module: impl HostModule + 'static) -> Self {
        self.push(Arc::new(module));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules
            .iter()
            .any(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Run every module's `register_services` hook in order
    pub fn register_all(
        &self,
        services: &mut ServiceCollection,
        context: &HostContext,
    ) -> Result<()> {
        for module in &self.modules {
            debug!("Registering services for module {}", module.name());
            module
                .register_services(services, context)
                .map_err(|e| HostError::module(module.name(), e))?;
        }
        info!("Registered services for {} module(s)", self.modules.len());
        Ok(())
    }

    /// Run every module's `configure_pipeline` hook in order
    pub fn configure_all(
        &self,
        mut router: Router<AppState>,
        env: &HostEnvironment,
    ) -> Result<Router<AppState>> {
        for module in &self.modules {
            debug!("Configuring pipeline for module {}", module.name());
            router = module
                .configure_pipeline(router, env)
                .map_err(|e| HostError::module(module.name(), e))?;
        }
        info!("Configured pipeline for {} module(s)", self.modules.len());
        Ok(router)
    }
}
