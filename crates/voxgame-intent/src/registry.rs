use crate::service_trait::IntentService;
use std::collections::HashMap;
use voxgame_core::ServiceError;

type ServiceFactory = fn() -> Box<dyn IntentService>;

/// Maps `service.engine` names to back-end constructors.
pub struct ServiceRegistry {
    factories: HashMap<String, ServiceFactory>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", || Box::new(crate::null_service::NullService::new()));
        registry.register("scripted", || {
            Box::new(crate::scripted_service::ScriptedService::new())
        });
        #[cfg(feature = "dialogflow")]
        registry.register("dialogflow", || {
            Box::new(crate::dialogflow_service::DialogflowService::new())
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: ServiceFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Build an uninitialized service; call `initialize` before use.
    pub fn create(&self, name: &str) -> Result<Box<dyn IntentService>, ServiceError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| ServiceError::ServiceNotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn list_services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
