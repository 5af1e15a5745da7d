//! Driver registry
//!
//! Maps fully-qualified driver class names to [`Driver`] implementations.
//! Pools resolve their driver lazily, on the first physical connect, so a
//! source can be assembled before its driver is registered.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::connection::Driver;
use crate::error::{Error, Result};

static GLOBAL_REGISTRY: LazyLock<Arc<DriverRegistry>> =
    LazyLock::new(|| Arc::new(DriverRegistry::new()));

/// Registry of drivers keyed by class name
#[derive(Default)]
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<DriverRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Register a driver under its class name, replacing any previous entry
    pub fn register(&self, driver: Arc<dyn Driver>) {
        let name = driver.class_name().to_string();
        debug!(driver = %name, "registering driver");
        self.drivers.write().insert(name, driver);
    }

    /// Remove a driver; returns whether it was registered
    pub fn deregister(&self, class_name: &str) -> bool {
        self.drivers.write().remove(class_name).is_some()
    }

    /// Resolve a driver by class name
    pub fn resolve(&self, class_name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| Error::DriverNotFound {
                driver: class_name.to_string(),
            })
    }

    /// Whether a driver is registered under this class name
    pub fn contains(&self, class_name: &str) -> bool {
        self.drivers.read().contains_key(class_name)
    }

    /// Registered class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.class_names())
            .finish()
    }
}
