//! In-memory driver used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hive_rdbc::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared observation state for a [`MockDriver`] and its connections
#[derive(Debug, Default)]
pub struct MockState {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub next_id: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub invalid: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    pub urls: Mutex<Vec<String>>,
    pub validations: AtomicUsize,
    pub validation_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockState {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Make every connection (existing and future) report itself as broken
    pub fn set_invalid(&self, invalid: bool) {
        self.invalid.store(invalid, Ordering::SeqCst);
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }

    /// Hold every `is_valid` call until the returned gate is notified
    pub fn gate_validation(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.validation_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }
}

pub struct MockDriver {
    class_name: String,
    pub state: Arc<MockState>,
}

impl MockDriver {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            state: Arc::new(MockState::default()),
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection("connection refused"));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state
            .urls
            .lock()
            .push(config.url.expose_secret().to_string());
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(MockConnection {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Connection whose `execute` returns its own id
pub struct MockConnection {
    id: usize,
    state: Arc<MockState>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.state
            .calls
            .lock()
            .push(format!("{}:execute:{}", self.id, sql));
        Ok(self.id as u64)
    }

    async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.state
            .calls
            .lock()
            .push(format!("{}:auto_commit:{}", self.id, enabled));
        Ok(())
    }

    async fn set_schema(&self, schema: &str) -> Result<()> {
        self.state
            .calls
            .lock()
            .push(format!("{}:schema:{}", self.id, schema));
        Ok(())
    }

    async fn is_valid(&self) -> bool {
        self.state.validations.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.validation_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        !self.state.invalid.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A fresh registry holding one mock driver under `class_name`
pub fn registry_with(class_name: &str) -> (Arc<DriverRegistry>, Arc<MockState>) {
    let driver = MockDriver::new(class_name);
    let state = Arc::clone(&driver.state);
    let registry = Arc::new(DriverRegistry::new());
    registry.register(Arc::new(driver));
    (registry, state)
}
