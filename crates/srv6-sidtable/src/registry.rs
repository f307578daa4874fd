//! Named store registry modeling datapath pinning.
//!
//! A kernel-resident table survives the control-plane process because it is
//! registered ("pinned") under a stable name. The registry reproduces that
//! contract for [`SidStore`] handles: create registers a store under its
//! name, attach looks it up, and attaching to an unknown name fails.

use crate::store::SidStore;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry of pinned stores, keyed by table name.
#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<dyn SidStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins a store under `name`, replacing any previous registration.
    pub fn register(&self, name: &str, store: Arc<dyn SidStore>) {
        self.stores.lock().unwrap().insert(name.to_string(), store);
    }

    /// Attaches to a pinned store, or `None` if the name is unknown.
    pub fn attach(&self, name: &str) -> Option<Arc<dyn SidStore>> {
        self.stores.lock().unwrap().get(name).cloned()
    }

    /// Removes a pin. Existing handles keep working; only re-attachment is
    /// affected. Used by tests to simulate a fresh node.
    pub fn unregister(&self, name: &str) -> bool {
        self.stores.lock().unwrap().remove(name).is_some()
    }
}

static GLOBAL: Lazy<StoreRegistry> = Lazy::new(StoreRegistry::new);

/// Process-wide registry used by default daemon wiring.
pub fn global_registry() -> &'static StoreRegistry {
    &GLOBAL
}
