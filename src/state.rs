use std::sync::Arc;

use parking_lot::Mutex;

use crate::classifier::TabStates;
use crate::registry::Registry;

/// Owns the rule registry and the per-tab URL table for one process.
///
/// Locks are only held for the duration of a single table operation.
#[derive(Debug, Default)]
pub struct Context {
    pub registry: Mutex<Registry>,
    pub tabs: Mutex<TabStates>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every rule and every tracked tab.
    pub fn clear(&self) {
        self.registry.lock().clear();
        self.tabs.lock().clear();
    }
}

pub type SharedContext = Arc<Context>;
