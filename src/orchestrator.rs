use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::Result;
use crate::injector::{Injector, PendingDelivery};
use crate::registry::Namespace;
use crate::state::SharedContext;
use crate::tab::{InjectOptions, Tab};

/// Resolves which rule groups apply to a tab and hands them to the injector.
#[derive(Clone)]
pub struct Orchestrator {
    context: SharedContext,
    injector: Injector,
}

impl Orchestrator {
    pub fn new(context: SharedContext, injector: Injector) -> Self {
        Self { context, injector }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Runs one matching pass over `tab`. Each match group is delivered at
    /// most once, using the first matching rule in registration order.
    pub fn run_pass(&self, tab: &Tab, namespace: Option<&Namespace>) -> Vec<PendingDelivery> {
        // Predicates run user code, so match against a snapshot.
        let rules = self.context.registry.lock().snapshot();

        let mut delivered = HashSet::new();
        let mut deliveries = Vec::new();
        for rule in rules {
            if namespace.is_some_and(|ns| !rule.in_namespace(ns)) {
                continue;
            }
            if !rule.matches(tab) {
                continue;
            }
            if !delivered.insert(rule.match_group) {
                continue;
            }

            debug!(
                tab_id = tab.id,
                match_group = %rule.match_group,
                namespace = ?rule.namespace(),
                "rule matched"
            );
            deliveries.push(self.injector.inject(
                &rule.bundle.scripts,
                &rule.bundle.stylesheets,
                tab,
                rule.bundle.callback.clone(),
                InjectOptions::default(),
            ));
        }
        deliveries
    }

    /// Runs a pass over every open tab that has a URL. Used after registering
    /// rules while tabs are already open.
    pub async fn replay_all(&self, namespace: Option<&Namespace>) -> Result<Vec<PendingDelivery>> {
        let tabs = self.injector.host().query_tabs().await?;
        let mut deliveries = Vec::new();
        for tab in tabs.iter().filter(|tab| tab.url().is_some()) {
            deliveries.extend(self.run_pass(tab, namespace));
        }
        info!(
            tabs = tabs.len(),
            deliveries = deliveries.len(),
            namespace = ?namespace,
            "replayed existing tabs"
        );
        Ok(deliveries)
    }
}
