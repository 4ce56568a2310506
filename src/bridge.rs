//! Turns host tab events into transitions, observer calls and matching passes.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::injector::PendingDelivery;
use crate::orchestrator::Orchestrator;
use crate::state::SharedContext;
use crate::tab::{ChangeInfo, Tab, TabId, Transition};

pub type TransitionCallback = Arc<dyn Fn(&Tab, Transition) + Send + Sync>;

struct TransitionObserver {
    callback: TransitionCallback,
    kinds: Option<HashSet<Transition>>,
}

impl TransitionObserver {
    fn wants(&self, kind: Transition) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

#[derive(Clone)]
pub struct EventBridge {
    context: SharedContext,
    orchestrator: Orchestrator,
    observers: Arc<Mutex<Vec<TransitionObserver>>>,
}

impl EventBridge {
    pub fn new(context: SharedContext, orchestrator: Orchestrator) -> Self {
        Self {
            context,
            orchestrator,
            observers: Arc::default(),
        }
    }

    /// Observers cannot be removed once added.
    pub fn add_transition_observer<F>(&self, callback: F, kinds: Option<&[Transition]>)
    where
        F: Fn(&Tab, Transition) + Send + Sync + 'static,
    {
        self.observers.lock().push(TransitionObserver {
            callback: Arc::new(callback),
            kinds: kinds.map(|kinds| kinds.iter().copied().collect()),
        });
    }

    /// Handles a tab update. Only completed loads with a URL are acted on;
    /// anything else returns no deliveries.
    pub fn tab_updated(&self, tab_id: TabId, info: &ChangeInfo, tab: &Tab) -> Vec<PendingDelivery> {
        if !info.is_complete() {
            return Vec::new();
        }
        let Some(url) = tab.url() else {
            return Vec::new();
        };

        let kind = self.context.tabs.lock().observed(tab_id, url);
        debug!(tab_id, url, transition = %kind, "tab changed");
        self.notify(tab, kind);

        self.orchestrator.run_pass(tab, None)
    }

    /// Handles a closed tab. Observers get a tab carrying the id and the last
    /// URL seen for it, if any.
    pub fn tab_removed(&self, tab_id: TabId) {
        let (kind, url) = self.context.tabs.lock().closed(tab_id);
        debug!(tab_id, transition = %kind, "tab closed");
        let tab = Tab {
            id: tab_id,
            url,
            ..Tab::default()
        };
        self.notify(&tab, kind);
    }

    fn notify(&self, tab: &Tab, kind: Transition) {
        let callbacks: Vec<TransitionCallback> = self
            .observers
            .lock()
            .iter()
            .filter(|observer| observer.wants(kind))
            .map(|observer| observer.callback.clone())
            .collect();
        for callback in callbacks {
            callback(tab, kind);
        }
    }
}
