use std::sync::Arc;

use tracing::info;

use crate::bridge::EventBridge;
use crate::error::Result;
use crate::host::TabHost;
use crate::injector::{InjectionFailure, Injector, PendingDelivery};
use crate::matcher::Matcher;
use crate::orchestrator::Orchestrator;
use crate::registry::{MatchGroupId, Namespace, ResourceBundle, TabCallback};
use crate::state::{Context, SharedContext};
use crate::tab::{ChangeInfo, InjectOptions, Tab, TabId, Transition};

/// Entry point for the rest of the extension: rule registration, one-off
/// injection, transition observers and the host event hooks.
///
/// Script deliveries run as Tokio tasks. [`on_tab_updated`] (when a rule
/// matches), [`load_content_scripts_in_tab`] and
/// [`load_content_resources_in_tab`] spawn one and panic if called outside a
/// Tokio runtime. Registration, tab removal, stylesheet-only loads and
/// updates that match nothing need no runtime.
///
/// [`on_tab_updated`]: Self::on_tab_updated
/// [`load_content_scripts_in_tab`]: Self::load_content_scripts_in_tab
/// [`load_content_resources_in_tab`]: Self::load_content_resources_in_tab
#[derive(Clone)]
pub struct ContentResources {
    context: SharedContext,
    orchestrator: Orchestrator,
    bridge: EventBridge,
}

impl ContentResources {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        let context = Arc::new(Context::new());
        let orchestrator = Orchestrator::new(context.clone(), Injector::new(host));
        let bridge = EventBridge::new(context.clone(), orchestrator.clone());
        Self {
            context,
            orchestrator,
            bridge,
        }
    }

    /// Registers `bundle` for every tab whose URL matches any of `matchers`.
    ///
    /// All matchers form one match group: a tab matching several of them
    /// still gets the bundle once per pass.
    pub fn register_content_resources_for_tab_urls<I>(
        &self,
        matchers: I,
        bundle: ResourceBundle,
    ) -> Result<MatchGroupId>
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        let namespace = bundle.namespace.clone();
        let group = self.context.registry.lock().register(matchers, bundle)?;
        info!(match_group = %group, namespace = ?namespace, "registered content resources");
        Ok(group)
    }

    pub fn unregister_content_resources_by_namespace(&self, namespace: &Namespace) -> usize {
        let removed = self.context.registry.lock().unregister_namespace(namespace);
        info!(%namespace, removed, "unregistered content resources");
        removed
    }

    /// Runs the matching pass against every tab that is already open,
    /// optionally restricted to one namespace.
    pub async fn execute_existing_tab_load_matches(
        &self,
        namespace: Option<&Namespace>,
    ) -> Result<Vec<PendingDelivery>> {
        self.orchestrator.replay_all(namespace).await
    }

    pub fn load_content_scripts_in_tab(
        &self,
        scripts: &[String],
        tab: &Tab,
        callback: Option<TabCallback>,
        options: InjectOptions,
    ) -> PendingDelivery {
        self.orchestrator
            .injector()
            .inject(scripts, &[], tab, callback, options)
    }

    pub fn load_content_stylesheets_in_tab(&self, stylesheets: &[String], tab_id: TabId, all_frames: bool) {
        self.orchestrator
            .injector()
            .insert_stylesheets(stylesheets, tab_id, all_frames);
    }

    /// Stylesheets then scripts, as a matching pass would deliver them.
    pub fn load_content_resources_in_tab(
        &self,
        bundle: &ResourceBundle,
        tab: &Tab,
        options: InjectOptions,
    ) -> PendingDelivery {
        self.orchestrator.injector().inject(
            &bundle.scripts,
            &bundle.stylesheets,
            tab,
            bundle.callback.clone(),
            options,
        )
    }

    /// `kinds` of `None` means every transition, `close` included.
    pub fn add_tab_changed_callback<F>(&self, callback: F, kinds: Option<&[Transition]>)
    where
        F: Fn(&Tab, Transition) + Send + Sync + 'static,
    {
        self.bridge.add_transition_observer(callback, kinds);
    }

    pub fn on_injection_error<F>(&self, callback: F)
    where
        F: Fn(&InjectionFailure) + Send + Sync + 'static,
    {
        self.orchestrator.injector().on_failure(callback);
    }

    pub fn on_tab_updated(&self, tab_id: TabId, info: &ChangeInfo, tab: &Tab) -> Vec<PendingDelivery> {
        self.bridge.tab_updated(tab_id, info, tab)
    }

    pub fn on_tab_removed(&self, tab_id: TabId) {
        self.bridge.tab_removed(tab_id);
    }

    pub fn rule_count(&self) -> usize {
        self.context.registry.lock().len()
    }

    pub fn tracked_url(&self, tab_id: TabId) -> Option<String> {
        self.context.tabs.lock().url(tab_id).map(str::to_string)
    }

    /// Drops all rules and tab state. In-flight deliveries still finish.
    pub fn shutdown(&self) {
        self.context.clear();
        info!("content resources shut down");
    }
}
