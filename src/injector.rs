//! Stylesheet and script injection for a single bundle.

use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::{ScriptDetails, StylesheetDetails, TabHost};
use crate::registry::TabCallback;
use crate::tab::{InjectOptions, RunAt, Tab, TabId};

/// A script that could not be injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionFailure {
    pub tab_id: TabId,
    pub file: String,
    pub error: HostError,
}

pub type FailureCallback = Arc<dyn Fn(&InjectionFailure) + Send + Sync>;

/// Handle to an in-flight delivery. Dropping it detaches the delivery, which
/// still runs to completion.
#[derive(Debug)]
pub struct PendingDelivery(JoinHandle<()>);

impl PendingDelivery {
    /// Waits until every script has settled and the callback (if any) ran.
    pub async fn finished(self) {
        if let Err(e) = self.0.await {
            warn!(error = %e, "delivery task did not complete");
        }
    }
}

#[derive(Clone)]
pub struct Injector {
    host: Arc<dyn TabHost>,
    failure_observers: Arc<Mutex<Vec<FailureCallback>>>,
}

impl Injector {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        Self {
            host,
            failure_observers: Arc::default(),
        }
    }

    pub fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }

    pub fn on_failure<F>(&self, callback: F)
    where
        F: Fn(&InjectionFailure) + Send + Sync + 'static,
    {
        self.failure_observers.lock().push(Arc::new(callback));
    }

    /// Inserts every stylesheet, in order, without tracking completion.
    pub fn insert_stylesheets(&self, stylesheets: &[String], tab_id: TabId, all_frames: bool) {
        for file in stylesheets {
            self.host.insert_css(
                tab_id,
                StylesheetDetails {
                    file: file.clone(),
                    run_at: RunAt::DocumentStart,
                    all_frames,
                },
            );
        }
    }

    /// Issues all stylesheet requests, then all script requests, before
    /// returning. `callback` runs exactly once after the last script settles,
    /// immediately when there are no scripts.
    pub fn inject(
        &self,
        scripts: &[String],
        stylesheets: &[String],
        tab: &Tab,
        callback: Option<TabCallback>,
        options: InjectOptions,
    ) -> PendingDelivery {
        self.insert_stylesheets(stylesheets, tab.id, options.all_frames);

        let requests: FuturesUnordered<_> = scripts
            .iter()
            .map(|file| {
                let request = self.host.execute_script(
                    tab.id,
                    ScriptDetails {
                        file: file.clone(),
                        run_at: options.run_at,
                        all_frames: options.all_frames,
                    },
                );
                let file = file.clone();
                async move { (file, request.await) }
            })
            .collect();

        debug!(
            tab_id = tab.id,
            scripts = scripts.len(),
            stylesheets = stylesheets.len(),
            "dispatched delivery"
        );

        let delivery = Delivery::new(scripts.len(), tab.clone(), callback);
        PendingDelivery(tokio::spawn(delivery.run(
            requests,
            self.host.clone(),
            self.failure_observers.clone(),
        )))
    }
}

/// Completion state owned by one delivery.
struct Delivery {
    remaining: usize,
    tab: Tab,
    callback: Option<TabCallback>,
}

impl Delivery {
    fn new(scripts: usize, tab: Tab, callback: Option<TabCallback>) -> Self {
        Self {
            remaining: scripts,
            tab,
            callback,
        }
    }

    /// Marks one script as settled. Returns true once none are outstanding.
    fn settle(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    async fn run<F>(
        mut self,
        mut requests: FuturesUnordered<F>,
        host: Arc<dyn TabHost>,
        failure_observers: Arc<Mutex<Vec<FailureCallback>>>,
    ) where
        F: Future<Output = (String, Result<(), HostError>)>,
    {
        if self.remaining == 0 {
            self.finish(host.as_ref()).await;
            return;
        }

        while let Some((file, result)) = requests.next().await {
            if let Err(error) = result {
                let failure = InjectionFailure {
                    tab_id: self.tab.id,
                    file,
                    error,
                };
                warn!(
                    tab_id = failure.tab_id,
                    file = %failure.file,
                    error = %failure.error,
                    "script injection failed"
                );
                let observers = failure_observers.lock().clone();
                for observer in observers {
                    observer(&failure);
                }
            }
            if self.settle() {
                self.finish(host.as_ref()).await;
                return;
            }
        }
    }

    /// Consumes the delivery so the callback cannot run twice.
    async fn finish(self, host: &dyn TabHost) {
        let Some(callback) = self.callback else {
            return;
        };
        let tab = match host.get_tab(self.tab.id).await {
            Ok(tab) => tab,
            Err(e) => {
                debug!(tab_id = self.tab.id, error = %e, "tab refresh failed, using snapshot");
                self.tab
            }
        };
        callback(&tab);
    }
}
