#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tab_resources::{
    ChangeInfo, HostError, RunAt, ScriptDetails, StylesheetDetails, Tab, TabHost, TabId,
};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Css { tab_id: TabId, file: String },
    Script {
        tab_id: TabId,
        file: String,
        run_at: RunAt,
        all_frames: bool,
    },
    QueryTabs,
    GetTab(TabId),
}

type Gate = (String, oneshot::Sender<Result<(), HostError>>);

/// Records every request. Scripts complete immediately unless the host was
/// built with [`FakeHost::manual`], in which case tests release them with
/// [`FakeHost::complete`].
#[derive(Default)]
pub struct FakeHost {
    calls: Mutex<Vec<Call>>,
    tabs: Mutex<BTreeMap<TabId, Tab>>,
    failing: Mutex<HashSet<String>>,
    fail_queries: Mutex<bool>,
    manual: bool,
    gates: Mutex<Vec<Gate>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            manual: true,
            ..Self::default()
        })
    }

    pub fn add_tab(&self, tab: Tab) {
        self.tabs.lock().insert(tab.id, tab);
    }

    pub fn fail_script(&self, file: &str) {
        self.failing.lock().insert(file.to_string());
    }

    pub fn fail_queries(&self) {
        *self.fail_queries.lock() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Script { file, .. } => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn stylesheets(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Css { file, .. } => Some(file),
                _ => None,
            })
            .collect()
    }

    /// Releases the oldest pending script named `file`.
    pub fn complete(&self, file: &str, result: Result<(), HostError>) {
        let mut gates = self.gates.lock();
        let index = gates
            .iter()
            .position(|(pending, _)| pending == file)
            .unwrap_or_else(|| panic!("no pending script {file}"));
        let (_, gate) = gates.remove(index);
        gate.send(result).unwrap();
    }

    pub fn pending(&self) -> usize {
        self.gates.lock().len()
    }
}

impl TabHost for FakeHost {
    fn query_tabs(&self) -> BoxFuture<'static, Result<Vec<Tab>, HostError>> {
        self.calls.lock().push(Call::QueryTabs);
        let result = if *self.fail_queries.lock() {
            Err(HostError::Disconnected)
        } else {
            Ok(self.tabs.lock().values().cloned().collect())
        };
        async move { result }.boxed()
    }

    fn get_tab(&self, tab_id: TabId) -> BoxFuture<'static, Result<Tab, HostError>> {
        self.calls.lock().push(Call::GetTab(tab_id));
        let result = self
            .tabs
            .lock()
            .get(&tab_id)
            .cloned()
            .ok_or(HostError::TabNotFound(tab_id));
        async move { result }.boxed()
    }

    fn execute_script(
        &self,
        tab_id: TabId,
        details: ScriptDetails,
    ) -> BoxFuture<'static, Result<(), HostError>> {
        self.calls.lock().push(Call::Script {
            tab_id,
            file: details.file.clone(),
            run_at: details.run_at,
            all_frames: details.all_frames,
        });

        if self.manual {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().push((details.file, tx));
            return async move { rx.await.unwrap_or(Err(HostError::Disconnected)) }.boxed();
        }

        let result = if self.failing.lock().contains(&details.file) {
            Err(HostError::Rejected(format!("cannot inject {}", details.file)))
        } else {
            Ok(())
        };
        async move { result }.boxed()
    }

    fn insert_css(&self, tab_id: TabId, details: StylesheetDetails) {
        self.calls.lock().push(Call::Css {
            tab_id,
            file: details.file,
        });
    }
}

/// Collects every tab a callback was invoked with.
#[derive(Clone, Default)]
pub struct Seen(Arc<Mutex<Vec<Tab>>>);

impl Seen {
    pub fn callback(&self) -> impl Fn(&Tab) + Send + Sync + 'static {
        let seen = self.0.clone();
        move |tab: &Tab| seen.lock().push(tab.clone())
    }

    pub fn tabs(&self) -> Vec<Tab> {
        self.0.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().len()
    }
}

pub fn complete() -> ChangeInfo {
    ChangeInfo::complete()
}

pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
