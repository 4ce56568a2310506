use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::tab::{RunAt, Tab, TabId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDetails {
    pub file: String,
    pub run_at: RunAt,
    pub all_frames: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylesheetDetails {
    pub file: String,
    pub run_at: RunAt,
    pub all_frames: bool,
}

/// The browser's tab API as seen by the injector.
///
/// Requests are issued when a method is called, not when the returned future
/// is first polled. Callers rely on this to order stylesheet requests ahead of
/// script requests.
pub trait TabHost: Send + Sync + 'static {
    fn query_tabs(&self) -> BoxFuture<'static, Result<Vec<Tab>, HostError>>;

    fn get_tab(&self, tab_id: TabId) -> BoxFuture<'static, Result<Tab, HostError>>;

    /// Resolves once the script has run (or failed to).
    fn execute_script(
        &self,
        tab_id: TabId,
        details: ScriptDetails,
    ) -> BoxFuture<'static, Result<(), HostError>>;

    /// Fire and forget.
    fn insert_css(&self, tab_id: TabId, details: StylesheetDetails);
}
