//! [`TabHost`] backed by the extension on the other end of native messaging.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::{ScriptDetails, StylesheetDetails, TabHost};
use crate::protocol::{Outgoing, RequestId};
use crate::registry::{Namespace, TabCallback};
use crate::tab::{Tab, TabId};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Reply = Result<serde_json::Value, HostError>;
type Pending = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>>;

pub struct NativeHost {
    tx: mpsc::UnboundedSender<Outgoing>,
    next_id: AtomicU64,
    pending: Pending,
    timeout: Duration,
}

impl NativeHost {
    /// `tx` feeds the task that owns stdout.
    pub fn new(tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self {
            tx,
            next_id: AtomicU64::new(1),
            pending: Arc::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// How long a request waits for its response before failing with
    /// [`HostError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends a message that expects no reply.
    pub fn send(&self, msg: Outgoing) {
        if self.tx.send(msg).is_err() {
            warn!("stdout writer is gone, dropping message");
        }
    }

    /// Completion callback that reports a delivered bundle back to the
    /// extension as `resourcesLoaded`.
    pub fn loaded_notifier(self: &Arc<Self>, namespace: Option<&Namespace>) -> TabCallback {
        let host = Arc::clone(self);
        let namespace = namespace.map(|ns| ns.to_string());
        Arc::new(move |tab: &Tab| {
            host.send(Outgoing::ResourcesLoaded {
                tab_id: tab.id,
                url: tab.url.clone(),
                namespace: namespace.clone(),
            });
        })
    }

    /// Completes the request waiting on `request_id`.
    pub fn resolve(&self, request_id: RequestId, result: serde_json::Value, error: Option<String>) {
        let Some(waiter) = self.pending.lock().remove(&request_id) else {
            debug!(request_id, "response for unknown request");
            return;
        };
        let reply = match error {
            Some(message) => Err(HostError::Rejected(message)),
            None => Ok(result),
        };
        // The caller may have stopped waiting.
        let _ = waiter.send(reply);
    }

    /// Fails every outstanding request, e.g. once stdin has closed.
    pub fn disconnect(&self) {
        for (_, waiter) in self.pending.lock().drain() {
            let _ = waiter.send(Err(HostError::Disconnected));
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    fn request(&self, build: impl FnOnce(RequestId) -> Outgoing) -> BoxFuture<'static, Reply> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, reply) = oneshot::channel();
        self.pending.lock().insert(request_id, waiter);

        if self.tx.send(build(request_id)).is_err() {
            self.pending.lock().remove(&request_id);
            return async { Err(HostError::Disconnected) }.boxed();
        }

        let pending = self.pending.clone();
        let timeout = self.timeout;
        async move {
            match tokio::time::timeout(timeout, reply).await {
                Ok(reply) => reply.unwrap_or(Err(HostError::Disconnected)),
                Err(_) => {
                    pending.lock().remove(&request_id);
                    warn!(request_id, timeout_ms = timeout.as_millis() as u64, "host request timed out");
                    Err(HostError::Timeout(request_id))
                }
            }
        }
        .boxed()
    }

    fn typed_request<T>(&self, build: impl FnOnce(RequestId) -> Outgoing) -> BoxFuture<'static, Result<T, HostError>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request(build)
            .map(|reply| {
                reply.and_then(|value| {
                    serde_json::from_value(value).map_err(|e| HostError::Malformed(e.to_string()))
                })
            })
            .boxed()
    }
}

impl TabHost for NativeHost {
    fn query_tabs(&self) -> BoxFuture<'static, Result<Vec<Tab>, HostError>> {
        self.typed_request(|request_id| Outgoing::QueryTabs { request_id })
    }

    fn get_tab(&self, tab_id: TabId) -> BoxFuture<'static, Result<Tab, HostError>> {
        self.typed_request::<Option<Tab>>(|request_id| Outgoing::GetTab { request_id, tab_id })
            .map(move |reply| reply.and_then(|tab| tab.ok_or(HostError::TabNotFound(tab_id))))
            .boxed()
    }

    fn execute_script(
        &self,
        tab_id: TabId,
        details: ScriptDetails,
    ) -> BoxFuture<'static, Result<(), HostError>> {
        self.request(|request_id| Outgoing::ExecuteScript {
            request_id,
            tab_id,
            details,
        })
        .map(|reply| reply.map(|_| ()))
        .boxed()
    }

    fn insert_css(&self, tab_id: TabId, details: StylesheetDetails) {
        self.send(Outgoing::InsertCss { tab_id, details });
    }
}
