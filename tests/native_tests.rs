mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tab_resources::protocol::Outgoing;
use tab_resources::{
    ContentResources, HostError, InjectionFailure, Namespace, NativeHost, ResourceBundle, Tab,
};
use tokio::sync::mpsc;

use common::{Seen, complete};

#[tokio::test(start_paused = true)]
async fn unanswered_script_still_settles_the_delivery() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = Arc::new(NativeHost::new(tx).with_timeout(Duration::from_secs(3)));
    let resources = ContentResources::new(host.clone());

    let failures: Arc<Mutex<Vec<InjectionFailure>>> = Arc::default();
    {
        let failures = failures.clone();
        resources.on_injection_error(move |failure| failures.lock().push(failure.clone()));
    }
    let seen = Seen::default();
    resources
        .register_content_resources_for_tab_urls(
            ["a.test"],
            ResourceBundle::new()
                .with_scripts(["a.js"])
                .with_callback(seen.callback()),
        )
        .unwrap();

    let mut deliveries = resources.on_tab_updated(1, &complete(), &Tab::new(1, "https://a.test/"));
    assert_eq!(deliveries.len(), 1);
    assert!(matches!(rx.recv().await, Some(Outgoing::ExecuteScript { tab_id: 1, .. })));

    tokio::time::timeout(Duration::from_secs(60), deliveries.remove(0).finished())
        .await
        .expect("delivery should settle once requests time out");

    // The tab refresh timed out too, so the callback got the snapshot.
    let tabs = seen.tabs();
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0].url.as_deref(), Some("https://a.test/"));

    let failures = failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].file, "a.js");
    assert!(matches!(failures[0].error, HostError::Timeout(_)));
    assert_eq!(host.pending_requests(), 0);
}

#[tokio::test]
async fn completed_bundle_is_reported_as_resources_loaded() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = Arc::new(NativeHost::new(tx));
    let resources = ContentResources::new(host.clone());

    let mut bundle = ResourceBundle::new()
        .with_scripts(["a.js"])
        .with_namespace("remote");
    bundle.callback = Some(host.loaded_notifier(Some(&Namespace::from("remote"))));
    resources
        .register_content_resources_for_tab_urls(["a.test"], bundle)
        .unwrap();

    let deliveries = resources.on_tab_updated(5, &complete(), &Tab::new(5, "https://a.test/start"));
    assert_eq!(deliveries.len(), 1);

    let Some(Outgoing::ExecuteScript { request_id, .. }) = rx.recv().await else {
        panic!("expected executeScript request");
    };
    host.resolve(request_id, serde_json::Value::Null, None);

    let Some(Outgoing::GetTab { request_id, tab_id: 5 }) = rx.recv().await else {
        panic!("expected getTab request for tab 5");
    };
    host.resolve(
        request_id,
        json!({ "id": 5, "url": "https://a.test/done", "status": "complete" }),
        None,
    );

    let loaded = rx.recv().await.unwrap();
    assert_eq!(
        loaded,
        Outgoing::ResourcesLoaded {
            tab_id: 5,
            url: Some("https://a.test/done".to_string()),
            namespace: Some("remote".to_string()),
        }
    );
    assert_eq!(
        serde_json::to_value(&loaded).unwrap(),
        json!({
            "type": "resourcesLoaded",
            "tabId": 5,
            "url": "https://a.test/done",
            "namespace": "remote"
        })
    );

    for delivery in deliveries {
        delivery.finished().await;
    }
    assert_eq!(host.pending_requests(), 0);
}

#[tokio::test]
async fn notifier_without_namespace_omits_it() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let host = Arc::new(NativeHost::new(tx));

    let notify = host.loaded_notifier(None);
    notify(&Tab::new(9, "https://b.test/"));

    let loaded = rx.recv().await.unwrap();
    assert_eq!(
        serde_json::to_value(&loaded).unwrap(),
        json!({ "type": "resourcesLoaded", "tabId": 9, "url": "https://b.test/" })
    );
}
