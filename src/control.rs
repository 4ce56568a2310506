//! Local HTTP control surface.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::Error;
use crate::registry::{Namespace, TabCallback};
use crate::resources::ContentResources;
use crate::rules::RuleSpec;
use crate::tab::{InjectOptions, Tab, TabId};

/// Builds the completion callback attached to rules registered over HTTP.
pub type NotifierFactory = Arc<dyn Fn(Option<&Namespace>) -> Option<TabCallback> + Send + Sync>;

#[derive(Clone)]
pub struct ControlState {
    pub resources: ContentResources,
    pub notifier: Option<NotifierFactory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayRequest {
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectRequest {
    pub tab_id: TabId,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub stylesheets: Vec<String>,
    #[serde(default)]
    pub run_at_document_start: bool,
    #[serde(default)]
    pub all_frames: bool,
}

type Reply = (StatusCode, Json<serde_json::Value>);

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/rules", post(register_handler))
        .route("/rules/:namespace", delete(unregister_handler))
        .route("/replay", post(replay_handler))
        .route("/inject", post(inject_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_reply(status: StatusCode, error: &Error) -> Reply {
    (status, Json(json!({ "error": error.to_string() })))
}

async fn register_handler(State(state): State<ControlState>, Json(spec): Json<RuleSpec>) -> Reply {
    let namespace = spec.namespace.clone().map(Namespace::from);
    let callback = state
        .notifier
        .as_ref()
        .and_then(|factory| factory(namespace.as_ref()));

    match spec.register(&state.resources, callback) {
        Ok(group) => (StatusCode::OK, Json(json!({ "matchGroup": group }))),
        Err(e) => {
            warn!(error = %e, "rejected rule registration");
            error_reply(StatusCode::BAD_REQUEST, &e)
        }
    }
}

async fn unregister_handler(
    State(state): State<ControlState>,
    Path(namespace): Path<String>,
) -> Reply {
    let removed = state
        .resources
        .unregister_content_resources_by_namespace(&Namespace::from(namespace));
    (StatusCode::OK, Json(json!({ "removed": removed })))
}

async fn replay_handler(
    State(state): State<ControlState>,
    body: Option<Json<ReplayRequest>>,
) -> Reply {
    let namespace = body.and_then(|Json(req)| req.namespace).map(Namespace::from);
    match state
        .resources
        .execute_existing_tab_load_matches(namespace.as_ref())
        .await
    {
        Ok(deliveries) => (
            StatusCode::OK,
            Json(json!({ "deliveries": deliveries.len() })),
        ),
        Err(e) => {
            warn!(error = %e, "replay failed");
            error_reply(StatusCode::BAD_GATEWAY, &e)
        }
    }
}

async fn inject_handler(
    State(state): State<ControlState>,
    Json(payload): Json<InjectRequest>,
) -> Reply {
    info!(
        tab_id = payload.tab_id,
        scripts = payload.scripts.len(),
        stylesheets = payload.stylesheets.len(),
        "one-off injection"
    );

    let options = InjectOptions::new(payload.run_at_document_start, payload.all_frames);
    let tab = Tab {
        id: payload.tab_id,
        ..Tab::default()
    };
    state
        .resources
        .load_content_stylesheets_in_tab(&payload.stylesheets, tab.id, options.all_frames);
    state
        .resources
        .load_content_scripts_in_tab(&payload.scripts, &tab, None, options);

    (StatusCode::OK, Json(json!({ "status": "sent" })))
}
