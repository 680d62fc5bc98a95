//! HTTP handlers for the flag API.

use flagstore_client::Client;
use flagstore_core::{Context, FlagValue, Reason};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::routing::Router;

/// Context key used when a flag request names none.
pub const ANONYMOUS_KEY: &str = "anonymous";

/// State shared by every handler.
pub struct AppState {
    /// `None` when the client could not be created, e.g. without an SDK key.
    pub client: Option<Arc<Client>>,
    /// Name reported by the health endpoint.
    pub application: String,
}

impl AppState {
    pub fn new(client: Option<Arc<Client>>, application: impl Into<String>) -> Self {
        Self {
            client,
            application: application.into(),
        }
    }

    fn sdk_initialized(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.initialized())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagResponse {
    flag_key: String,
    flag_value: FlagValue,
    context: Context,
    sdk_initialized: bool,
    reason: Reason,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let flag_state = Arc::clone(&state);
    let bootstrap_state = Arc::clone(&state);
    let health_state = Arc::clone(&state);
    let status_state = Arc::clone(&state);
    let toggle_state = state;

    Router::new()
        .post("/api/flag/:flagKey", move |req| {
            evaluate_flag(Arc::clone(&flag_state), req)
        })
        .post("/api/bootstrap", move |req| {
            bootstrap(Arc::clone(&bootstrap_state), req)
        })
        .get("/api/health", move |req| health(Arc::clone(&health_state), req))
        .get("/api/status", move |req| status(Arc::clone(&status_state), req))
        .post("/api/toggle", move |req| {
            toggle_update_mode(Arc::clone(&toggle_state), req)
        })
}

/// Parse the flag request body into a context. `key` defaults to
/// [`ANONYMOUS_KEY`]; every other field other than `name` and `kind`
/// becomes an attribute.
fn flag_context(req: &HttpRequest) -> Result<Context> {
    let mut body: Map<String, Value> = if req.body.is_empty() {
        Map::new()
    } else {
        req.json()?
    };
    if body.get("key").is_none_or(Value::is_null) {
        body.insert("key".to_string(), Value::String(ANONYMOUS_KEY.to_string()));
    }
    let context: Context = serde_json::from_value(Value::Object(body))
        .map_err(|e| Error::BadRequest(format!("invalid context: {}", e)))?;
    context
        .validate()
        .map_err(|e| Error::BadRequest(format!("invalid context: {}", e)))?;
    Ok(context)
}

/// `POST /api/flag/:flagKey`
pub async fn evaluate_flag(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let flag_key = req.param("flagKey").unwrap_or_default().to_string();
    info!(flag_key = %flag_key, "Received flag evaluation request");

    let context = flag_context(&req)?;
    debug!(flag_key = %flag_key, context_key = %context.key(), "Parsed evaluation context");

    let client = match &state.client {
        Some(client) if client.initialized() => client,
        _ => {
            warn!(flag_key = %flag_key, "Flag client not initialized");
            return Err(Error::not_initialized(Some(&flag_key)));
        }
    };

    let result = client.variation_detail(&flag_key, &context, FlagValue::Bool(false));
    info!(flag_key = %flag_key, value = %result.value.to_json(), "Flag evaluated");

    HttpResponse::json(&FlagResponse {
        flag_key,
        flag_value: result.value,
        context,
        sdk_initialized: true,
        reason: result.reason,
    })
}

/// `POST /api/bootstrap`
pub async fn bootstrap(state: Arc<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let context: Context = req.json()?;
    context
        .validate()
        .map_err(|e| Error::BadRequest(format!("invalid context: {}", e)))?;

    let Some(client) = &state.client else {
        return Err(Error::not_initialized(None));
    };
    let flags = client.all_flags_state(&context)?;
    debug!(context_key = %context.key(), flags = flags.len(), valid = flags.is_valid(), "Bootstrapped flags");
    HttpResponse::json(&flags)
}

/// `GET /api/health`
pub async fn health(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    HttpResponse::json(&json!({
        "status": "ok",
        "sdkInitialized": state.sdk_initialized(),
        "application": state.application,
    }))
}

/// `GET /api/status`
pub async fn status(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    match &state.client {
        Some(client) => HttpResponse::json(&client.status()),
        None => Err(Error::not_initialized(None)),
    }
}

/// `POST /api/toggle`
///
/// Switches the client between streaming and polling.
pub async fn toggle_update_mode(state: Arc<AppState>, _req: HttpRequest) -> Result<HttpResponse> {
    let Some(client) = &state.client else {
        return Err(Error::not_initialized(None));
    };
    let mode = client.toggle_update_mode().await?;
    info!(update_mode = %mode, "Update mode toggled");
    HttpResponse::json(&json!({
        "success": true,
        "updateMode": mode,
        "message": format!("Switched to {} mode", mode),
    }))
}
