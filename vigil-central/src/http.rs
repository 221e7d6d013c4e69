//! REST API of the central service.
//!
//! Route map:
//! - public: `GET /health`, `POST /api/generate-key`, `GET /dashboard`, `GET /`
//! - agent (requires `X-API-Key` + `X-PC-ID`, rate-limited per pcId):
//!   `POST /api/register`, `POST /api/update`, `GET /api/pcs`,
//!   `GET /api/metrics`
//!
//! Key issuance is deliberately unauthenticated so a fresh machine can
//! bootstrap itself; anyone who can reach this port can mint a key for an
//! arbitrary pcId. Deploy it on a trusted network segment.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::config::CorsPolicy;
use crate::dashboard;
use crate::error::ApiError;
use crate::keys::ApiKeyStore;
use crate::models::{GenerateKeyRequest, RegisterPayload, UpdatePayload};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::registry::Registry;
use crate::state::Shared;

#[derive(Clone)]
pub struct AppState {
    pub registry: Shared<Registry>,
    pub keys: Shared<ApiKeyStore>,
    pub limiter: Shared<RateLimiter>,
    pub cors: CorsPolicy,
    pub started_at: Instant,
}

/// Verified machine identity, attached to the request by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthedPc(pub String);

pub fn build_router(app_state: AppState) -> Router {
    let agent_api = Router::new()
        .route("/api/register", post(register))
        .route("/api/update", post(update))
        .route("/api/pcs", get(list_pcs))
        .route("/api/metrics", get(aggregate_metrics))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_agent_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/generate-key", post(generate_key))
        .route("/dashboard", get(dashboard_page))
        .route("/", get(dashboard_page))
        .merge(agent_api)
        .layer(middleware::from_fn_with_state(app_state.clone(), apply_cors))
        .with_state(app_state)
}

/// Resolves `X-API-Key`/`X-PC-ID` to a verified pcId and enforces the
/// per-machine quota. 401 when a header is missing, 403 when the key does
/// not resolve to the claimed pcId, 429 past the quota.
async fn require_agent_auth(
    State(app): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = header_value(&req, "x-api-key")
        .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".to_string()))?;
    let pc_id = header_value(&req, "x-pc-id")
        .ok_or_else(|| ApiError::Unauthorized("missing X-PC-ID header".to_string()))?;

    if !app.keys.lock().validate(&api_key, &pc_id) {
        warn!(%pc_id, "rejected request with invalid api key");
        return Err(ApiError::Forbidden(
            "api key does not match the claimed pcId".to_string(),
        ));
    }

    if let RateDecision::Limited { retry_after_secs } = app.limiter.lock().allow(&pc_id) {
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    req.extensions_mut().insert(AuthedPc(pc_id));
    Ok(next.run(req).await)
}

fn header_value(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Applies the configured CORS policy to every response and short-circuits
/// `OPTIONS` preflights before routing.
async fn apply_cors(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let origin = header_value(&req, header::ORIGIN.as_str());
    let preflight = req.method() == Method::OPTIONS;

    let mut res = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if let Some(allow_origin) = app.cors.allow_origin_value(origin.as_deref()) {
        let headers = res.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        if app.cors.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if app.cors.echoes_origin() {
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        if preflight {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, X-API-Key, X-PC-ID"),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("600"),
            );
        }
    }

    res
}

// GET /health (public liveness)
async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let machines = app.registry.lock().len();
    let keys = app.keys.lock().len();
    Json(json!({
        "status": "ok",
        "uptimeSeconds": app.started_at.elapsed().as_secs(),
        "machinesTracked": machines,
        "keysIssued": keys,
        "timestamp": now_rfc3339(),
    }))
}

// POST /api/generate-key (public, trust boundary noted in module docs)
async fn generate_key(
    State(app): State<AppState>,
    payload: Result<Json<GenerateKeyRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload.map_err(reject_json)?;
    if body.pc_id.trim().is_empty() {
        return Err(ApiError::Validation("pcId must not be empty".to_string()));
    }
    if body.system_info.pc_id != body.pc_id {
        return Err(ApiError::Validation(
            "systemInfo.pcId does not match pcId".to_string(),
        ));
    }

    let key = app.keys.lock().issue(&body.pc_id);
    Ok(Json(json!({
        "success": true,
        "pcId": body.pc_id,
        "apiKey": key,
    })))
}

// POST /api/register (auth required)
async fn register(
    State(app): State<AppState>,
    Extension(agent): Extension<AuthedPc>,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload.map_err(reject_json)?;
    if body.pc_id != agent.0 {
        return Err(ApiError::Forbidden(
            "body pcId does not match authenticated machine".to_string(),
        ));
    }

    app.registry.lock().register(body);
    Ok(Json(json!({
        "success": true,
        "message": "machine registered",
    })))
}

// POST /api/update (auth required; 404 before register)
async fn update(
    State(app): State<AppState>,
    Extension(agent): Extension<AuthedPc>,
    payload: Result<Json<UpdatePayload>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = payload.map_err(reject_json)?;
    if body.pc_id != agent.0 {
        return Err(ApiError::Forbidden(
            "body pcId does not match authenticated machine".to_string(),
        ));
    }

    if !app.registry.lock().update(body) {
        return Err(ApiError::NotFound(
            "machine is not registered, call /api/register first".to_string(),
        ));
    }
    Ok(Json(json!({
        "success": true,
        "message": "machine updated",
    })))
}

// GET /api/pcs (auth required)
async fn list_pcs(State(app): State<AppState>) -> Json<serde_json::Value> {
    let pcs = app.registry.lock().list_active();
    let count = pcs.len();
    Json(json!({
        "success": true,
        "pcs": pcs,
        "count": count,
        "timestamp": now_rfc3339(),
    }))
}

// GET /api/metrics (auth required)
async fn aggregate_metrics(State(app): State<AppState>) -> Json<serde_json::Value> {
    let agg = app.registry.lock().aggregate();
    Json(json!({
        "success": true,
        "metrics": agg,
        "timestamp": now_rfc3339(),
    }))
}

// GET /dashboard, GET / (public HTML)
async fn dashboard_page(State(app): State<AppState>) -> Html<String> {
    let mut registry = app.registry.lock();
    let entries = registry.list_active();
    let agg = registry.aggregate();
    let failing = registry.machines_with_failures();
    Html(dashboard::render(&entries, &agg, failing))
}

fn reject_json(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
