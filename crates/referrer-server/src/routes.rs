use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{AiReferralQuery, CodeExchangeBody, ValidatePropertyBody};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Json, Redirect};
use axum::routing::{get, post};
use axum::Router;
use referrer_google::GoogleCredentials;
use serde::Deserialize;
use serde_json::json;

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Auth ────────────────────────────────────────────────────────────────

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/google-auth-url", get(google_auth_url))
        .route("/api/auth/google/callback", get(google_callback_redirect))
        .route("/api/auth/google-callback", post(google_callback_exchange))
}

async fn google_auth_url(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let auth_url = state
        .backend
        .authorization_url()
        .map_err(|e| ApiError::upstream(e, state.config.server.expose_errors))?;
    Ok(Json(json!({ "success": true, "authUrl": auth_url })))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

/// `{frontend}/dashboard?{key}={value}` with the value form-encoded.
fn dashboard_url(frontend_url: &str, key: &str, value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{}/dashboard?{}={}", frontend_url.trim_end_matches('/'), key, encoded)
}

/// Browser lands here from the Google consent screen; bounce back to the
/// dashboard with either the encoded tokens or an error code.
async fn google_callback_redirect(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let frontend = &state.config.server.frontend_url;

    if let Some(error) = query.error {
        tracing::error!("OAuth error: {}", error);
        return Redirect::to(&dashboard_url(frontend, "error", "oauth_error"));
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Redirect::to(&dashboard_url(frontend, "error", "missing_code"));
    };

    let encoded = match state.backend.exchange_code(&code).await {
        Ok(tokens) => tokens.encode(),
        Err(e) => Err(e),
    };

    match encoded {
        Ok(encoded) => Redirect::to(&dashboard_url(frontend, "tokens", &encoded)),
        Err(e) => {
            tracing::error!("Error in Google callback: {}", e);
            Redirect::to(&dashboard_url(frontend, "error", "callback_error"))
        }
    }
}

async fn google_callback_exchange(
    State(state): State<AppState>,
    body: Result<Json<CodeExchangeBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Validation(vec![format!("Body: {}", e.body_text())]))?;
    let code = body.validate().map_err(ApiError::Validation)?;

    let tokens = state
        .backend
        .exchange_code(&code)
        .await
        .map_err(|e| ApiError::upstream(e, state.config.server.expose_errors))?;

    Ok(Json(json!({ "success": true, "tokens": tokens })))
}

// ── Analytics ───────────────────────────────────────────────────────────

/// Routes that need Google credentials; the caller layers bearer auth on top.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/ai-referrals", get(ai_referrals))
        .route("/api/analytics/validate-property", post(validate_property))
}

async fn ai_referrals(
    State(state): State<AppState>,
    Extension(credentials): Extension<GoogleCredentials>,
    query: Result<Query<AiReferralQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::Validation(vec![format!("Query: {}", e.body_text())]))?;
    let params = query.validate().map_err(ApiError::Validation)?;

    let has_access = state
        .backend
        .validate_property_access(&credentials, &params.property_id)
        .await;
    if !has_access {
        return Err(ApiError::Forbidden(
            "Access denied to this Google Analytics property".into(),
        ));
    }

    let data = state
        .backend
        .ai_referral_data(&credentials, &params.property_id, &params.start_date, &params.end_date)
        .await;

    Ok(Json(json!({
        "success": true,
        "data": data,
        "propertyId": params.property_id,
        "dateRange": {
            "startDate": params.start_date,
            "endDate": params.end_date,
        },
    })))
}

async fn validate_property(
    State(state): State<AppState>,
    Extension(credentials): Extension<GoogleCredentials>,
    body: Result<Json<ValidatePropertyBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Validation(vec![format!("Body: {}", e.body_text())]))?;
    let property_id = body.validate().map_err(ApiError::Validation)?;

    let has_access = state
        .backend
        .validate_property_access(&credentials, &property_id)
        .await;

    Ok(Json(json!({
        "success": true,
        "hasAccess": has_access,
        "propertyId": property_id,
    })))
}

// ── Fallback ────────────────────────────────────────────────────────────

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
