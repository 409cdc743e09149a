pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod validation;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use referrer_core::config::{AppConfig, ServerConfig};
use referrer_google::GoogleCredentials;
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Middleware that lifts the caller's Google tokens out of the request
/// headers into a [`GoogleCredentials`] extension.
///
/// `Authorization: Bearer <access token>` is required; `X-Refresh-Token`
/// is optional.
async fn bearer_middleware(mut req: Request, next: Next) -> Response {
    let access_token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let Some(access_token) = access_token else {
        return ApiError::MissingToken.into_response();
    };

    let refresh_token = req
        .headers()
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    req.extensions_mut()
        .insert(GoogleCredentials::new(access_token, refresh_token));
    next.run(req).await
}

/// Match an origin against an allow-list entry. A `*` in the entry stands
/// for one or more characters, e.g. `https://*.vercel.app`.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() > prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
        }
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins = server.allowed_origins();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origins.iter().any(|p| origin_matches(p, o)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ])
        .allow_credentials(true)
}

/// Build the axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // Analytics routes need the caller's Google tokens.
    let protected = routes::analytics_routes()
        .route_layer(middleware::from_fn(bearer_middleware));

    let mut api = Router::new().merge(protected).merge(routes::auth_routes());
    if config.server.rate_limit.enabled {
        api = api.route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ));
    }

    let mut app = Router::new()
        .merge(routes::health_routes())
        .merge(api)
        .fallback(routes::not_found)
        .with_state(state.clone());

    // Middleware stack.
    app = app
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http());

    if config.server.cors {
        app = app.layer(cors_layer(&config.server));
    }

    app
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// Start the HTTP server.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.clone());
    let router = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server running on {}", addr);
    tracing::info!("Dashboard origin: {}", config.server.frontend_url);

    if config.google.client_id.is_empty() {
        tracing::warn!("No Google client_id configured; OAuth routes will fail");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
