//! Application route configuration.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    auth_routes, booking_routes, guest_routes, infrastructure_routes, public_booking_routes,
    public_infrastructure_routes, upload_routes, user_routes,
};
use super::middleware::{auth_middleware, rate_limit_auth_middleware, rate_limit_middleware};
use super::openapi::ApiDoc;
use super::AppState;
use crate::config::UPLOADS_URL_PREFIX;

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let authenticated = |routes: Router<AppState>| {
        routes.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
    };

    let api = Router::new()
        .nest(
            "/users",
            authenticated(user_routes()),
        )
        .nest(
            "/infrastructures",
            public_infrastructure_routes().merge(authenticated(infrastructure_routes())),
        )
        .nest(
            "/bookings",
            public_booking_routes().merge(authenticated(booking_routes())),
        )
        .nest("/guest", guest_routes())
        .nest(
            "/uploads",
            authenticated(upload_routes()).layer(DefaultBodyLimit::max(
                state.storage.max_bytes() + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        // auth endpoints use the stricter tier only
        .nest(
            "/auth",
            auth_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_auth_middleware,
            )),
        );

    Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(state.storage.root()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check with a database ping
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let Some(database) = state.database.as_ref() else {
        return (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "not configured",
                error: None,
            }),
        );
    };

    match database.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "healthy",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "unhealthy",
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
