//! HTTP surface assembly. Kept as free functions so the test suites
//! can drive the full middleware stack in process with
//! `tower::ServiceExt::oneshot`.

use crate::config::Config;
use crate::handlers::{self, AppState};
use crate::memory_store::MemoryStore;
use crate::webhook_handler;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the working directory and serves it with
/// the appropriate content type. Returns 404 when the file is absent.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves the Swagger UI HTML page, configured to load the OpenAPI
/// document served by `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Imob Lead API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Builds the application router with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Intake endpoints
        .route(
            "/api/v1/webhooks/whatsapp",
            post(webhook_handler::whatsapp_webhook),
        )
        .route("/api/v1/webforms/lead", post(handlers::webform_lead))
        // Staff endpoints
        .route("/api/v1/leads/score", post(handlers::score_preview))
        .route("/api/v1/leads", get(handlers::list_leads))
        .route(
            "/api/v1/leads/:id",
            get(handlers::get_lead_by_id).patch(handlers::patch_lead),
        )
        .route("/api/v1/leads/:id/status", post(handlers::set_lead_status));

    // Rate limiting: per-IP token bucket. RATE_LIMIT_PER_SECOND=0
    // turns it off, which is how the in-process test suites run.
    let protected_routes = if state.config.rate_limit_per_second > 0 {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(state.config.rate_limit_per_second)
                .burst_size(state.config.rate_limit_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .unwrap(),
        );
        protected_routes.layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
    } else {
        protected_routes.layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
    };

    // Health check bypasses rate limiting so the platform prober
    // never gets throttled
    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// State backed by the in-memory store, for tests and local
/// experiments that should not touch Postgres.
pub fn test_state() -> Arc<AppState> {
    let store = Arc::new(MemoryStore::new());
    Arc::new(AppState {
        store: store.clone(),
        audit: store,
        config: Config::for_tests(),
    })
}
