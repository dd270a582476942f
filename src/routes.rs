use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::analysis_handler;
use crate::auth::require_bearer;
use crate::handlers::{self, AppState};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router.
///
/// `/` and `/health` are public; everything else requires a bearer token.
/// Rate limiting keys on the client IP, so it needs the server to provide
/// `ConnectInfo`; pass `rate_limit = false` when driving the router directly.
pub fn build_router(state: Arc<AppState>, rate_limit: bool) -> anyhow::Result<Router> {
    let protected_routes = Router::new()
        // Clients
        .route(
            "/clients",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route(
            "/clients/",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route("/clients/:id", get(handlers::get_client))
        // Catalog
        .route(
            "/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/items/",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/items/:id", get(handlers::get_item))
        // Purchases
        .route(
            "/purchases",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        .route(
            "/purchases/",
            get(handlers::list_purchases).post(handlers::create_purchase),
        )
        // Analysis
        .route("/analysis/models", get(analysis_handler::list_models))
        .route("/analysis/:client_id", get(analysis_handler::get_analysis))
        .route(
            "/analysis/:client_id/stream",
            get(analysis_handler::stream_analysis),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    let protected_routes = if rate_limit {
        // 10 req/sec per IP, burst of 20
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(10)
                .burst_size(20)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
        );
        protected_routes.layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
    } else {
        protected_routes.layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
    };

    let cors = cors_layer(&state.config.cors_allowed_origins);

    Ok(Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Permissive when no origins are configured, otherwise an explicit allow-list
/// with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
