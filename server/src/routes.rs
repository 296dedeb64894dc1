use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::domains::{index, routes as domain_routes};
use crate::state::AppState;

/// Inject the auth gate into request extensions so the AuthUser extractor can find it.
async fn inject_auth_gate(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut().insert(state.auth.clone());
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Basic auth required — the AuthUser extractor verifies credentials.
    // /write only accepts POST; other methods get 405 before any body is read.
    let domain_routes = Router::new()
        .route("/read", get(domain_routes::read_domains))
        .route("/write", post(domain_routes::write_domains))
        .route("/list", get(domain_routes::list_domains))
        .route(
            "/delete",
            get(domain_routes::delete_domains).post(domain_routes::delete_domains),
        );

    let page_routes = Router::new()
        .route("/", get(index::index_page))
        .route("/index", get(index::index_page));

    // Health check (no auth)
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(domain_routes)
        .merge(page_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_auth_gate,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
