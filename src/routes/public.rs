use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only endpoints backing the marketing site and storefront, plus
/// registration. Inactive servers and products are filtered out at the
/// handler level. Map-vote endpoints accept an optional identity so a
/// signed-in member sees their own ballot.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        .route("/register", post(handlers::users::register_user))
        // --- Site content ---
        .route("/site/pages", get(handlers::site::get_page_metadata))
        .route("/site/navigation", get(handlers::site::get_navigation))
        .route("/site/settings", get(handlers::site::get_settings))
        // --- Game servers ---
        .route("/servers", get(handlers::servers::get_servers))
        .route("/servers/{id}", get(handlers::servers::get_server))
        // --- Map votes ---
        .route("/map-votes", get(handlers::map_votes::get_map_votes))
        .route("/map-votes/{id}", get(handlers::map_votes::get_map_vote))
        // --- Storefront ---
        .route("/products", get(handlers::store::get_products))
        .route("/products/{id}", get(handlers::store::get_product))
}
