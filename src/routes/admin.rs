use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// The dashboard API, nested under `/admin`. `create_router` applies the
/// `require_admin_access` layer to the whole group; each handler additionally
/// requires the permission for its own area (`users.manage`, `store.manage`, ...).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::get_admin_stats))
        // --- Users & roles ---
        .route("/users", get(handlers::users::list_users))
        .route("/users/{id}", get(handlers::users::get_user))
        .route(
            "/users/{id}/roles/{role_id}",
            post(handlers::users::assign_role).delete(handlers::users::remove_role),
        )
        .route(
            "/roles",
            get(handlers::users::list_roles).post(handlers::users::create_role),
        )
        .route(
            "/roles/{id}",
            put(handlers::users::update_role).delete(handlers::users::delete_role),
        )
        .route("/permissions", get(handlers::users::list_permissions))
        // --- Support tickets ---
        .route("/tickets", get(handlers::tickets::list_all_tickets))
        .route("/tickets/{id}/assign", put(handlers::tickets::assign_ticket))
        // --- Game servers ---
        .route(
            "/servers",
            get(handlers::servers::list_all_servers).post(handlers::servers::create_server),
        )
        .route(
            "/servers/{id}",
            put(handlers::servers::update_server).delete(handlers::servers::delete_server),
        )
        // --- Map votes ---
        .route(
            "/map-votes",
            get(handlers::map_votes::list_admin_map_votes)
                .post(handlers::map_votes::create_map_vote),
        )
        .route(
            "/map-votes/{id}",
            put(handlers::map_votes::update_map_vote).delete(handlers::map_votes::delete_map_vote),
        )
        // --- Storefront ---
        .route(
            "/products",
            get(handlers::store::list_all_products).post(handlers::store::create_product),
        )
        .route(
            "/products/{id}",
            put(handlers::store::update_product).delete(handlers::store::delete_product),
        )
        .route("/orders", get(handlers::store::list_all_orders))
        .route(
            "/orders/{id}/status",
            put(handlers::store::update_order_status),
        )
        // --- Site content ---
        .route(
            "/pages",
            get(handlers::site::list_pages)
                .put(handlers::site::upsert_page)
                .delete(handlers::site::delete_page),
        )
        .route(
            "/navigation",
            get(handlers::site::list_all_navigation).post(handlers::site::create_navigation_item),
        )
        .route(
            "/navigation/{id}",
            put(handlers::site::update_navigation_item)
                .delete(handlers::site::delete_navigation_item),
        )
        .route("/settings", put(handlers::site::update_settings))
}
