use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Member features: profile, support tickets, voting, checkout and media
/// uploads. `create_router` wraps this router in the authentication layer, so
/// every handler here receives a resolved `AuthUser`. Ownership checks
/// (a member's own tickets and orders) happen inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/me", get(handlers::users::get_me))
        // --- Support tickets ---
        .route(
            "/tickets",
            get(handlers::tickets::list_my_tickets).post(handlers::tickets::create_ticket),
        )
        .route("/tickets/{id}", get(handlers::tickets::get_ticket))
        .route(
            "/tickets/{id}/messages",
            post(handlers::tickets::reply_to_ticket),
        )
        .route("/tickets/{id}/close", post(handlers::tickets::close_ticket))
        // --- Map votes ---
        // One ballot per member per vote; duplicates are a 409.
        .route("/map-votes/{id}/vote", post(handlers::map_votes::cast_vote))
        // --- Storefront ---
        .route(
            "/orders",
            get(handlers::store::list_my_orders).post(handlers::store::create_order),
        )
        .route("/orders/{id}", get(handlers::store::get_order))
        // --- Media ---
        // Requires uploads.create on top of authentication.
        .route("/upload/presigned", post(handlers::uploads::get_presigned_url))
}
