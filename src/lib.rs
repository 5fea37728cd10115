use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod checkout;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod storage;
pub mod voting;

pub mod routes;
use auth::AuthUser;
use error::AppError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from every `#[utoipa::path]` handler and the
/// payload schemas. Served at `/api-docs/openapi.json` and browsable through
/// Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::register_user, handlers::users::get_me, handlers::users::list_users,
        handlers::users::get_user, handlers::users::assign_role, handlers::users::remove_role,
        handlers::users::list_roles, handlers::users::create_role, handlers::users::update_role,
        handlers::users::delete_role, handlers::users::list_permissions,
        handlers::tickets::create_ticket, handlers::tickets::list_my_tickets,
        handlers::tickets::get_ticket, handlers::tickets::reply_to_ticket,
        handlers::tickets::close_ticket, handlers::tickets::list_all_tickets,
        handlers::tickets::assign_ticket,
        handlers::servers::get_servers, handlers::servers::get_server,
        handlers::servers::list_all_servers, handlers::servers::create_server,
        handlers::servers::update_server, handlers::servers::delete_server,
        handlers::map_votes::get_map_votes, handlers::map_votes::get_map_vote,
        handlers::map_votes::cast_vote, handlers::map_votes::list_admin_map_votes,
        handlers::map_votes::create_map_vote, handlers::map_votes::update_map_vote,
        handlers::map_votes::delete_map_vote,
        handlers::store::get_products, handlers::store::get_product,
        handlers::store::create_order, handlers::store::list_my_orders,
        handlers::store::get_order, handlers::store::list_all_products,
        handlers::store::create_product, handlers::store::update_product,
        handlers::store::delete_product, handlers::store::list_all_orders,
        handlers::store::update_order_status,
        handlers::site::get_page_metadata, handlers::site::get_navigation,
        handlers::site::get_settings, handlers::site::list_pages, handlers::site::upsert_page,
        handlers::site::delete_page, handlers::site::list_all_navigation,
        handlers::site::create_navigation_item, handlers::site::update_navigation_item,
        handlers::site::delete_navigation_item, handlers::site::update_settings,
        handlers::admin::get_admin_stats, handlers::uploads::get_presigned_url,
    ),
    components(
        schemas(
            models::User, models::UserProfile, models::Role, models::Permission,
            models::RegisterUserRequest, models::CreateRoleRequest, models::UpdateRoleRequest,
            models::TicketStatus, models::TicketPriority, models::Ticket, models::TicketMessage,
            models::TicketDetail, models::CreateTicketRequest, models::TicketReplyRequest,
            models::AssignTicketRequest,
            models::GameServer, models::CreateServerRequest, models::UpdateServerRequest,
            models::VoteStatus, models::MapVote, models::OptionTally, models::MapVoteSummary,
            models::MapOptionInput, models::CreateMapVoteRequest, models::UpdateMapVoteRequest,
            models::CastVoteRequest,
            models::Product, models::CreateProductRequest, models::UpdateProductRequest,
            models::OrderStatus, models::Order, models::OrderItem, models::OrderLineRequest,
            models::CreateOrderRequest, models::UpdateOrderStatusRequest,
            models::PageMetadata, models::UpsertPageMetadataRequest, models::NavigationItem,
            models::CreateNavigationItemRequest, models::UpdateNavigationItemRequest,
            models::SiteSettings, models::UpdateSiteSettingsRequest,
            models::AdminDashboardStats, models::PresignedUrlRequest, models::PresignedUrlResponse,
        )
    ),
    tags(
        (name = "clan-portal", description = "Clan community portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request: the persistence layer, object storage and the
/// loaded configuration. Handlers pull the pieces they need via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Resolving `AuthUser` rejects with 401 before
/// the handler runs; on success the identity is cached in the request
/// extensions, so the handler's own `AuthUser` costs no second lookup.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_admin_access
///
/// Guards everything under `/admin`: 401 without a valid identity, 403 without
/// `admin.access`.
async fn require_admin_access(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require(permissions::ADMIN_ACCESS)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles public, authenticated and admin routes, the docs UI, and the
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin_access,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span for one request, tagged with the id `SetRequestIdLayer` generated so
/// every log line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
